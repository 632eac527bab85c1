//! Core types and traits for the worker pool

pub mod cancellation;
pub mod error;
pub mod task;

pub use cancellation::{CancellationReason, CancellationToken};
pub use error::{PoolError, Result};
pub use task::{Doubler, Task, TaskProcessor, TaskResult};
