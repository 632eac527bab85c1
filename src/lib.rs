//! # Rust Worker Pool
//!
//! A bounded-queue worker pool with lock-free statistics, optional admission
//! rate limiting and a one-shot backlog scaler.
//!
//! ## Features
//!
//! - **Worker Pool**: fixed set of named worker threads draining a task queue
//! - **Bounded Queues**: fixed-capacity FIFO queues on crossbeam channels with a single closer
//! - **Statistics**: cache-padded atomic counters shared by every worker
//! - **Rate Limiting**: periodic or token-bucket admission, per worker or pool-wide
//! - **Cancellation**: every blocking point wakes up on shutdown
//! - **Fault Isolation**: processor errors and panics become error-tagged results
//!
//! ## Quick Start
//!
//! ```rust
//! use rust_worker_pool::prelude::*;
//!
//! # fn main() -> Result<()> {
//! let report = pipeline::run(PoolConfig::new(3), Doubler::new(), 1..=10)?;
//!
//! assert_eq!(report.results.len(), 10);
//! println!("{}", report.stats);
//! # Ok(())
//! # }
//! ```
//!
//! ## Driving the Pool Directly
//!
//! ```rust
//! use rust_worker_pool::prelude::*;
//! use std::sync::Arc;
//!
//! # fn main() -> Result<()> {
//! let tasks = Arc::new(BoundedQueue::named("tasks", 16)?);
//! let results = Arc::new(BoundedQueue::named("results", 16)?);
//!
//! let config = PoolConfig::new(2)
//!     .with_thread_name_prefix("doubler")
//!     .with_rate_limit(RateLimitConfig::per_second(100.0));
//! let pool = WorkerPool::start(config, Doubler::new(), Arc::clone(&tasks), Arc::clone(&results))?;
//!
//! for id in 1..=5 {
//!     tasks.send(Task::new(id)).map_err(|e| e.into_pool_error(tasks.name()))?;
//! }
//! tasks.close().map_err(|e| e.into_pool_error(tasks.name()))?;
//!
//! let collected = ResultCollector::new(results).drain();
//! pool.join()?;
//!
//! assert_eq!(collected.len(), 5);
//! assert_eq!(pool.snapshot().processed, 5);
//! # Ok(())
//! # }
//! ```
//!
//! ## Custom Processors
//!
//! ```rust
//! use rust_worker_pool::prelude::*;
//!
//! struct Square;
//!
//! impl TaskProcessor for Square {
//!     fn process(&self, task: &Task) -> Result<i64> {
//!         task.id()
//!             .checked_mul(task.id())
//!             .ok_or_else(|| PoolError::task_failed(task.id(), "overflow"))
//!     }
//!
//!     fn name(&self) -> &str {
//!         "Square"
//!     }
//! }
//!
//! # fn main() -> Result<()> {
//! let report = pipeline::run(PoolConfig::new(2), Square, [3, 4])?;
//! let mut values: Vec<_> = report.results.iter().filter_map(|r| r.value()).collect();
//! values.sort_unstable();
//! assert_eq!(values, vec![9, 16]);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod collector;
pub mod core;
pub mod limiter;
pub mod pipeline;
pub mod pool;
pub mod prelude;
pub mod queue;

pub use crate::collector::ResultCollector;
pub use crate::core::{
    CancellationReason, CancellationToken, Doubler, PoolError, Result, Task, TaskProcessor,
    TaskResult,
};
pub use crate::limiter::{RateLimitConfig, RateLimitScope, RateLimitStrategy, RateLimiter};
pub use crate::pipeline::PipelineReport;
pub use crate::pool::{PoolConfig, PoolStats, ScaleDecision, ScalingPolicy, StatsSnapshot, WorkerPool};
pub use crate::queue::{BoundedQueue, QueueError};
