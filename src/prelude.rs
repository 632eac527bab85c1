//! Convenient re-exports for common types and traits

pub use crate::collector::ResultCollector;
pub use crate::core::{
    CancellationReason, CancellationToken, Doubler, PoolError, Result, Task, TaskProcessor,
    TaskResult,
};
pub use crate::limiter::{RateLimitConfig, RateLimitScope, RateLimitStrategy, RateLimiter};
pub use crate::pipeline::{self, PipelineReport};
pub use crate::pool::{
    PoolConfig, PoolStats, ScaleDecision, ScalingPolicy, StatsSnapshot, WorkerPool,
};
pub use crate::queue::{BoundedQueue, QueueError};
