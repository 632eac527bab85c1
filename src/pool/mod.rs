//! Worker pool, its workers and shared statistics

pub mod barrier;
pub mod config;
pub mod stats;
pub mod worker;
pub mod worker_pool;

pub use barrier::{BarrierGuard, CompletionBarrier};
pub use config::{PoolConfig, ScaleDecision, ScalingPolicy, DEFAULT_QUEUE_CAPACITY};
pub use stats::{PoolStats, StatsSnapshot};
pub use worker::Worker;
pub use worker_pool::WorkerPool;
