//! Worker pool configuration

use crate::core::{CancellationToken, PoolError, Result};
use crate::limiter::RateLimitConfig;
use serde::Serialize;

/// Default capacity of the queues created by [`pipeline::run`](crate::pipeline::run)
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// How the pool may grow after start.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize)]
pub enum ScalingPolicy {
    /// Worker count never changes
    #[default]
    Fixed,
    /// A single backlog check may add one worker.
    ///
    /// The first [`WorkerPool::check_backlog`](crate::pool::WorkerPool::check_backlog)
    /// call adds a worker if the task queue holds more than
    /// `backlog_threshold` tasks. Later calls do nothing.
    OneShot {
        /// Queue depth above which one worker is added
        backlog_threshold: usize,
    },
}

/// Outcome of [`WorkerPool::check_backlog`](crate::pool::WorkerPool::check_backlog)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ScaleDecision {
    /// The pool uses [`ScalingPolicy::Fixed`]
    Disabled,
    /// The one-shot check already ran
    AlreadyChecked,
    /// Backlog did not exceed the threshold
    BelowThreshold {
        /// Observed queue depth
        depth: usize,
        /// Configured threshold
        threshold: usize,
    },
    /// One worker was added
    AddedWorker {
        /// ID of the new worker
        worker_id: usize,
        /// Observed queue depth
        depth: usize,
    },
    /// The pool already finished or is shutting down
    Finished,
}

/// Configuration for [`WorkerPool`](crate::pool::WorkerPool)
#[derive(Clone, Debug)]
pub struct PoolConfig {
    /// Number of workers started with the pool; must be greater than 0
    pub num_workers: usize,
    /// Worker thread name prefix
    pub thread_name_prefix: String,
    /// Optional admission rate limit
    pub rate_limit: Option<RateLimitConfig>,
    /// Scaling behaviour after start
    pub scaling: ScalingPolicy,
    /// Capacity of the task and result queues built by [`pipeline::run`](crate::pipeline::run)
    pub queue_capacity: usize,
    /// Parent token; the pool cancels when it is cancelled
    cancellation: Option<CancellationToken>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            num_workers: 1,
            thread_name_prefix: "worker".to_string(),
            rate_limit: None,
            scaling: ScalingPolicy::default(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            cancellation: None,
        }
    }
}

impl PoolConfig {
    /// Create a new configuration with the given number of workers
    #[must_use]
    pub fn new(num_workers: usize) -> Self {
        Self {
            num_workers,
            ..Default::default()
        }
    }

    /// Set thread name prefix
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_thread_name_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    /// Gate every task behind a rate limiter
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_rate_limit(mut self, rate_limit: RateLimitConfig) -> Self {
        self.rate_limit = Some(rate_limit);
        self
    }

    /// Set the scaling policy
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_scaling(mut self, scaling: ScalingPolicy) -> Self {
        self.scaling = scaling;
        self
    }

    /// Set the queue capacity used by [`pipeline::run`](crate::pipeline::run)
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Link the pool to an external cancellation token
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Parent cancellation token, if any
    pub fn cancellation(&self) -> Option<&CancellationToken> {
        self.cancellation.as_ref()
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.num_workers == 0 {
            return Err(PoolError::invalid_config(
                "num_workers",
                "Number of workers must be greater than 0",
            ));
        }
        if self.thread_name_prefix.is_empty() {
            return Err(PoolError::invalid_config(
                "thread_name_prefix",
                "Thread name prefix must not be empty",
            ));
        }
        if self.queue_capacity == 0 {
            return Err(PoolError::invalid_config(
                "queue_capacity",
                "Queue capacity must be greater than 0",
            ));
        }
        if let Some(rate_limit) = &self.rate_limit {
            rate_limit.validate()?;
        }
        Ok(())
    }
}
