//! Error types for the worker pool

/// Result type for worker pool operations
pub type Result<T> = std::result::Result<T, PoolError>;

/// Errors that can occur in the worker pool
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum PoolError {
    /// Invalid configuration with parameter
    #[error("Invalid configuration for '{parameter}': {message}")]
    InvalidConfig {
        /// Configuration parameter name
        parameter: String,
        /// Error message
        message: String,
    },

    /// Task processing returned an error
    #[error("Task {task_id} failed: {message}")]
    TaskFailed {
        /// ID of the failed task
        task_id: i64,
        /// Error message
        message: String,
    },

    /// Task processing panicked
    #[error("Task {task_id} panicked on worker #{worker_id}: {message}")]
    TaskPanicked {
        /// ID of the task that panicked
        task_id: i64,
        /// ID of the worker that ran the task
        worker_id: usize,
        /// Panic message
        message: String,
    },

    /// An item was sent into a queue that had already been closed
    #[error("Cannot send into closed queue '{queue}'")]
    QueueClosed {
        /// Name of the queue
        queue: String,
    },

    /// A queue was closed more than once
    #[error("Queue '{queue}' was already closed")]
    QueueAlreadyClosed {
        /// Name of the queue
        queue: String,
    },

    /// A blocking operation was interrupted by cancellation
    #[error("Operation cancelled: {reason}")]
    Cancelled {
        /// Reason for cancellation
        reason: String,
    },

    /// Failed to spawn a worker thread
    #[error("Failed to spawn worker thread #{worker_id}: {message}")]
    SpawnError {
        /// ID of the worker that failed to spawn
        worker_id: usize,
        /// Error message
        message: String,
    },

    /// Failed to join a worker thread
    #[error("Failed to join worker thread #{worker_id}: {message}")]
    JoinError {
        /// ID of the worker that failed to join
        worker_id: usize,
        /// Error message
        message: String,
    },

    /// General error
    #[error("{0}")]
    Other(String),
}

impl PoolError {
    /// Create an invalid config error
    pub fn invalid_config(parameter: impl Into<String>, message: impl Into<String>) -> Self {
        PoolError::InvalidConfig {
            parameter: parameter.into(),
            message: message.into(),
        }
    }

    /// Create a task failure error
    pub fn task_failed(task_id: i64, message: impl Into<String>) -> Self {
        PoolError::TaskFailed {
            task_id,
            message: message.into(),
        }
    }

    /// Create a task panic error
    pub fn task_panicked(task_id: i64, worker_id: usize, message: impl Into<String>) -> Self {
        PoolError::TaskPanicked {
            task_id,
            worker_id,
            message: message.into(),
        }
    }

    /// Create a send-after-close error
    pub fn queue_closed(queue: impl Into<String>) -> Self {
        PoolError::QueueClosed {
            queue: queue.into(),
        }
    }

    /// Create a double-close error
    pub fn queue_already_closed(queue: impl Into<String>) -> Self {
        PoolError::QueueAlreadyClosed {
            queue: queue.into(),
        }
    }

    /// Create a cancelled error
    pub fn cancelled(reason: impl Into<String>) -> Self {
        PoolError::Cancelled {
            reason: reason.into(),
        }
    }

    /// Create a spawn error
    pub fn spawn(worker_id: usize, message: impl Into<String>) -> Self {
        PoolError::SpawnError {
            worker_id,
            message: message.into(),
        }
    }

    /// Create a join error
    pub fn join(worker_id: usize, message: impl Into<String>) -> Self {
        PoolError::JoinError {
            worker_id,
            message: message.into(),
        }
    }

    /// Create a generic error
    pub fn other<S: Into<String>>(msg: S) -> Self {
        PoolError::Other(msg.into())
    }

    /// Returns `true` for configuration errors raised at construction time.
    pub fn is_config_error(&self) -> bool {
        matches!(self, PoolError::InvalidConfig { .. })
    }

    /// Returns `true` for queue misuse (send after close, double close).
    ///
    /// These are programming faults and are never retried.
    pub fn is_queue_misuse(&self) -> bool {
        matches!(
            self,
            PoolError::QueueClosed { .. } | PoolError::QueueAlreadyClosed { .. }
        )
    }

    /// Returns `true` for per-task faults attached to a single result.
    pub fn is_task_error(&self) -> bool {
        matches!(
            self,
            PoolError::TaskFailed { .. } | PoolError::TaskPanicked { .. }
        )
    }
}

/// Extracts a readable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}
