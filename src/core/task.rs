//! Task, result and processor types

use crate::core::error::{PoolError, Result};
use serde::Serialize;
use std::fmt;
use std::thread;
use std::time::Duration;

/// A unit of work carrying an identifier and, once processed, a result value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Task {
    id: i64,
    result: Option<i64>,
}

impl Task {
    /// Create a new, unprocessed task
    pub fn new(id: i64) -> Self {
        Self { id, result: None }
    }

    /// Task identifier
    pub fn id(&self) -> i64 {
        self.id
    }

    /// Result value, `None` until the task has been processed successfully
    pub fn result(&self) -> Option<i64> {
        self.result
    }

    /// Returns `true` once a result has been recorded
    pub fn is_processed(&self) -> bool {
        self.result.is_some()
    }

    /// Record the result. Only the worker that dequeued the task calls this.
    pub(crate) fn complete(&mut self, value: i64) {
        debug_assert!(self.result.is_none(), "task {} completed twice", self.id);
        self.result = Some(value);
    }
}

impl From<i64> for Task {
    fn from(id: i64) -> Self {
        Task::new(id)
    }
}

/// A processed task as delivered to the result queue.
///
/// Per-task faults are carried in `outcome` rather than terminating the worker.
#[derive(Debug, Clone)]
pub struct TaskResult {
    /// The task, with its result set on success
    pub task: Task,
    /// Worker that processed the task
    pub worker_id: usize,
    /// Time spent in the processor
    pub elapsed: Duration,
    /// Computed value or the error that replaced it
    pub outcome: Result<i64>,
}

impl TaskResult {
    /// Task identifier
    pub fn task_id(&self) -> i64 {
        self.task.id()
    }

    /// Returns `true` if processing succeeded
    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }

    /// The computed value, if processing succeeded
    pub fn value(&self) -> Option<i64> {
        self.outcome.as_ref().ok().copied()
    }

    /// The processing error, if any
    pub fn error(&self) -> Option<&PoolError> {
        self.outcome.as_ref().err()
    }
}

/// Computes the result for a task.
///
/// Implementations run concurrently on every worker, so they must be `Send + Sync`.
/// Returning an error (or panicking) only affects the current task.
pub trait TaskProcessor: Send + Sync {
    /// Compute the result value for a task
    ///
    /// # Errors
    ///
    /// Returns an error if the task cannot be processed
    fn process(&self, task: &Task) -> Result<i64>;

    /// Processor name for logging
    fn name(&self) -> &str {
        "TaskProcessor"
    }
}

impl fmt::Debug for dyn TaskProcessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TaskProcessor({})", self.name())
    }
}

impl<F> TaskProcessor for F
where
    F: Fn(&Task) -> Result<i64> + Send + Sync,
{
    fn process(&self, task: &Task) -> Result<i64> {
        self(task)
    }

    fn name(&self) -> &str {
        "ClosureProcessor"
    }
}

/// Deterministic processor that doubles the task id.
///
/// An optional delay simulates work before the result is produced.
#[derive(Debug, Clone, Copy, Default)]
pub struct Doubler {
    work: Duration,
}

impl Doubler {
    /// Doubler with no simulated work
    pub fn new() -> Self {
        Self::default()
    }

    /// Doubler that sleeps for `work` before producing each result
    pub fn with_work(work: Duration) -> Self {
        Self { work }
    }
}

impl TaskProcessor for Doubler {
    fn process(&self, task: &Task) -> Result<i64> {
        if !self.work.is_zero() {
            thread::sleep(self.work);
        }
        task.id()
            .checked_mul(2)
            .ok_or_else(|| PoolError::task_failed(task.id(), "result overflows i64"))
    }

    fn name(&self) -> &str {
        "Doubler"
    }
}
