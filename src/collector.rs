//! Consumer side of the result queue

use crate::core::{CancellationToken, TaskResult};
use crate::queue::{BoundedQueue, QueueError};
use std::sync::Arc;
use tracing::debug;

/// Reads every result from a result queue until the pool closes it.
///
/// Results arrive in completion order, which is unrelated to task order.
#[derive(Debug, Clone)]
pub struct ResultCollector {
    results: Arc<BoundedQueue<TaskResult>>,
}

impl ResultCollector {
    /// Collector reading from `results`
    pub fn new(results: Arc<BoundedQueue<TaskResult>>) -> Self {
        Self { results }
    }

    /// Block until the queue is closed and empty, returning everything received.
    pub fn drain(&self) -> Vec<TaskResult> {
        let mut collected = Vec::new();
        self.for_each(|result| collected.push(result));
        collected
    }

    /// Like [`drain`](Self::drain) but stops early when `token` is cancelled.
    ///
    /// Results received before cancellation are returned; anything still
    /// buffered stays in the queue.
    pub fn drain_until_cancelled(&self, token: &CancellationToken) -> Vec<TaskResult> {
        let mut collected = Vec::new();
        loop {
            match self.results.recv_cancellable(token) {
                Ok(result) => collected.push(result),
                Err(QueueError::Disconnected) => break,
                Err(_) => {
                    debug!(
                        received = collected.len(),
                        "result collection cancelled"
                    );
                    break;
                }
            }
        }
        collected
    }

    /// Hand each result to `f` as it arrives. Returns the number of results seen.
    pub fn for_each<F>(&self, mut f: F) -> usize
    where
        F: FnMut(TaskResult),
    {
        let mut count = 0;
        while let Ok(result) = self.results.recv() {
            f(result);
            count += 1;
        }
        debug!(queue = self.results.name(), received = count, "result queue drained");
        count
    }
}
