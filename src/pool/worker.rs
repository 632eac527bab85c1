//! Worker thread implementation

use crate::core::error::panic_message;
use crate::core::{CancellationToken, PoolError, Result, Task, TaskProcessor, TaskResult};
use crate::limiter::RateLimiter;
use crate::pool::barrier::BarrierGuard;
use crate::pool::stats::PoolStats;
use crate::queue::{BoundedQueue, QueueError};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use tracing::{debug, error, span, trace, warn, Level};

/// Everything a worker shares with its pool.
#[derive(Clone)]
pub(crate) struct WorkerContext {
    pub tasks: Arc<BoundedQueue<Task>>,
    pub results: Arc<BoundedQueue<TaskResult>>,
    pub processor: Arc<dyn TaskProcessor>,
    pub stats: Arc<PoolStats>,
    pub token: CancellationToken,
}

/// Rate limiting applied by one worker before each task.
#[derive(Debug)]
pub(crate) enum Admission {
    Unlimited,
    /// Limiter owned by this worker; its timer is released when the worker exits.
    Owned(RateLimiter),
    Shared(Arc<RateLimiter>),
}

impl Admission {
    fn wait(&self, token: &CancellationToken) -> Result<()> {
        match self {
            Admission::Unlimited => Ok(()),
            Admission::Owned(limiter) => limiter.wait(token),
            Admission::Shared(limiter) => limiter.wait(token),
        }
    }
}

/// A worker thread that processes tasks until its queue is closed and drained
#[derive(Debug)]
pub struct Worker {
    id: usize,
    thread: Option<thread::JoinHandle<Result<()>>>,
}

impl Worker {
    /// Spawn a worker thread.
    ///
    /// The barrier guard moves into the thread and is released when the
    /// worker loop ends, however it ends.
    pub(crate) fn spawn(
        id: usize,
        name: String,
        context: WorkerContext,
        admission: Admission,
        guard: BarrierGuard,
    ) -> Result<Self> {
        let thread = thread::Builder::new()
            .name(name)
            .spawn(move || {
                let _guard = guard;
                Self::run(id, &context, &admission)
            })
            .map_err(|e| PoolError::spawn(id, e.to_string()))?;

        Ok(Self {
            id,
            thread: Some(thread),
        })
    }

    /// Get worker ID
    pub fn id(&self) -> usize {
        self.id
    }

    /// Returns `true` once the worker loop has exited
    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, |t| t.is_finished())
    }

    /// Join the worker thread, surfacing queue misuse seen by the worker
    pub fn join(mut self) -> Result<()> {
        match self.thread.take() {
            Some(thread) => thread
                .join()
                .map_err(|panic| PoolError::join(self.id, panic_message(panic.as_ref())))?,
            None => Ok(()),
        }
    }

    /// Main worker loop
    ///
    /// Receive, wait for admission, process, publish. Exits when the task
    /// queue is closed and empty, or when the pool is cancelled at any of
    /// the three blocking points.
    fn run(id: usize, ctx: &WorkerContext, admission: &Admission) -> Result<()> {
        let worker_span = span!(Level::DEBUG, "worker", id = id);
        let _enter = worker_span.enter();

        debug!("worker started");

        loop {
            let task = match ctx.tasks.recv_cancellable(&ctx.token) {
                Ok(task) => task,
                Err(QueueError::Disconnected) => {
                    debug!("task queue closed and drained");
                    break;
                }
                Err(_) => {
                    debug!("cancelled while waiting for a task");
                    break;
                }
            };

            if let Err(e) = admission.wait(&ctx.token) {
                debug!(task_id = task.id(), error = %e, "cancelled while waiting for admission");
                break;
            }

            let result = Self::execute_task(id, ctx.processor.as_ref(), &ctx.stats, task);

            match ctx.results.send_cancellable(result, &ctx.token) {
                Ok(()) => {}
                Err(QueueError::Cancelled(_)) => {
                    debug!("cancelled while publishing a result");
                    break;
                }
                Err(e) => {
                    let err = e.into_pool_error(ctx.results.name());
                    error!(error = %err, "result queue closed while workers were running");
                    return Err(err);
                }
            }
        }

        debug!(
            processed = ctx.stats.processed(),
            failed = ctx.stats.failed(),
            "worker shutting down"
        );
        Ok(())
    }

    /// Process a single task with panic protection
    fn execute_task(
        id: usize,
        processor: &dyn TaskProcessor,
        stats: &PoolStats,
        mut task: Task,
    ) -> TaskResult {
        let start = Instant::now();
        let outcome = catch_unwind(AssertUnwindSafe(|| processor.process(&task)));
        let elapsed = start.elapsed();

        let outcome = match outcome {
            Ok(Ok(value)) => {
                task.complete(value);
                trace!(
                    task_id = task.id(),
                    value,
                    duration_us = elapsed.as_micros() as u64,
                    "task completed"
                );
                Ok(value)
            }
            Ok(Err(e)) => {
                warn!(
                    task_id = task.id(),
                    processor = processor.name(),
                    error = %e,
                    "task failed"
                );
                stats.record_failure();
                Err(e)
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!(
                    task_id = task.id(),
                    processor = processor.name(),
                    panic_message = %message,
                    "task panicked"
                );
                stats.record_failure();
                Err(PoolError::task_panicked(task.id(), id, message))
            }
        };

        stats.record_duration(elapsed);
        debug!(
            task_id = task.id(),
            total = stats.processed(),
            "processed task"
        );

        TaskResult {
            task,
            worker_id: id,
            elapsed,
            outcome,
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        if let Some(thread) = self.thread.take() {
            if thread.is_finished() {
                if let Err(panic) = thread.join() {
                    error!(
                        worker_id = self.id,
                        panic_message = %panic_message(panic.as_ref()),
                        "worker panicked"
                    );
                }
            } else {
                warn!(
                    worker_id = self.id,
                    "worker dropped while running; thread detached"
                );
            }
        }
    }
}
