//! Worker pool implementation

use crate::core::error::panic_message;
use crate::core::{
    CancellationReason, CancellationToken, PoolError, Result, Task, TaskProcessor, TaskResult,
};
use crate::limiter::{RateLimitScope, RateLimiter};
use crate::pool::barrier::CompletionBarrier;
use crate::pool::config::{PoolConfig, ScaleDecision, ScalingPolicy};
use crate::pool::stats::{PoolStats, StatsSnapshot};
use crate::pool::worker::{Admission, Worker, WorkerContext};
use crate::queue::BoundedQueue;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use tracing::{debug, error, info};

/// A fixed set of workers draining a task queue into a result queue.
///
/// # Completion
///
/// Workers exit once the producer closes the task queue and it has been
/// drained. A supervisor thread waits for the last worker to exit and then
/// closes the result queue, so a consumer reading results sees the end of the
/// stream exactly when every task has been published. The pool is the only
/// closer of the result queue.
///
/// # Cancellation
///
/// [`shutdown`](Self::shutdown) cancels the pool token. Workers blocked on an
/// empty task queue, a full result queue or a rate limiter wake up and exit
/// without draining the remaining tasks.
///
/// # Example
///
/// ```rust
/// use rust_worker_pool::prelude::*;
/// use std::sync::Arc;
///
/// let tasks = Arc::new(BoundedQueue::named("tasks", 8).unwrap());
/// let results = Arc::new(BoundedQueue::named("results", 8).unwrap());
///
/// let pool = WorkerPool::start(
///     PoolConfig::new(2),
///     Doubler::new(),
///     Arc::clone(&tasks),
///     Arc::clone(&results),
/// )
/// .unwrap();
///
/// for id in 1..=4 {
///     tasks.send(Task::new(id)).unwrap();
/// }
/// tasks.close().unwrap();
///
/// let mut values: Vec<_> = ResultCollector::new(results)
///     .drain()
///     .iter()
///     .filter_map(|r| r.value())
///     .collect();
/// values.sort_unstable();
/// assert_eq!(values, vec![2, 4, 6, 8]);
///
/// pool.join().unwrap();
/// assert_eq!(pool.snapshot().processed, 4);
/// ```
pub struct WorkerPool {
    config: PoolConfig,
    tasks: Arc<BoundedQueue<Task>>,
    results: Arc<BoundedQueue<TaskResult>>,
    processor: Arc<dyn TaskProcessor>,
    stats: Arc<PoolStats>,
    token: CancellationToken,
    barrier: Arc<CompletionBarrier>,
    shared_limiter: Option<Arc<RateLimiter>>,
    workers: Mutex<Vec<Worker>>,
    next_worker_id: AtomicUsize,
    backlog_checked: AtomicBool,
    supervisor: Mutex<Option<thread::JoinHandle<Result<()>>>>,
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("config", &self.config)
            .field("processor", &self.processor.name())
            .field("num_workers", &self.num_workers())
            .field("active_workers", &self.active_workers())
            .field("cancelled", &self.token.is_cancelled())
            .field("stats", &self.snapshot())
            .finish()
    }
}

impl WorkerPool {
    /// Validate `config`, spawn `config.num_workers` workers and the supervisor.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InvalidConfig`] for an invalid configuration and
    /// [`PoolError::SpawnError`] if a thread cannot be created. Workers that
    /// were already started are cancelled and joined before returning.
    pub fn start<P>(
        config: PoolConfig,
        processor: P,
        tasks: Arc<BoundedQueue<Task>>,
        results: Arc<BoundedQueue<TaskResult>>,
    ) -> Result<Self>
    where
        P: TaskProcessor + 'static,
    {
        config.validate()?;

        let token = config
            .cancellation()
            .map_or_else(CancellationToken::new, CancellationToken::child);

        let shared_limiter = match &config.rate_limit {
            Some(rate) if rate.scope == RateLimitScope::Shared => {
                Some(Arc::new(RateLimiter::new(*rate)?))
            }
            _ => None,
        };

        let pool = Self {
            tasks,
            results,
            processor: Arc::new(processor),
            stats: Arc::new(PoolStats::new()),
            token,
            barrier: Arc::new(CompletionBarrier::new()),
            shared_limiter,
            workers: Mutex::new(Vec::with_capacity(config.num_workers)),
            next_worker_id: AtomicUsize::new(0),
            backlog_checked: AtomicBool::new(false),
            supervisor: Mutex::new(None),
            config,
        };

        // On error `pool` is dropped here, which cancels and joins what was started
        for _ in 0..pool.config.num_workers {
            pool.spawn_worker()?;
        }
        pool.spawn_supervisor()?;

        info!(
            prefix = %pool.config.thread_name_prefix,
            workers = pool.config.num_workers,
            processor = pool.processor.name(),
            rate_limit = ?pool.config.rate_limit.map(|r| r.ops_per_second),
            "worker pool started"
        );

        Ok(pool)
    }

    /// Register and spawn one worker. Returns `None` once the pool has completed.
    ///
    /// The worker count only advances once the thread is running, so a failed
    /// spawn leaves [`num_workers`](Self::num_workers) and the next id unchanged.
    fn spawn_worker(&self) -> Result<Option<usize>> {
        // Held for the whole spawn so ids stay contiguous
        let mut workers = self.workers.lock();

        let guard = match self.barrier.register() {
            Some(guard) => guard,
            None => return Ok(None),
        };

        let admission = match (&self.shared_limiter, &self.config.rate_limit) {
            (Some(shared), _) => Admission::Shared(Arc::clone(shared)),
            (None, Some(rate)) => Admission::Owned(RateLimiter::new(*rate)?),
            (None, None) => Admission::Unlimited,
        };

        let id = self.next_worker_id.load(Ordering::Acquire);
        let context = WorkerContext {
            tasks: Arc::clone(&self.tasks),
            results: Arc::clone(&self.results),
            processor: Arc::clone(&self.processor),
            stats: Arc::clone(&self.stats),
            token: self.token.clone(),
        };
        let name = format!("{}-{}", self.config.thread_name_prefix, id);

        let worker = Worker::spawn(id, name, context, admission, guard)?;
        workers.push(worker);
        self.next_worker_id.store(id + 1, Ordering::Release);
        Ok(Some(id))
    }

    fn spawn_supervisor(&self) -> Result<()> {
        let barrier = Arc::clone(&self.barrier);
        let results = Arc::clone(&self.results);
        let stats = Arc::clone(&self.stats);

        let handle = thread::Builder::new()
            .name(format!("{}-supervisor", self.config.thread_name_prefix))
            .spawn(move || {
                barrier.wait();
                results
                    .close()
                    .map_err(|e| e.into_pool_error(results.name()))?;
                info!(stats = %stats.snapshot(), "all workers finished, result queue closed");
                Ok(())
            })
            .map_err(|e| PoolError::other(format!("Failed to spawn supervisor: {}", e)))?;

        *self.supervisor.lock() = Some(handle);
        Ok(())
    }

    /// Run the one-shot backlog check.
    ///
    /// Under [`ScalingPolicy::OneShot`] the first call compares the task queue
    /// depth with the threshold and adds exactly one worker when it is
    /// exceeded. Every later call returns [`ScaleDecision::AlreadyChecked`].
    pub fn check_backlog(&self) -> Result<ScaleDecision> {
        let threshold = match self.config.scaling {
            ScalingPolicy::Fixed => return Ok(ScaleDecision::Disabled),
            ScalingPolicy::OneShot { backlog_threshold } => backlog_threshold,
        };

        if self.backlog_checked.swap(true, Ordering::AcqRel) {
            return Ok(ScaleDecision::AlreadyChecked);
        }
        if self.token.is_cancelled() || self.barrier.is_complete() {
            return Ok(ScaleDecision::Finished);
        }

        let depth = self.tasks.len();
        if depth <= threshold {
            debug!(depth, threshold, "backlog below threshold");
            return Ok(ScaleDecision::BelowThreshold { depth, threshold });
        }

        match self.spawn_worker()? {
            Some(worker_id) => {
                info!(worker_id, depth, threshold, "backlog exceeded threshold, added worker");
                Ok(ScaleDecision::AddedWorker { worker_id, depth })
            }
            None => Ok(ScaleDecision::Finished),
        }
    }

    /// Wait until every worker has exited and the result queue is closed.
    ///
    /// Something must close the task queue (or cancel the pool) for this to
    /// return, and the result queue must be drained concurrently if it can
    /// fill up. Calling `join` again after it returned is a no-op.
    ///
    /// # Errors
    ///
    /// Returns the first error reported by the supervisor or a worker: a
    /// result queue closed by someone other than the pool, or a worker thread
    /// that panicked outside task processing.
    pub fn join(&self) -> Result<()> {
        let supervisor = self.supervisor.lock().take();
        let supervised = match supervisor {
            Some(handle) => handle.join().unwrap_or_else(|panic| {
                Err(PoolError::other(format!(
                    "Supervisor panicked: {}",
                    panic_message(panic.as_ref())
                )))
            }),
            None => {
                // Another caller owns the supervisor; still wait for the workers
                self.barrier.wait();
                Ok(())
            }
        };

        // The barrier is sealed once the supervisor returned, so no worker
        // can be added after this point.
        let workers = std::mem::take(&mut *self.workers.lock());
        let mut outcome = supervised;
        for worker in workers {
            let joined = worker.join();
            if outcome.is_ok() {
                outcome = joined;
            }
        }

        if let Err(e) = &outcome {
            error!(error = %e, "worker pool finished with error");
        }
        outcome
    }

    /// Cancel all workers and wait for them to exit.
    ///
    /// Tasks still queued are left unprocessed.
    pub fn shutdown(&self) -> Result<()> {
        if !self.is_finished() {
            info!(
                prefix = %self.config.thread_name_prefix,
                active = self.active_workers(),
                "shutting down worker pool"
            );
        }
        self.token.cancel_with_reason(CancellationReason::Shutdown);
        self.join()
    }

    /// Number of workers started so far, including one added by the scaler.
    ///
    /// A worker whose thread failed to spawn is not counted.
    pub fn num_workers(&self) -> usize {
        self.next_worker_id.load(Ordering::Acquire)
    }

    /// Number of workers that have not exited yet
    pub fn active_workers(&self) -> usize {
        self.barrier.active()
    }

    /// Returns `true` once all workers exited and the result queue is closed.
    ///
    /// Stays `false` while another thread is blocked in [`join`](Self::join).
    pub fn is_finished(&self) -> bool {
        self.barrier.is_complete() && self.results.is_closed()
    }

    /// Shared statistics
    pub fn stats(&self) -> Arc<PoolStats> {
        Arc::clone(&self.stats)
    }

    /// Current statistics
    pub fn snapshot(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Token cancelling this pool
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.token
    }

    /// Pool configuration
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Queue the workers read tasks from
    pub fn tasks(&self) -> &Arc<BoundedQueue<Task>> {
        &self.tasks
    }

    /// Queue the workers publish results to
    pub fn results(&self) -> &Arc<BoundedQueue<TaskResult>> {
        &self.results
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        let pending = self.supervisor.lock().is_some() || !self.workers.lock().is_empty();
        if pending {
            if let Err(e) = self.shutdown() {
                error!(
                    prefix = %self.config.thread_name_prefix,
                    error = %e,
                    "failed to shut down worker pool during drop"
                );
            }
        }
    }
}
