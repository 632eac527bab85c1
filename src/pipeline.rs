//! End-to-end run: producer thread, worker pool and result collection
//!
//! [`run`] builds both queues from the [`PoolConfig`], feeds the task ids
//! from a producer thread, performs the backlog check once every task has
//! been queued and collects results on the calling thread until the pool
//! closes the result queue.
//!
//! # Example
//!
//! ```rust
//! use rust_worker_pool::prelude::*;
//!
//! let report = pipeline::run(PoolConfig::new(3), Doubler::new(), 1..=10).unwrap();
//!
//! assert_eq!(report.results.len(), 10);
//! assert_eq!(report.stats.processed, 10);
//! assert!(report.results.iter().all(|r| r.value() == Some(r.task_id() * 2)));
//! ```

use crate::collector::ResultCollector;
use crate::core::error::panic_message;
use crate::core::{PoolError, Result, Task, TaskProcessor, TaskResult};
use crate::pool::{PoolConfig, ScaleDecision, StatsSnapshot, WorkerPool};
use crate::queue::{BoundedQueue, QueueError};
use serde::Serialize;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Outcome of a [`run`].
#[derive(Debug, Clone)]
pub struct PipelineReport {
    /// Every result, in completion order
    pub results: Vec<TaskResult>,
    /// Statistics read after all workers finished
    pub stats: StatsSnapshot,
    /// Wall time from pool start until the pool finished
    pub elapsed: Duration,
    /// Result of the backlog check made after the last task was queued
    pub scale_decision: ScaleDecision,
    /// Number of tasks the producer queued
    pub tasks_sent: usize,
}

impl PipelineReport {
    /// Results whose processing succeeded
    pub fn succeeded(&self) -> impl Iterator<Item = &TaskResult> {
        self.results.iter().filter(|r| r.is_ok())
    }

    /// Results carrying a processing error
    pub fn failed(&self) -> impl Iterator<Item = &TaskResult> {
        self.results.iter().filter(|r| !r.is_ok())
    }

    /// Results ordered by task id
    pub fn sorted_results(&self) -> Vec<&TaskResult> {
        let mut sorted: Vec<_> = self.results.iter().collect();
        sorted.sort_by_key(|r| r.task_id());
        sorted
    }

    /// Summary as JSON
    pub fn to_json(&self) -> Result<String> {
        #[derive(Serialize)]
        struct Summary<'a> {
            tasks_sent: usize,
            results: usize,
            elapsed_ms: u128,
            stats: &'a StatsSnapshot,
            scale_decision: &'a ScaleDecision,
        }

        serde_json::to_string(&Summary {
            tasks_sent: self.tasks_sent,
            results: self.results.len(),
            elapsed_ms: self.elapsed.as_millis(),
            stats: &self.stats,
            scale_decision: &self.scale_decision,
        })
        .map_err(|e| PoolError::other(e.to_string()))
    }
}

impl fmt::Display for PipelineReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} tasks, {} results in {:.3}s. {}",
            self.tasks_sent,
            self.results.len(),
            self.elapsed.as_secs_f64(),
            self.stats
        )
    }
}

/// Process `task_ids` with a freshly started pool and collect every result.
///
/// # Errors
///
/// - [`PoolError::InvalidConfig`] if `config` is invalid
/// - [`PoolError::Cancelled`] if the configured cancellation token fired
/// - [`PoolError::SpawnError`] if a thread could not be created
///
/// Per-task failures are not errors here; they are reported in
/// [`PipelineReport::results`].
pub fn run<P, I>(config: PoolConfig, processor: P, task_ids: I) -> Result<PipelineReport>
where
    P: TaskProcessor + 'static,
    I: IntoIterator<Item = i64>,
    I::IntoIter: Send,
{
    config.validate()?;

    let tasks = Arc::new(BoundedQueue::named("tasks", config.queue_capacity)?);
    let results = Arc::new(BoundedQueue::named("results", config.queue_capacity)?);
    let producer_name = format!("{}-producer", config.thread_name_prefix);

    let started = Instant::now();
    let pool = WorkerPool::start(config, processor, Arc::clone(&tasks), Arc::clone(&results))?;
    let collector = ResultCollector::new(results);
    let task_ids = task_ids.into_iter();

    let (collected, produced) = thread::scope(|scope| -> Result<_> {
        let producer = thread::Builder::new()
            .name(producer_name)
            .spawn_scoped(scope, || produce(&pool, &tasks, task_ids))
            .map_err(|e| PoolError::other(format!("Failed to spawn producer: {}", e)))?;

        let collected = collector.drain();
        let produced = producer.join().unwrap_or_else(|panic| {
            Err(PoolError::other(format!(
                "Producer panicked: {}",
                panic_message(panic.as_ref())
            )))
        });
        Ok((collected, produced))
    })?;

    let joined = pool.join();
    let elapsed = started.elapsed();

    let token = pool.cancellation_token();
    if token.is_cancelled() {
        return Err(token.to_error());
    }
    let (tasks_sent, scale_decision) = produced?;
    joined?;

    let report = PipelineReport {
        results: collected,
        stats: pool.snapshot(),
        elapsed,
        scale_decision,
        tasks_sent,
    };
    info!(
        tasks = report.tasks_sent,
        results = report.results.len(),
        failed = report.stats.failed,
        elapsed_ms = report.elapsed.as_millis() as u64,
        "pipeline finished"
    );
    Ok(report)
}

/// Queue every id, run the backlog check, then close the task queue.
///
/// The task queue is closed on every path so the workers always terminate.
fn produce<I>(
    pool: &WorkerPool,
    tasks: &BoundedQueue<Task>,
    task_ids: I,
) -> Result<(usize, ScaleDecision)>
where
    I: Iterator<Item = i64>,
{
    let token = pool.cancellation_token();
    let sent = catch_unwind(AssertUnwindSafe(|| {
        let mut sent = 0;
        for id in task_ids {
            match tasks.send_cancellable(Task::new(id), token) {
                Ok(()) => sent += 1,
                Err(QueueError::Cancelled(_)) => {
                    debug!(sent, "producer cancelled");
                    return Err(token.to_error());
                }
                Err(e) => return Err(e.into_pool_error(tasks.name())),
            }
        }
        Ok(sent)
    }))
    .unwrap_or_else(|panic| {
        Err(PoolError::other(format!(
            "Task source panicked: {}",
            panic_message(panic.as_ref())
        )))
    });

    let decision = match &sent {
        Ok(_) => pool.check_backlog(),
        Err(_) => Ok(ScaleDecision::Finished),
    };
    let closed = tasks.close().map_err(|e| e.into_pool_error(tasks.name()));

    let sent = sent?;
    debug!(sent, "all tasks queued");
    closed?;
    Ok((sent, decision?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{CancellationToken, Doubler};
    use crate::limiter::RateLimitConfig;
    use crate::pool::ScalingPolicy;

    #[test]
    fn test_run_doubles_every_id() {
        let report = run(PoolConfig::new(3), Doubler::new(), 1..=10).unwrap();

        assert_eq!(report.tasks_sent, 10);
        assert_eq!(report.stats.processed, 10);
        assert_eq!(report.scale_decision, ScaleDecision::Disabled);
        let values: Vec<_> = report
            .sorted_results()
            .iter()
            .map(|r| (r.task_id(), r.value()))
            .collect();
        assert_eq!(values, (1..=10).map(|id| (id, Some(id * 2))).collect::<Vec<_>>());
    }

    #[test]
    fn test_run_with_no_tasks() {
        let report = run(PoolConfig::new(2), Doubler::new(), std::iter::empty()).unwrap();
        assert!(report.results.is_empty());
        assert_eq!(report.stats.processed, 0);
        assert!(report.stats.average_latency_ns().is_nan());
    }

    #[test]
    fn test_run_more_tasks_than_capacity() {
        let config = PoolConfig::new(2).with_queue_capacity(2);
        let report = run(config, Doubler::new(), 0..100).unwrap();
        assert_eq!(report.results.len(), 100);
    }

    #[test]
    fn test_run_invalid_config() {
        let err = run(PoolConfig::new(0), Doubler::new(), 0..1).unwrap_err();
        assert!(err.is_config_error());

        let config = PoolConfig::new(1).with_rate_limit(RateLimitConfig::per_second(0.0));
        let err = run(config, Doubler::new(), 0..1).unwrap_err();
        assert!(err.is_config_error());
    }

    #[test]
    fn test_run_reports_failures() {
        let processor = |task: &Task| -> Result<i64> {
            if task.id() % 2 == 0 {
                Err(PoolError::task_failed(task.id(), "even"))
            } else {
                Ok(task.id())
            }
        };
        let report = run(PoolConfig::new(2), processor, 1..=6).unwrap();

        assert_eq!(report.succeeded().count(), 3);
        assert_eq!(report.failed().count(), 3);
        assert_eq!(report.stats.processed, 6);
        assert_eq!(report.stats.failed, 3);
    }

    #[test]
    fn test_run_one_shot_scaling() {
        let config = PoolConfig::new(1)
            .with_queue_capacity(32)
            .with_scaling(ScalingPolicy::OneShot {
                backlog_threshold: 5,
            });
        let report = run(config, Doubler::with_work(Duration::from_millis(20)), 1..=20).unwrap();

        assert!(matches!(
            report.scale_decision,
            ScaleDecision::AddedWorker { worker_id: 1, .. }
        ));
        assert_eq!(report.results.len(), 20);
        let workers: std::collections::HashSet<_> =
            report.results.iter().map(|r| r.worker_id).collect();
        assert!(workers.contains(&0));
    }

    #[test]
    fn test_run_cancelled_by_parent() {
        let token = CancellationToken::new();
        let config = PoolConfig::new(1)
            .with_queue_capacity(1)
            .with_cancellation(token.clone());

        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            token.cancel();
        });

        let err = run(config, Doubler::with_work(Duration::from_millis(20)), 0..1_000).unwrap_err();
        canceller.join().unwrap();
        assert!(matches!(err, PoolError::Cancelled { .. }));
    }

    #[test]
    fn test_report_display_and_json() {
        let report = run(PoolConfig::new(1), Doubler::new(), 1..=2).unwrap();
        let text = report.to_string();
        assert!(text.starts_with("2 tasks, 2 results in "));
        assert!(text.contains("Tasks Processed: 2"));

        let json = report.to_json().unwrap();
        assert!(json.contains("\"tasks_sent\":2"));
        assert!(json.contains("\"scale_decision\":\"Disabled\""));
    }
}
