//! End-to-end scenarios for the worker pool

use rand::Rng;
use rust_worker_pool::prelude::*;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn queues(capacity: usize) -> (Arc<BoundedQueue<Task>>, Arc<BoundedQueue<TaskResult>>) {
    (
        Arc::new(BoundedQueue::named("tasks", capacity).expect("Failed to create queue")),
        Arc::new(BoundedQueue::named("results", capacity).expect("Failed to create queue")),
    )
}

#[test]
fn test_ten_tasks_three_workers() {
    let (tasks, results) = queues(10);
    let pool = WorkerPool::start(
        PoolConfig::new(3),
        Doubler::new(),
        Arc::clone(&tasks),
        Arc::clone(&results),
    )
    .expect("Failed to start pool");

    for id in 1..=10 {
        tasks.send(Task::new(id)).expect("Failed to send task");
    }
    tasks.close().expect("Failed to close task queue");

    let collected = ResultCollector::new(results).drain();
    pool.join().expect("Failed to join pool");

    assert_eq!(collected.len(), 10);
    for result in &collected {
        assert_eq!(result.value(), Some(result.task_id() * 2));
        assert_eq!(result.task.result(), Some(result.task_id() * 2));
        assert!(result.worker_id < 3);
    }
    let ids: HashSet<_> = collected.iter().map(TaskResult::task_id).collect();
    assert_eq!(ids, (1..=10).collect());

    let stats = pool.snapshot();
    assert_eq!(stats.processed, 10);
    assert_eq!(stats.failed, 0);
    assert!(stats.total_processing_time_ns >= 0);
}

#[test]
fn test_no_tasks_completes_immediately() {
    let (tasks, results) = queues(4);
    let pool = WorkerPool::start(
        PoolConfig::new(3),
        Doubler::new(),
        Arc::clone(&tasks),
        Arc::clone(&results),
    )
    .expect("Failed to start pool");

    let start = Instant::now();
    tasks.close().expect("Failed to close task queue");
    let collected = ResultCollector::new(results).drain();
    pool.join().expect("Failed to join pool");

    assert!(collected.is_empty());
    assert_eq!(pool.snapshot().processed, 0);
    assert!(pool.snapshot().average_latency_ns().is_nan());
    assert!(start.elapsed() < Duration::from_secs(1));
}

#[test]
fn test_rate_limit_spaces_tasks() {
    let config = PoolConfig::new(1).with_rate_limit(RateLimitConfig::per_second(2.0));

    let start = Instant::now();
    let report = pipeline::run(config, Doubler::new(), 1..=4).expect("Pipeline failed");
    let elapsed = start.elapsed();

    assert_eq!(report.results.len(), 4);
    assert!(
        elapsed >= Duration::from_millis(1500),
        "four tasks at 2/s finished after {:?}",
        elapsed
    );
}

#[test]
fn test_token_bucket_rate_limit() {
    let rate = RateLimitConfig::per_second(10.0)
        .with_strategy(RateLimitStrategy::TokenBucket { burst: 2 });
    let config = PoolConfig::new(1).with_rate_limit(rate);

    let start = Instant::now();
    let report = pipeline::run(config, Doubler::new(), 1..=5).expect("Pipeline failed");

    // Two tasks from the burst, three more at 100ms each
    assert_eq!(report.results.len(), 5);
    assert!(start.elapsed() >= Duration::from_millis(250));
}

#[test]
fn test_configuration_errors() {
    let (tasks, results) = queues(4);
    let err = WorkerPool::start(
        PoolConfig::new(0),
        Doubler::new(),
        Arc::clone(&tasks),
        Arc::clone(&results),
    )
    .unwrap_err();
    assert!(matches!(
        err,
        PoolError::InvalidConfig { ref parameter, .. } if parameter == "num_workers"
    ));

    let config = PoolConfig::new(2).with_rate_limit(RateLimitConfig::per_second(0.0));
    let err = WorkerPool::start(config, Doubler::new(), tasks, results).unwrap_err();
    assert!(matches!(
        err,
        PoolError::InvalidConfig { ref parameter, .. } if parameter == "ops_per_second"
    ));

    assert!(BoundedQueue::<Task>::new(0).unwrap_err().is_config_error());
}

#[test]
fn test_failures_and_panics_are_isolated() {
    let processor = |task: &Task| -> Result<i64> {
        match task.id() % 3 {
            0 => Err(PoolError::task_failed(task.id(), "divisible by three")),
            1 => panic!("task {} exploded", task.id()),
            _ => Ok(task.id() * 10),
        }
    };

    let report = pipeline::run(PoolConfig::new(2), processor, 1..=9).expect("Pipeline failed");

    assert_eq!(report.results.len(), 9);
    assert_eq!(report.stats.processed, 9);
    assert_eq!(report.stats.failed, 6);

    for result in &report.results {
        match result.task_id() % 3 {
            0 => assert!(matches!(result.error(), Some(PoolError::TaskFailed { .. }))),
            1 => {
                let err = result.error().expect("panicking task must carry an error");
                assert!(err.is_task_error());
                assert!(err.to_string().contains("exploded"));
            }
            _ => assert_eq!(result.value(), Some(result.task_id() * 10)),
        }
    }
}

#[test]
fn test_one_shot_scaler_adds_single_worker() {
    let config = PoolConfig::new(1)
        .with_queue_capacity(50)
        .with_scaling(ScalingPolicy::OneShot {
            backlog_threshold: 5,
        });

    let report = pipeline::run(config, Doubler::with_work(Duration::from_millis(10)), 1..=30)
        .expect("Pipeline failed");

    match report.scale_decision {
        ScaleDecision::AddedWorker { worker_id, depth } => {
            assert_eq!(worker_id, 1);
            assert!(depth > 5);
        }
        other => panic!("unexpected scale decision {:?}", other),
    }
    assert_eq!(report.results.len(), 30);
    assert!(report.results.iter().all(|r| r.worker_id <= 1));
}

#[test]
fn test_scaler_below_threshold() {
    let config = PoolConfig::new(2).with_scaling(ScalingPolicy::OneShot {
        backlog_threshold: 1_000,
    });
    let report = pipeline::run(config, Doubler::new(), 1..=5).expect("Pipeline failed");

    assert!(matches!(
        report.scale_decision,
        ScaleDecision::BelowThreshold { threshold: 1_000, .. }
    ));
    assert!(report.results.iter().all(|r| r.worker_id < 2));
}

#[test]
fn test_double_close_is_misuse() {
    let (tasks, results) = queues(4);
    let pool = WorkerPool::start(
        PoolConfig::new(1),
        Doubler::new(),
        Arc::clone(&tasks),
        Arc::clone(&results),
    )
    .expect("Failed to start pool");

    tasks.close().expect("Failed to close task queue");
    let err = tasks.close().unwrap_err().into_pool_error(tasks.name());
    assert_eq!(err, PoolError::queue_already_closed("tasks"));
    assert!(err.is_queue_misuse());

    let err = tasks.send(Task::new(1)).unwrap_err().into_pool_error(tasks.name());
    assert_eq!(err, PoolError::queue_closed("tasks"));

    pool.join().expect("Failed to join pool");

    // The pool closed the result queue; closing it again is misuse
    assert!(matches!(results.close(), Err(QueueError::AlreadyClosed)));
}

#[test]
fn test_results_backpressure_blocks_workers() {
    let (tasks, results) = queues(2);
    let pool = WorkerPool::start(
        PoolConfig::new(2),
        Doubler::new(),
        Arc::clone(&tasks),
        Arc::clone(&results),
    )
    .expect("Failed to start pool");

    let producer = {
        let tasks = Arc::clone(&tasks);
        thread::spawn(move || {
            for id in 0..20 {
                tasks.send(Task::new(id)).expect("Failed to send task");
            }
            tasks.close().expect("Failed to close task queue");
        })
    };

    // Nobody reads yet: workers block on the full result queue
    thread::sleep(Duration::from_millis(50));
    assert!(!pool.is_finished());
    assert!(pool.snapshot().processed < 20);

    let count = ResultCollector::new(results).for_each(|_| {});
    producer.join().expect("Producer panicked");
    pool.join().expect("Failed to join pool");
    assert_eq!(count, 20);
}

#[test]
fn test_stats_never_decrease_while_running() {
    let (tasks, results) = queues(8);
    let pool = WorkerPool::start(
        PoolConfig::new(4),
        Doubler::with_work(Duration::from_micros(200)),
        Arc::clone(&tasks),
        Arc::clone(&results),
    )
    .expect("Failed to start pool");

    let stop = Arc::new(AtomicBool::new(false));
    let reader = {
        let stats = pool.stats();
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            let mut last = stats.snapshot();
            let mut reads = 0u64;
            loop {
                let done = stop.load(Ordering::Acquire);
                let current = stats.snapshot();
                assert!(current.processed >= last.processed);
                assert!(current.failed >= last.failed);
                assert!(
                    current.total_processing_time_ns >= last.total_processing_time_ns,
                    "processing time went from {} to {}",
                    last.total_processing_time_ns,
                    current.total_processing_time_ns
                );
                last = current;
                reads += 1;
                if done {
                    break;
                }
            }
            assert_eq!(last.processed, 500);
            reads
        })
    };

    let producer = {
        let tasks = Arc::clone(&tasks);
        thread::spawn(move || {
            for id in 0..500 {
                tasks.send(Task::new(id)).expect("Failed to send task");
            }
            tasks.close().expect("Failed to close task queue");
        })
    };

    let count = ResultCollector::new(results).for_each(|_| {});
    producer.join().expect("Producer panicked");
    pool.join().expect("Failed to join pool");

    stop.store(true, Ordering::Release);
    let reads = reader.join().expect("Reader saw stats go backwards");

    assert_eq!(count, 500);
    assert!(reads > 0);
    assert_eq!(pool.snapshot().processed, 500);
}

#[test]
fn test_custom_processor_from_thread_name() {
    struct ThreadTagger {
        calls: AtomicUsize,
    }

    impl TaskProcessor for ThreadTagger {
        fn process(&self, task: &Task) -> Result<i64> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            let name = thread::current().name().unwrap_or_default().to_string();
            assert!(name.starts_with("tagger-"), "unexpected thread name {}", name);
            Ok(task.id())
        }

        fn name(&self) -> &str {
            "ThreadTagger"
        }
    }

    let config = PoolConfig::new(2).with_thread_name_prefix("tagger");
    let report = pipeline::run(
        config,
        ThreadTagger {
            calls: AtomicUsize::new(0),
        },
        0..8,
    )
    .expect("Pipeline failed");

    assert_eq!(report.results.len(), 8);
    assert!(report.results.iter().all(TaskResult::is_ok));
}

#[test]
fn test_stress_random_delays() {
    let processor = |task: &Task| -> Result<i64> {
        let micros = rand::thread_rng().gen_range(0..500);
        thread::sleep(Duration::from_micros(micros));
        Ok(task.id() * 2)
    };

    let config = PoolConfig::new(8).with_queue_capacity(4);
    let report = pipeline::run(config, processor, 0..2_000).expect("Pipeline failed");

    assert_eq!(report.results.len(), 2_000);
    assert_eq!(report.stats.processed, 2_000);
    let ids: HashSet<_> = report.results.iter().map(TaskResult::task_id).collect();
    assert_eq!(ids.len(), 2_000);
    assert!(report.stats.average_latency().is_some());
}
