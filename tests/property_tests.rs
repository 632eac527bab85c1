//! Property-based tests for rust_worker_pool using proptest

use proptest::prelude::*;
use rust_worker_pool::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;
use std::thread;

// ============================================================================
// PoolConfig Tests
// ============================================================================

proptest! {
    /// Any positive worker count with a non-empty prefix is valid
    #[test]
    fn test_config_valid(
        workers in 1usize..32,
        capacity in 1usize..10_000,
        prefix in "[a-z]{1,10}"
    ) {
        let config = PoolConfig::new(workers)
            .with_queue_capacity(capacity)
            .with_thread_name_prefix(&prefix);
        prop_assert!(config.validate().is_ok());
    }

    /// Non-positive or non-finite rates are always configuration errors
    #[test]
    fn test_rate_must_be_positive(rate in prop_oneof![
        (-1_000.0f64..=0.0),
        Just(f64::NAN),
        Just(f64::INFINITY),
    ]) {
        let err = RateLimiter::new(RateLimitConfig::per_second(rate)).unwrap_err();
        prop_assert!(err.is_config_error());
    }

    /// A positive rate yields the inverse period
    #[test]
    fn test_period_is_inverse_rate(rate in 0.01f64..10_000.0) {
        let config = RateLimitConfig::per_second(rate);
        prop_assert!(config.validate().is_ok());
        let expected = 1.0 / rate;
        prop_assert!((config.period().as_secs_f64() - expected).abs() < 1e-6);
    }
}

// ============================================================================
// Queue Tests
// ============================================================================

proptest! {
    /// A single producer and single consumer observe FIFO order
    #[test]
    fn test_queue_fifo(items in prop::collection::vec(any::<i64>(), 0..200), capacity in 1usize..16) {
        let queue = Arc::new(BoundedQueue::<i64>::new(capacity).unwrap());

        let producer = {
            let queue = Arc::clone(&queue);
            let items = items.clone();
            thread::spawn(move || {
                for item in items {
                    queue.send(item).unwrap();
                }
                queue.close().unwrap();
            })
        };

        let received: Vec<_> = std::iter::from_fn(|| queue.recv().ok()).collect();
        producer.join().unwrap();
        prop_assert_eq!(received, items);
    }

    /// try_send never exceeds capacity
    #[test]
    fn test_queue_capacity_bound(capacity in 1usize..64, attempts in 0usize..128) {
        let queue = BoundedQueue::<usize>::new(capacity).unwrap();
        let accepted = (0..attempts).filter(|&i| queue.try_send(i).is_ok()).count();
        prop_assert_eq!(accepted, attempts.min(capacity));
        prop_assert_eq!(queue.len(), accepted);
    }
}

// ============================================================================
// Stats Tests
// ============================================================================

proptest! {
    /// Totals equal the sum of all recorded increments, negatives clamped
    #[test]
    fn test_stats_totals(records in prop::collection::vec((0u64..10, -1_000i64..1_000_000), 0..100)) {
        let stats = PoolStats::new();
        for &(count, ns) in &records {
            stats.record(count, ns);
        }

        let snap = stats.snapshot();
        prop_assert_eq!(snap.processed, records.iter().map(|r| r.0).sum::<u64>());
        prop_assert_eq!(
            snap.total_processing_time_ns,
            records.iter().map(|r| r.1.max(0)).sum::<i64>()
        );
        // Reading again without writers gives the same values
        prop_assert_eq!(stats.snapshot(), snap);
    }
}

// ============================================================================
// Pool Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Every task yields exactly one result, whatever the pool shape
    #[test]
    fn test_every_task_processed_once(
        workers in 1usize..8,
        capacity in 1usize..16,
        num_tasks in 0i64..200
    ) {
        let config = PoolConfig::new(workers).with_queue_capacity(capacity);
        let report = pipeline::run(config, Doubler::new(), 0..num_tasks).unwrap();

        prop_assert_eq!(report.results.len() as i64, num_tasks);
        prop_assert_eq!(report.stats.processed as i64, num_tasks);

        let mut seen: HashMap<i64, usize> = HashMap::new();
        for result in &report.results {
            prop_assert_eq!(result.value(), Some(result.task_id() * 2));
            prop_assert!(result.worker_id < workers);
            *seen.entry(result.task_id()).or_default() += 1;
        }
        prop_assert_eq!(seen.len() as i64, num_tasks);
        prop_assert!(seen.values().all(|&n| n == 1));
    }

    /// Failed tasks are counted in both processed and failed
    #[test]
    fn test_failure_accounting(num_tasks in 0i64..100, modulus in 1i64..10) {
        let processor = move |task: &Task| -> Result<i64> {
            if task.id() % modulus == 0 {
                Err(PoolError::task_failed(task.id(), "rejected"))
            } else {
                Ok(task.id())
            }
        };
        let report = pipeline::run(PoolConfig::new(3), processor, 0..num_tasks).unwrap();

        let expected_failed = (0..num_tasks).filter(|id| id % modulus == 0).count() as u64;
        prop_assert_eq!(report.stats.processed, num_tasks as u64);
        prop_assert_eq!(report.stats.failed, expected_failed);
        prop_assert_eq!(report.failed().count() as u64, expected_failed);
        prop_assert_eq!(report.stats.succeeded(), num_tasks as u64 - expected_failed);
    }
}
