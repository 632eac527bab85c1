//! Lock-free statistics shared by every worker of a pool.

use crate::core::{PoolError, Result};
use crossbeam_utils::CachePadded;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Duration;

/// Counters written concurrently by all workers of a pool.
///
/// Every update is a single atomic `fetch_add`; no lock is ever taken.
/// Each counter sits on its own cache line so workers bumping different
/// counters do not contend.
#[derive(Debug, Default)]
pub struct PoolStats {
    processed: CachePadded<AtomicU64>,
    failed: CachePadded<AtomicU64>,
    total_processing_time_ns: CachePadded<AtomicI64>,
}

impl PoolStats {
    /// Create zeroed statistics
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `count` processed tasks and `duration_ns` nanoseconds of processing time.
    ///
    /// Negative durations are clamped to zero so the total never decreases.
    pub fn record(&self, count: u64, duration_ns: i64) {
        self.processed.fetch_add(count, Ordering::Relaxed);
        self.total_processing_time_ns
            .fetch_add(duration_ns.max(0), Ordering::Relaxed);
    }

    /// Record one processed task that took `elapsed`
    pub fn record_duration(&self, elapsed: Duration) {
        let nanos = i64::try_from(elapsed.as_nanos()).unwrap_or(i64::MAX);
        self.record(1, nanos);
    }

    /// Record one failed or panicked task
    pub fn record_failure(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Total tasks processed, including failed ones
    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    /// Tasks whose processing failed or panicked
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    /// Accumulated processing time in nanoseconds
    pub fn total_processing_time_ns(&self) -> i64 {
        self.total_processing_time_ns.load(Ordering::Relaxed)
    }

    /// Read all counters.
    ///
    /// Each counter is read individually; under concurrent writers the values
    /// may come from slightly different instants.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            processed: self.processed(),
            failed: self.failed(),
            total_processing_time_ns: self.total_processing_time_ns(),
        }
    }
}

/// Point-in-time copy of [`PoolStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Total tasks processed, including failed ones
    pub processed: u64,
    /// Tasks whose processing failed or panicked
    pub failed: u64,
    /// Accumulated processing time in nanoseconds
    pub total_processing_time_ns: i64,
}

impl StatsSnapshot {
    /// Tasks that completed successfully
    pub fn succeeded(&self) -> u64 {
        self.processed.saturating_sub(self.failed)
    }

    /// Mean processing time in nanoseconds, `NaN` when nothing was processed
    pub fn average_latency_ns(&self) -> f64 {
        if self.processed == 0 {
            f64::NAN
        } else {
            self.total_processing_time_ns as f64 / self.processed as f64
        }
    }

    /// Mean processing time, `None` when nothing was processed
    pub fn average_latency(&self) -> Option<Duration> {
        let avg = self.average_latency_ns();
        if avg.is_nan() {
            None
        } else {
            Some(Duration::from_nanos(avg as u64))
        }
    }

    /// Render the snapshot as JSON
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| PoolError::other(e.to_string()))
    }
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Tasks Processed: {}, Failed: {}, ",
            self.processed, self.failed
        )?;
        match self.average_latency_ns() {
            avg if avg.is_nan() => write!(f, "Average Time: n/a"),
            avg => write!(f, "Average Time: {:.2} ms", avg / 1e6),
        }
    }
}
