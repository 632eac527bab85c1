//! Admission rate limiting for workers.
//!
//! Two strategies are available:
//!
//! - [`RateLimitStrategy::Periodic`] emits one admission slot every `1/R`
//!   seconds. A slot that nobody waits for is lost, so there is no burst credit.
//!   Backed by [`crossbeam::channel::tick`].
//! - [`RateLimitStrategy::TokenBucket`] refills at `R` tokens per second up to
//!   `burst` tokens, allowing short bursts after idle periods.
//!
//! # Example
//!
//! ```rust
//! use rust_worker_pool::limiter::{RateLimitConfig, RateLimiter};
//! use rust_worker_pool::CancellationToken;
//! use std::time::Instant;
//!
//! let limiter = RateLimiter::new(RateLimitConfig::per_second(20.0)).unwrap();
//! let token = CancellationToken::new();
//!
//! let start = Instant::now();
//! for _ in 0..3 {
//!     limiter.wait(&token).unwrap();
//! }
//! assert!(start.elapsed().as_millis() >= 100);
//! ```

use crate::core::{CancellationToken, PoolError, Result};
use crossbeam::channel::{self, Receiver};
use parking_lot::Mutex;
use serde::Serialize;
use std::time::{Duration, Instant};

/// How admission slots are produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize)]
pub enum RateLimitStrategy {
    /// Strict periodic gate: one slot per period, no accumulation.
    #[default]
    Periodic,
    /// Token bucket holding at most `burst` tokens.
    TokenBucket {
        /// Maximum number of tokens that can accumulate
        burst: u32,
    },
}

/// Which workers share a limiter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize)]
pub enum RateLimitScope {
    /// Every worker owns a limiter; the pool-wide ceiling is `workers × R`.
    #[default]
    PerWorker,
    /// All workers share one limiter; the pool-wide ceiling is `R`.
    Shared,
}

/// Configuration for a [`RateLimiter`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct RateLimitConfig {
    /// Maximum admissions per second
    pub ops_per_second: f64,
    /// Slot production strategy
    pub strategy: RateLimitStrategy,
    /// Sharing between workers
    pub scope: RateLimitScope,
}

impl RateLimitConfig {
    /// Periodic, per-worker limit of `ops_per_second`
    #[must_use]
    pub fn per_second(ops_per_second: f64) -> Self {
        Self {
            ops_per_second,
            strategy: RateLimitStrategy::default(),
            scope: RateLimitScope::default(),
        }
    }

    /// Set the slot production strategy
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_strategy(mut self, strategy: RateLimitStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Set the sharing scope
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_scope(mut self, scope: RateLimitScope) -> Self {
        self.scope = scope;
        self
    }

    /// Time between two slots
    pub fn period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.ops_per_second)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if !self.ops_per_second.is_finite() || self.ops_per_second <= 0.0 {
            return Err(PoolError::invalid_config(
                "ops_per_second",
                format!(
                    "Rate must be a positive finite number, got {}",
                    self.ops_per_second
                ),
            ));
        }
        // Duration::from_secs_f64 panics on values it cannot represent
        if 1.0 / self.ops_per_second > u64::MAX as f64 {
            return Err(PoolError::invalid_config(
                "ops_per_second",
                "Rate is too small to express as a period",
            ));
        }
        if let RateLimitStrategy::TokenBucket { burst: 0 } = self.strategy {
            return Err(PoolError::invalid_config(
                "burst",
                "Token bucket burst must be greater than 0",
            ));
        }
        Ok(())
    }
}

struct Bucket {
    tokens: f64,
    capacity: f64,
    last_refill: Instant,
}

impl Bucket {
    fn refill(&mut self, rate: f64) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * rate).min(self.capacity);
        self.last_refill = now;
    }
}

enum Gate {
    Periodic(Receiver<Instant>),
    TokenBucket(Mutex<Bucket>),
}

/// Blocks callers until they are admitted by the configured rate.
///
/// The periodic timer is owned by the limiter and released when it is dropped.
pub struct RateLimiter {
    config: RateLimitConfig,
    gate: Gate,
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("config", &self.config)
            .finish()
    }
}

impl RateLimiter {
    /// Create a limiter from a validated configuration
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InvalidConfig`] if the rate is not positive or the
    /// bucket burst is zero.
    pub fn new(config: RateLimitConfig) -> Result<Self> {
        config.validate()?;

        let gate = match config.strategy {
            RateLimitStrategy::Periodic => Gate::Periodic(channel::tick(config.period())),
            RateLimitStrategy::TokenBucket { burst } => Gate::TokenBucket(Mutex::new(Bucket {
                tokens: f64::from(burst),
                capacity: f64::from(burst),
                last_refill: Instant::now(),
            })),
        };

        Ok(Self { config, gate })
    }

    /// Limiter configuration
    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Block until the next admission slot.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Cancelled`] if `token` is cancelled while waiting.
    pub fn wait(&self, token: &CancellationToken) -> Result<()> {
        token.check()?;
        match &self.gate {
            Gate::Periodic(ticker) => crossbeam::select! {
                recv(ticker) -> _ => Ok(()),
                recv(token.signal()) -> _ => Err(token.to_error()),
            },
            Gate::TokenBucket(bucket) => loop {
                let delay = {
                    let mut bucket = bucket.lock();
                    bucket.refill(self.config.ops_per_second);
                    if bucket.tokens >= 1.0 {
                        bucket.tokens -= 1.0;
                        return Ok(());
                    }
                    Duration::from_secs_f64((1.0 - bucket.tokens) / self.config.ops_per_second)
                };
                crossbeam::select! {
                    recv(channel::after(delay)) -> _ => continue,
                    recv(token.signal()) -> _ => return Err(token.to_error()),
                }
            },
        }
    }

    /// Take an admission slot if one is available right now.
    pub fn try_acquire(&self) -> bool {
        match &self.gate {
            Gate::Periodic(ticker) => ticker.try_recv().is_ok(),
            Gate::TokenBucket(bucket) => {
                let mut bucket = bucket.lock();
                bucket.refill(self.config.ops_per_second);
                if bucket.tokens >= 1.0 {
                    bucket.tokens -= 1.0;
                    true
                } else {
                    false
                }
            }
        }
    }
}
