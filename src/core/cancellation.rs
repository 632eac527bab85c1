//! Cooperative cancellation for workers and blocking queue operations
//!
//! A [`CancellationToken`] is shared between the pool and every worker. Besides
//! the usual lock-free [`is_cancelled`](CancellationToken::is_cancelled) check it
//! exposes a [`signal`](CancellationToken::signal) receiver that becomes
//! disconnected on cancellation, so it can take part in a `crossbeam::select!`
//! next to a queue operation or a timer.
//!
//! # Example
//!
//! ```rust
//! use rust_worker_pool::CancellationToken;
//!
//! let parent = CancellationToken::new();
//! let child = parent.child();
//!
//! parent.cancel();
//!
//! assert!(parent.is_cancelled());
//! assert!(child.is_cancelled());
//! ```

use crate::core::{PoolError, Result};
use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

/// Reason for cancellation
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CancellationReason {
    /// Explicitly cancelled via `cancel()`
    Manual,
    /// Cancelled by a pool shutdown request
    Shutdown,
    /// Cancelled because the parent token was cancelled
    ParentCancelled,
    /// Custom cancellation reason
    Custom(String),
}

impl std::fmt::Display for CancellationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CancellationReason::Manual => write!(f, "manually cancelled"),
            CancellationReason::Shutdown => write!(f, "pool shutdown requested"),
            CancellationReason::ParentCancelled => write!(f, "parent was cancelled"),
            CancellationReason::Custom(msg) => write!(f, "{}", msg),
        }
    }
}

struct CancellationTokenInner {
    cancelled: AtomicBool,
    children: RwLock<Vec<Weak<CancellationTokenInner>>>,
    reason: RwLock<Option<CancellationReason>>,
    /// Dropped on cancel; never used to send.
    trigger: Mutex<Option<Sender<()>>>,
    signal: Receiver<()>,
}

impl CancellationTokenInner {
    fn new() -> Self {
        let (trigger, signal) = channel::bounded(0);
        Self {
            cancelled: AtomicBool::new(false),
            children: RwLock::new(Vec::new()),
            reason: RwLock::new(None),
            trigger: Mutex::new(Some(trigger)),
            signal,
        }
    }
}

/// A thread-safe cancellation token shared by a pool and its workers
///
/// Cloning is cheap; all clones observe the same state.
///
/// # Example
///
/// ```rust
/// use rust_worker_pool::CancellationToken;
/// use std::thread;
/// use std::time::Duration;
///
/// let token = CancellationToken::new();
/// let waiter = token.clone();
///
/// let handle = thread::spawn(move || {
///     // Blocks until the token is cancelled
///     let _ = waiter.signal().recv();
///     waiter.is_cancelled()
/// });
///
/// thread::sleep(Duration::from_millis(20));
/// token.cancel();
/// assert!(handle.join().unwrap());
/// ```
#[derive(Clone)]
pub struct CancellationToken {
    inner: Arc<CancellationTokenInner>,
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .field("reason", &self.reason())
            .finish()
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancellationToken {
    /// Create a new cancellation token (not cancelled)
    pub fn new() -> Self {
        Self {
            inner: Arc::new(CancellationTokenInner::new()),
        }
    }

    /// Creates a child token linked to this parent
    ///
    /// The child is cancelled when the parent is cancelled. Cancelling the
    /// child does not affect the parent.
    pub fn child(&self) -> Self {
        let child = CancellationToken::new();

        {
            let mut children = self.inner.children.write();
            // Drop links to children that no longer exist
            children.retain(|weak| weak.strong_count() > 0);
            children.push(Arc::downgrade(&child.inner));
        }

        if self.is_cancelled() {
            child.cancel_with_reason(CancellationReason::ParentCancelled);
        }

        child
    }

    /// Cancel this token with default reason (Manual)
    pub fn cancel(&self) {
        self.cancel_with_reason(CancellationReason::Manual);
    }

    /// Cancel this token with a specific reason
    ///
    /// Idempotent: only the first call records its reason.
    pub fn cancel_with_reason(&self, reason: CancellationReason) {
        if self.inner.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }

        *self.inner.reason.write() = Some(reason);

        // Disconnect the signal channel to wake every select! waiting on it
        drop(self.inner.trigger.lock().take());

        let children = self.inner.children.read();
        for child_weak in children.iter() {
            if let Some(child_inner) = child_weak.upgrade() {
                let child_token = CancellationToken { inner: child_inner };
                child_token.cancel_with_reason(CancellationReason::ParentCancelled);
            }
        }
    }

    /// Check if this token has been cancelled
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Returns the cancellation reason (if cancelled)
    pub fn reason(&self) -> Option<CancellationReason> {
        self.inner.reason.read().clone()
    }

    /// Returns error if cancelled, `Ok(())` otherwise
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(self.to_error())
        } else {
            Ok(())
        }
    }

    /// Receiver that never yields a message and disconnects on cancellation.
    ///
    /// Use it as a `recv` arm of `crossbeam::select!` to make any blocking
    /// operation cancellable.
    pub fn signal(&self) -> &Receiver<()> {
        &self.inner.signal
    }

    /// Build the [`PoolError::Cancelled`] describing this token's reason
    pub(crate) fn to_error(&self) -> PoolError {
        let reason = self
            .reason()
            .map(|r| r.to_string())
            .unwrap_or_else(|| "cancelled".to_string());
        PoolError::cancelled(reason)
    }
}
