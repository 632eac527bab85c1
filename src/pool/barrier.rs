//! Completion barrier for a dynamic set of workers.
//!
//! Workers hold a [`BarrierGuard`] for their whole lifetime. [`wait`] returns
//! once every guard has been dropped and then seals the barrier, after which
//! no new worker can register. Guards are released on unwind too, so a
//! panicking worker can never leave the barrier waiting forever.
//!
//! [`wait`]: CompletionBarrier::wait

use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct BarrierState {
    active: usize,
    sealed: bool,
}

/// Counts live workers and wakes waiters when the count drops to zero.
#[derive(Debug, Default)]
pub struct CompletionBarrier {
    state: Mutex<BarrierState>,
    done: Condvar,
}

impl CompletionBarrier {
    /// Create an empty, unsealed barrier
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a worker. Returns `None` once the barrier has been sealed.
    pub fn register(self: &Arc<Self>) -> Option<BarrierGuard> {
        let mut state = self.state.lock();
        if state.sealed {
            return None;
        }
        state.active += 1;
        Some(BarrierGuard {
            barrier: Arc::clone(self),
        })
    }

    /// Block until no worker is registered, then seal the barrier.
    pub fn wait(&self) {
        let mut state = self.state.lock();
        while state.active > 0 {
            self.done.wait(&mut state);
        }
        state.sealed = true;
    }

    /// Like [`wait`](Self::wait) but gives up after `timeout`.
    ///
    /// Returns `true` if the barrier was reached (and is now sealed).
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        while state.active > 0 {
            if self.done.wait_until(&mut state, deadline).timed_out() && state.active > 0 {
                return false;
            }
        }
        state.sealed = true;
        true
    }

    /// Number of registered workers still running
    pub fn active(&self) -> usize {
        self.state.lock().active
    }

    /// Returns `true` once [`wait`](Self::wait) has returned
    pub fn is_complete(&self) -> bool {
        self.state.lock().sealed
    }

    fn release(&self) {
        let mut state = self.state.lock();
        state.active -= 1;
        if state.active == 0 {
            self.done.notify_all();
        }
    }
}

/// Registration held by one worker; dropping it signals that the worker exited.
#[derive(Debug)]
pub struct BarrierGuard {
    barrier: Arc<CompletionBarrier>,
}

impl Drop for BarrierGuard {
    fn drop(&mut self) {
        self.barrier.release();
    }
}
