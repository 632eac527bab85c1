//! Bounded FIFO queue with capacity limit and single close.

use super::{QueueError, QueueResult};
use crate::core::{CancellationToken, PoolError, Result};
use crossbeam::channel::{
    self, Receiver, RecvTimeoutError, Select, Sender, TryRecvError, TrySendError,
};
use parking_lot::RwLock;
use std::time::Duration;

/// A bounded FIFO queue with configurable capacity.
///
/// Sends block while the queue is full, receives block while it is empty.
/// The queue owns the only long-lived [`Sender`]; [`close`](Self::close)
/// drops it, so receivers drain what is buffered and then observe
/// [`QueueError::Disconnected`].
///
/// # Example
///
/// ```rust
/// use rust_worker_pool::queue::{BoundedQueue, QueueError};
///
/// let queue = BoundedQueue::new(2).unwrap();
/// queue.send(1).unwrap();
/// queue.send(2).unwrap();
///
/// // Queue is now full - try_send will fail and hand the item back
/// assert_eq!(queue.try_send(3), Err(QueueError::Full(3)));
///
/// queue.close().unwrap();
/// assert_eq!(queue.recv(), Ok(1));
/// assert_eq!(queue.recv(), Ok(2));
/// assert_eq!(queue.recv(), Err(QueueError::Disconnected));
/// ```
pub struct BoundedQueue<T> {
    name: String,
    sender: RwLock<Option<Sender<T>>>,
    receiver: Receiver<T>,
    capacity: usize,
}

impl<T> std::fmt::Debug for BoundedQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundedQueue")
            .field("name", &self.name)
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl<T> BoundedQueue<T> {
    /// Creates a new bounded queue with the specified capacity.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InvalidConfig`] if `capacity` is 0.
    pub fn new(capacity: usize) -> Result<Self> {
        Self::named("queue", capacity)
    }

    /// Creates a new bounded queue with a name used in errors and logs.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InvalidConfig`] if `capacity` is 0.
    pub fn named(name: impl Into<String>, capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(PoolError::invalid_config(
                "capacity",
                "Queue capacity must be greater than 0",
            ));
        }
        let (sender, receiver) = channel::bounded(capacity);
        Ok(Self {
            name: name.into(),
            sender: RwLock::new(Some(sender)),
            receiver,
            capacity,
        })
    }

    /// Queue name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the maximum capacity of this queue.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the number of buffered items.
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    /// Returns `true` if nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    /// Returns `true` if the queue has been closed.
    pub fn is_closed(&self) -> bool {
        self.sender.read().is_none()
    }

    // Cloned out of the lock so a blocking send never holds it.
    fn sender(&self) -> Option<Sender<T>> {
        self.sender.read().clone()
    }

    /// Sends an item, blocking while the queue is full.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Closed`] with the item if the queue has been closed.
    pub fn send(&self, item: T) -> QueueResult<(), T> {
        match self.sender() {
            Some(sender) => sender.send(item).map_err(|e| QueueError::Closed(e.0)),
            None => Err(QueueError::Closed(item)),
        }
    }

    /// Sends an item, blocking while the queue is full or until `token` is cancelled.
    ///
    /// # Errors
    ///
    /// - [`QueueError::Closed`] if the queue has been closed
    /// - [`QueueError::Cancelled`] with the item if the token was cancelled first
    pub fn send_cancellable(&self, item: T, token: &CancellationToken) -> QueueResult<(), T> {
        let sender = match self.sender() {
            Some(sender) => sender,
            None => return Err(QueueError::Closed(item)),
        };
        // Fast path avoids select! when there is room.
        let item = match sender.try_send(item) {
            Ok(()) => return Ok(()),
            Err(TrySendError::Disconnected(item)) => return Err(QueueError::Closed(item)),
            Err(TrySendError::Full(item)) => item,
        };
        if token.is_cancelled() {
            return Err(QueueError::Cancelled(Some(item)));
        }

        let mut sel = Select::new();
        let send_index = sel.send(&sender);
        sel.recv(token.signal());
        let oper = sel.select();
        if oper.index() == send_index {
            oper.send(&sender, item).map_err(|e| QueueError::Closed(e.0))
        } else {
            let _ = oper.recv(token.signal());
            Err(QueueError::Cancelled(Some(item)))
        }
    }

    /// Attempts to send an item without blocking.
    ///
    /// # Errors
    ///
    /// - [`QueueError::Full`] if the queue is full
    /// - [`QueueError::Closed`] if the queue has been closed
    pub fn try_send(&self, item: T) -> QueueResult<(), T> {
        let sender = match self.sender() {
            Some(sender) => sender,
            None => return Err(QueueError::Closed(item)),
        };
        sender.try_send(item).map_err(|e| match e {
            TrySendError::Full(item) => QueueError::Full(item),
            TrySendError::Disconnected(item) => QueueError::Closed(item),
        })
    }

    /// Sends an item with a timeout.
    ///
    /// # Errors
    ///
    /// - [`QueueError::Timeout`] if no space became available in time
    /// - [`QueueError::Closed`] if the queue has been closed
    pub fn send_timeout(&self, item: T, timeout: Duration) -> QueueResult<(), T> {
        let sender = match self.sender() {
            Some(sender) => sender,
            None => return Err(QueueError::Closed(item)),
        };
        sender.send_timeout(item, timeout).map_err(|e| match e {
            channel::SendTimeoutError::Timeout(item) => QueueError::Timeout(item),
            channel::SendTimeoutError::Disconnected(item) => QueueError::Closed(item),
        })
    }

    /// Receives an item, blocking until one is available.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Disconnected`] once the queue is closed and empty.
    pub fn recv(&self) -> QueueResult<T, T> {
        self.receiver.recv().map_err(|_| QueueError::Disconnected)
    }

    /// Receives an item, blocking until one is available or `token` is cancelled.
    ///
    /// # Errors
    ///
    /// - [`QueueError::Disconnected`] once the queue is closed and empty
    /// - [`QueueError::Cancelled`] if the token was cancelled
    pub fn recv_cancellable(&self, token: &CancellationToken) -> QueueResult<T, T> {
        if token.is_cancelled() {
            return Err(QueueError::Cancelled(None));
        }
        crossbeam::select! {
            recv(self.receiver) -> msg => msg.map_err(|_| QueueError::Disconnected),
            recv(token.signal()) -> _ => Err(QueueError::Cancelled(None)),
        }
    }

    /// Attempts to receive an item without blocking.
    ///
    /// # Errors
    ///
    /// - [`QueueError::Empty`] if nothing is buffered
    /// - [`QueueError::Disconnected`] if the queue is closed and empty
    pub fn try_recv(&self) -> QueueResult<T, T> {
        self.receiver.try_recv().map_err(|e| match e {
            TryRecvError::Empty => QueueError::Empty,
            TryRecvError::Disconnected => QueueError::Disconnected,
        })
    }

    /// Receives an item with a timeout.
    ///
    /// # Errors
    ///
    /// - [`QueueError::Empty`] if nothing arrived within the timeout
    /// - [`QueueError::Disconnected`] if the queue is closed and empty
    pub fn recv_timeout(&self, timeout: Duration) -> QueueResult<T, T> {
        self.receiver.recv_timeout(timeout).map_err(|e| match e {
            RecvTimeoutError::Timeout => QueueError::Empty,
            RecvTimeoutError::Disconnected => QueueError::Disconnected,
        })
    }

    /// Closes the queue. Buffered items remain receivable.
    ///
    /// Only the queue's designated writer may close it, exactly once.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::AlreadyClosed`] on a second call.
    pub fn close(&self) -> QueueResult<(), T> {
        match self.sender.write().take() {
            Some(_) => Ok(()),
            None => Err(QueueError::AlreadyClosed),
        }
    }
}
