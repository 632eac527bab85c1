//! Bounded FIFO queues connecting the producer, the workers and the collector.
//!
//! [`BoundedQueue`] is a multi-producer multi-consumer channel with a fixed
//! capacity and an explicit, single [`close`](BoundedQueue::close). Closing
//! stops new sends; items already buffered are still delivered, and receivers
//! see [`QueueError::Disconnected`] once the queue is closed *and* drained.
//!
//! Failed sends hand the item back inside the error so the caller can decide
//! what to do with it.

mod bounded;

pub use bounded::BoundedQueue;

use crate::core::PoolError;

/// Errors that can occur during queue operations.
///
/// Variants that carry `T` return the rejected item to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueError<T> {
    /// Queue is full (non-blocking send)
    Full(T),
    /// Queue is closed and not accepting new items
    Closed(T),
    /// Queue was already closed by its designated writer
    AlreadyClosed,
    /// Queue is empty (non-blocking or timed receive)
    Empty,
    /// Queue is closed and every buffered item has been received
    Disconnected,
    /// Timed send expired
    Timeout(T),
    /// A cancellable operation was interrupted; sends return the item
    Cancelled(Option<T>),
}

impl<T> QueueError<T> {
    /// Takes the rejected item out of the error, if it carries one.
    pub fn into_inner(self) -> Option<T> {
        match self {
            QueueError::Full(item) | QueueError::Closed(item) | QueueError::Timeout(item) => {
                Some(item)
            }
            QueueError::Cancelled(item) => item,
            QueueError::AlreadyClosed | QueueError::Empty | QueueError::Disconnected => None,
        }
    }

    /// Converts into a [`PoolError`], naming the queue involved.
    pub fn into_pool_error(self, queue: &str) -> PoolError {
        match self {
            QueueError::Closed(_) => PoolError::queue_closed(queue),
            QueueError::AlreadyClosed => PoolError::queue_already_closed(queue),
            QueueError::Cancelled(_) => {
                PoolError::cancelled(format!("operation on queue '{}' interrupted", queue))
            }
            other => PoolError::other(format!("queue '{}': {}", queue, other)),
        }
    }
}

impl<T> std::fmt::Display for QueueError<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueueError::Full(_) => write!(f, "queue is full"),
            QueueError::Closed(_) => write!(f, "queue is closed"),
            QueueError::AlreadyClosed => write!(f, "queue was already closed"),
            QueueError::Empty => write!(f, "queue is empty"),
            QueueError::Disconnected => write!(f, "queue is closed and drained"),
            QueueError::Timeout(_) => write!(f, "operation timed out"),
            QueueError::Cancelled(_) => write!(f, "operation cancelled"),
        }
    }
}

impl<T: std::fmt::Debug> std::error::Error for QueueError<T> {}

/// Result type for queue operations; `T` is the queue's item type.
pub type QueueResult<R, T> = std::result::Result<R, QueueError<T>>;
