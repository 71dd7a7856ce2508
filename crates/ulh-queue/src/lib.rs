// SPDX-License-Identifier: MIT OR Apache-2.0
//! Bounded background queue for best-effort writes (spec §9): balance
//! increments, transfer logs, and call log records all go through a
//! queue like this one so that a slow or unavailable sink never makes
//! the caller wait on the response path. The queue applies backpressure
//! under load instead of growing without bound, and exposes its current
//! depth so it can be wired into a metric.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::mpsc::{self, Receiver, Sender};

/// Error returned when an item could not be accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueError {
    /// The queue is at capacity; the caller should drop the item or
    /// handle it synchronously rather than retry, since this queue
    /// exists precisely to avoid blocking the caller.
    Full {
        /// The queue's configured capacity.
        capacity: usize,
    },
    /// The background worker has stopped draining the queue.
    Closed,
}

impl fmt::Display for QueueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full { capacity } => write!(f, "queue is full (capacity {capacity})"),
            Self::Closed => write!(f, "queue worker has stopped"),
        }
    }
}

impl std::error::Error for QueueError {}

/// A bounded, FIFO, backpressure-aware handle for enqueueing best-effort
/// work. Cloning shares the same underlying channel and depth counter.
#[derive(Clone)]
pub struct WorkQueue<T> {
    sender: Sender<T>,
    depth: Arc<AtomicUsize>,
    capacity: usize,
}

impl<T> WorkQueue<T>
where
    T: Send + 'static,
{
    /// Create a queue of the given capacity and spawn a background task
    /// that drains it by calling `handler` on each item in order. The
    /// worker runs until every [`WorkQueue`] handle (and the one held by
    /// the spawned task) is dropped.
    #[must_use]
    pub fn spawn<F, Fut>(capacity: usize, handler: F) -> Self
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let depth = Arc::new(AtomicUsize::new(0));
        tokio::spawn(drain(receiver, depth.clone(), handler));
        Self { sender, depth, capacity }
    }

    /// Enqueue `item` without blocking. Returns [`QueueError::Full`]
    /// immediately if the queue is at capacity; callers must not retry
    /// in a loop on the response path, since that would defeat the
    /// point of a best-effort queue.
    pub fn try_enqueue(&self, item: T) -> Result<(), QueueError> {
        match self.sender.try_send(item) {
            Ok(()) => {
                self.depth.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
            Err(TrySendError::Full(_)) => {
                tracing::warn!(capacity = self.capacity, "work queue full, dropping item");
                Err(QueueError::Full { capacity: self.capacity })
            }
            Err(TrySendError::Closed(_)) => Err(QueueError::Closed),
        }
    }

    /// Current number of items waiting to be drained. Intended to be
    /// read on an interval and exported as a gauge.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::SeqCst)
    }

    /// The capacity this queue was created with.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

async fn drain<T, F, Fut>(mut receiver: Receiver<T>, depth: Arc<AtomicUsize>, handler: F)
where
    F: Fn(T) -> Fut,
    Fut: std::future::Future<Output = ()>,
{
    while let Some(item) = receiver.recv().await {
        handler(item).await;
        depth.fetch_sub(1, Ordering::SeqCst);
    }
}
