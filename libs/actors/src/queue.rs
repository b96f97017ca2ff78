//! Work Queue
//!
//! Thread-safe FIFO of deferred actions backing every executor mailbox.
//! Backed by a crossbeam channel: multi-producer, single consumer by
//! contract (only the owning executor's worker dequeues).
//!
//! ## Backpressure
//! - **Unbounded** (`capacity == 0`): `enqueue` never blocks
//! - **Bounded**: `enqueue` blocks the producer until the worker frees a slot
//!
//! Enqueueing onto a full bounded queue from the worker thread that drains
//! it deadlocks; actions must not post to their own bounded mailbox in a
//! loop larger than its capacity. The same holds for two workers posting to
//! each other: if each can have more requests in flight than the other's
//! capacity, both block on a full mailbox and neither drains.

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError};
use std::fmt;
use std::time::Duration;

/// A unit of deferred work
pub type Action = Box<dyn FnOnce() + Send + 'static>;

/// FIFO mailbox of actions
pub struct WorkQueue {
    tx: Sender<Action>,
    rx: Receiver<Action>,
    capacity: Option<usize>,
}

impl WorkQueue {
    /// Create a queue; `capacity == 0` means unbounded
    pub fn new(capacity: usize) -> Self {
        if capacity == 0 {
            Self::unbounded()
        } else {
            Self::bounded(capacity)
        }
    }

    /// Create a queue that never blocks producers
    pub fn unbounded() -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        Self {
            tx,
            rx,
            capacity: None,
        }
    }

    /// Create a queue that blocks producers once `capacity` actions are pending
    ///
    /// # Panics
    /// Panics if `capacity` is zero; use [`WorkQueue::unbounded`] instead.
    pub fn bounded(capacity: usize) -> Self {
        assert!(capacity > 0, "bounded work queue capacity must be > 0");
        let (tx, rx) = crossbeam_channel::bounded(capacity);
        Self {
            tx,
            rx,
            capacity: Some(capacity),
        }
    }

    /// Append an action, blocking while a bounded queue is full.
    ///
    /// The action is handed back if the queue can no longer accept work.
    pub fn enqueue(&self, action: Action) -> Result<(), Action> {
        self.tx.send(action).map_err(|e| e.into_inner())
    }

    /// Append an action without blocking.
    ///
    /// The action is handed back when a bounded queue is full.
    pub fn try_enqueue(&self, action: Action) -> Result<(), Action> {
        self.tx.try_send(action).map_err(|e| match e {
            TrySendError::Full(action) | TrySendError::Disconnected(action) => action,
        })
    }

    /// Remove the oldest action, waiting up to `timeout` for one to arrive
    pub fn dequeue_timeout(&self, timeout: Duration) -> Option<Action> {
        match self.rx.recv_timeout(timeout) {
            Ok(action) => Some(action),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Remove the oldest action if one is pending
    pub fn try_dequeue(&self) -> Option<Action> {
        self.rx.try_recv().ok()
    }

    /// Number of pending actions
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Capacity of a bounded queue, `None` when unbounded
    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }
}

impl fmt::Debug for WorkQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkQueue")
            .field("pending", &self.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}
