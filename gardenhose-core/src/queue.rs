//! Shared work queue between the stream listener and the worker pool.
//!
//! A multi-producer multi-consumer FIFO backed by a crossbeam channel, plus an
//! unfinished-task counter so callers can wait for the queue to drain:
//! - `put` increments the counter before the item becomes visible
//! - every `get` must be paired with a `task_done`
//! - `join` blocks until the counter returns to zero

use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam::channel::{
    self, Receiver, RecvTimeoutError, Sender, SendTimeoutError, TryRecvError, TrySendError,
};
use parking_lot::{Condvar, Mutex};

use crate::error::QueueError;

struct InnerQueue<T> {
    sender: Sender<T>,
    receiver: Receiver<T>,
    unfinished: Mutex<usize>,
    all_done: Condvar,
}

/// Thread-safe FIFO with drain tracking.
pub struct WorkQueue<T> {
    inner: Arc<InnerQueue<T>>,
}

impl<T> WorkQueue<T> {
    /// Creates a queue with no capacity bound.
    pub fn unbounded() -> Self {
        Self::from_channel(channel::unbounded())
    }

    /// Creates a queue holding at most `capacity` pending items.
    ///
    /// A capacity of zero means unbounded.
    pub fn with_capacity(capacity: usize) -> Self {
        if capacity == 0 {
            Self::unbounded()
        } else {
            Self::from_channel(channel::bounded(capacity))
        }
    }

    fn from_channel((sender, receiver): (Sender<T>, Receiver<T>)) -> Self {
        Self {
            inner: Arc::new(InnerQueue {
                sender,
                receiver,
                unfinished: Mutex::new(0),
                all_done: Condvar::new(),
            }),
        }
    }

    /// Creates new handle to the same queue.
    #[inline]
    pub fn share(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Enqueues an item, blocking only while a bounded queue is full.
    pub fn put(&self, item: T) -> Result<(), QueueError> {
        self.begin_task();
        self.inner.sender.send(item).map_err(|_| {
            self.abandon_task();
            QueueError::Disconnected
        })
    }

    /// Enqueues an item without blocking.
    pub fn try_put(&self, item: T) -> Result<(), QueueError> {
        self.begin_task();
        self.inner.sender.try_send(item).map_err(|e| {
            self.abandon_task();
            match e {
                TrySendError::Full(_) => QueueError::Full,
                TrySendError::Disconnected(_) => QueueError::Disconnected,
            }
        })
    }

    /// Enqueues an item, waiting at most `timeout` for room in a bounded queue.
    pub fn put_timeout(&self, item: T, timeout: Duration) -> Result<(), QueueError> {
        self.begin_task();
        self.inner.sender.send_timeout(item, timeout).map_err(|e| {
            self.abandon_task();
            match e {
                SendTimeoutError::Timeout(_) => QueueError::Timeout,
                SendTimeoutError::Disconnected(_) => QueueError::Disconnected,
            }
        })
    }

    /// Blocks until an item is available.
    pub fn get(&self) -> Result<T, QueueError> {
        self.inner
            .receiver
            .recv()
            .map_err(|_| QueueError::Disconnected)
    }

    /// Waits up to `timeout` for an item.
    pub fn get_timeout(&self, timeout: Duration) -> Result<Option<T>, QueueError> {
        match self.inner.receiver.recv_timeout(timeout) {
            Ok(item) => Ok(Some(item)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(QueueError::Disconnected),
        }
    }

    /// Returns an item if one is immediately available.
    pub fn try_get(&self) -> Result<Option<T>, QueueError> {
        match self.inner.receiver.try_recv() {
            Ok(item) => Ok(Some(item)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(QueueError::Disconnected),
        }
    }

    /// Acknowledges that one dequeued item has been fully processed.
    pub fn task_done(&self) -> Result<(), QueueError> {
        let mut unfinished = self.inner.unfinished.lock();
        if *unfinished == 0 {
            return Err(QueueError::TaskDoneUnderflow);
        }
        *unfinished -= 1;
        if *unfinished == 0 {
            self.inner.all_done.notify_all();
        }
        Ok(())
    }

    /// Blocks until every enqueued item has been acknowledged.
    pub fn join(&self) {
        let mut unfinished = self.inner.unfinished.lock();
        while *unfinished > 0 {
            self.inner.all_done.wait(&mut unfinished);
        }
    }

    /// Like [`WorkQueue::join`], giving up after `timeout`.
    ///
    /// Returns `true` if the queue drained.
    pub fn join_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut unfinished = self.inner.unfinished.lock();
        while *unfinished > 0 {
            if self
                .inner
                .all_done
                .wait_until(&mut unfinished, deadline)
                .timed_out()
            {
                return *unfinished == 0;
            }
        }
        true
    }

    /// Number of items waiting to be dequeued.
    #[inline]
    pub fn len(&self) -> usize {
        self.inner.receiver.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.receiver.is_empty()
    }

    /// Items enqueued but not yet acknowledged.
    pub fn unfinished(&self) -> usize {
        *self.inner.unfinished.lock()
    }

    fn begin_task(&self) {
        *self.inner.unfinished.lock() += 1;
    }

    fn abandon_task(&self) {
        let mut unfinished = self.inner.unfinished.lock();
        *unfinished = unfinished.saturating_sub(1);
        if *unfinished == 0 {
            self.inner.all_done.notify_all();
        }
    }
}
