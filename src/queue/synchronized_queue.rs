use std::collections::VecDeque;
use std::fmt::Debug;
use std::time::Duration;
use std::time::Instant;

use parking_lot::Condvar;
use parking_lot::Mutex;
use parking_lot::MutexGuard;

/// Reason a [`SynchronizedQueue::pop`] returned without an item
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PopError {
    /// No item arrived before the timeout elapsed
    #[error("queue pop timed out")]
    TimedOut,

    /// [`SynchronizedQueue::wake_all`] was called while waiting
    #[error("queue pop interrupted")]
    Interrupted,
}

struct QueueState<T> {
    items: VecDeque<T>,
    /// Bumped by `wake_all` so blocked consumers can tell a wakeup from a push
    wakeups: u64,
}

/// Unbounded multi-producer FIFO with a blocking, timed `pop`.
///
/// `push` never blocks and never fails; there is no backpressure. Any number
/// of threads may push concurrently. Consumers block in `pop` until an item
/// arrives, the timeout elapses, or `wake_all` is called.
pub struct SynchronizedQueue<T> {
    state: Mutex<QueueState<T>>,
    available: Condvar,
}

impl<T> Debug for SynchronizedQueue<T> {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("SynchronizedQueue")
            .field("size", &self.size())
            .finish()
    }
}

impl<T> Default for SynchronizedQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SynchronizedQueue<T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                items: VecDeque::new(),
                wakeups: 0,
            }),
            available: Condvar::new(),
        }
    }

    /// Appends an item and wakes one waiting consumer, if any.
    pub fn push(
        &self,
        item: T,
    ) {
        self.state.lock().items.push_back(item);
        self.available.notify_one();
    }

    /// Removes the oldest item, blocking for at most `timeout`.
    ///
    /// Items are always preferred over an interrupt: if an item is queued
    /// when the consumer wakes up it is returned.
    pub fn pop(
        &self,
        timeout: Duration,
    ) -> Result<T, PopError> {
        let mut state = self.state.lock();
        let epoch = state.wakeups;
        self.wait_pop(&mut state, epoch, timeout)
    }

    /// Like [`pop`](Self::pop), but also interrupted by any `wake_all` issued
    /// after `epoch` was read with [`wakeup_epoch`](Self::wakeup_epoch).
    ///
    /// A consumer that reads the epoch before checking its own stop condition
    /// cannot miss a wakeup sent in between.
    pub fn pop_since(
        &self,
        epoch: u64,
        timeout: Duration,
    ) -> Result<T, PopError> {
        let mut state = self.state.lock();
        self.wait_pop(&mut state, epoch, timeout)
    }

    pub fn wakeup_epoch(&self) -> u64 {
        self.state.lock().wakeups
    }

    fn wait_pop(
        &self,
        state: &mut MutexGuard<'_, QueueState<T>>,
        epoch: u64,
        timeout: Duration,
    ) -> Result<T, PopError> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(item) = state.items.pop_front() {
                return Ok(item);
            }
            if state.wakeups != epoch {
                return Err(PopError::Interrupted);
            }
            if self.available.wait_until(state, deadline).timed_out() {
                return state.items.pop_front().ok_or(PopError::TimedOut);
            }
        }
    }

    /// Non-blocking variant of [`pop`](Self::pop).
    pub fn try_pop(&self) -> Option<T> {
        self.state.lock().items.pop_front()
    }

    /// Snapshot of the number of queued items.
    pub fn size(&self) -> usize {
        self.state.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Wakes every blocked consumer; each returns [`PopError::Interrupted`]
    /// unless an item is available.
    pub fn wake_all(&self) {
        let mut state = self.state.lock();
        state.wakeups = state.wakeups.wrapping_add(1);
        drop(state);
        self.available.notify_all();
    }
}
