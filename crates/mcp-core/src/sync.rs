//! Condvar-style wait primitives.
//!
//! Two places in this workspace need a thread to block until another thread
//! hands it a value, bounded by a deadline: the client correlator waiting on
//! a specific request id's response, and the connection pool waiting
//! for a slot to free up. Both are modeled here as a single-slot
//! [`WaitCell`] built on [`tokio::sync::Notify`] rather than a raw condvar,
//! since every caller in this workspace already runs on a tokio runtime.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;

/// A single-slot, wait-once cell: one side calls [`WaitCell::complete`], the
/// other calls [`WaitCell::wait`]. Safe to call `complete` before `wait`
/// starts — the value sits in the slot until collected.
#[derive(Debug)]
pub struct WaitCell<T> {
    slot: Mutex<Option<T>>,
    notify: Notify,
}

impl<T> WaitCell<T> {
    /// Create an empty cell.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            slot: Mutex::new(None),
            notify: Notify::new(),
        })
    }

    /// Place `value` in the slot and wake any waiter. The second call to
    /// `complete` on an already-filled cell overwrites the value silently —
    /// callers are expected to complete a cell exactly once.
    pub fn complete(&self, value: T) {
        *self.slot.lock() = Some(value);
        self.notify.notify_one();
    }

    /// Block until a value is available or `timeout` elapses.
    ///
    /// Uses the notify-then-check pattern: register interest before
    /// checking the slot, so a `complete` racing with the start of this call
    /// can never be missed. The client correlator relies on this to avoid a
    /// lost wakeup when the response arrives between registration and wait.
    pub async fn wait(&self, timeout: Duration) -> Option<T> {
        if let Some(value) = self.slot.lock().take() {
            return Some(value);
        }
        let notified = self.notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        if let Some(value) = self.slot.lock().take() {
            return Some(value);
        }

        match tokio::time::timeout(timeout, notified).await {
            Ok(()) => self.slot.lock().take(),
            Err(_) => None,
        }
    }

    /// `true` if a value has been placed but not yet collected.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.slot.lock().is_some()
    }
}

impl<T> Default for WaitCell<T> {
    fn default() -> Self {
        Self {
            slot: Mutex::new(None),
            notify: Notify::new(),
        }
    }
}

/// A countdown latch: `wait` blocks until `count` calls to [`Latch::count_down`]
/// have happened, used by the pool to wait for in-flight connections to
/// drain during a graceful shrink.
#[derive(Debug)]
pub struct Latch {
    remaining: Mutex<usize>,
    notify: Notify,
}

impl Latch {
    /// Create a latch that opens after `count` calls to `count_down`.
    #[must_use]
    pub fn new(count: usize) -> Self {
        Self {
            remaining: Mutex::new(count),
            notify: Notify::new(),
        }
    }

    /// Decrement the latch, waking any waiter if it reaches zero.
    pub fn count_down(&self) {
        let mut remaining = self.remaining.lock();
        if *remaining > 0 {
            *remaining -= 1;
            if *remaining == 0 {
                self.notify.notify_waiters();
            }
        }
    }

    /// Block until the latch reaches zero.
    pub async fn wait(&self) {
        loop {
            if *self.remaining.lock() == 0 {
                return;
            }
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if *self.remaining.lock() == 0 {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn wait_cell_round_trips_completed_before_wait() {
        let cell = WaitCell::new();
        cell.complete(42);
        let value = cell.wait(Duration::from_millis(100)).await;
        assert_eq!(value, Some(42));
    }

    #[tokio::test]
    async fn wait_cell_times_out_with_no_complete() {
        let cell: Arc<WaitCell<u32>> = WaitCell::new();
        let value = cell.wait(Duration::from_millis(20)).await;
        assert_eq!(value, None);
    }

    #[tokio::test]
    async fn wait_cell_wakes_concurrent_waiter() {
        let cell = WaitCell::new();
        let waiter = Arc::clone(&cell);
        let handle = tokio::spawn(async move { waiter.wait(Duration::from_secs(1)).await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        cell.complete("done");
        assert_eq!(handle.await.unwrap(), Some("done"));
    }

    #[tokio::test]
    async fn latch_opens_after_count_reaches_zero() {
        let latch = Arc::new(Latch::new(2));
        latch.count_down();
        let waiter = Arc::clone(&latch);
        let handle = tokio::spawn(async move { waiter.wait().await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        latch.count_down();
        handle.await.unwrap();
    }
}
