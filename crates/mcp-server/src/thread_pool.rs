//! Bounded task queue with a fixed (resizable) set of worker tasks.
//!
//! The C original spawns `N` OS threads pulling from a bounded FIFO. The
//! async translation keeps the topology exactly: `N` long-lived tokio tasks
//! share one bounded `mpsc` receiver behind a mutex, each pulling and
//! awaiting one job at a time, so at most `N` dispatched requests ever run
//! concurrently regardless of how many more tokio worker threads the
//! runtime itself has. Closing the sender lets every already-queued job
//! drain before workers observe the channel close — the "finish in-flight,
//! then exit" shutdown policy falls out of `mpsc`'s own semantics.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use tokio::sync::{Mutex as AsyncMutex, mpsc};
use tokio::task::JoinHandle;

type Job = Pin<Box<dyn Future<Output = ()> + Send>>;

enum Envelope {
    Task(Job),
    Terminate,
}

/// Lock-free-read counters for `submitted`/`completed`/`failed`/`active`.
/// Reads may be non-linearizable with concurrent writers, as the design
/// allows.
#[derive(Default)]
pub struct PoolStats {
    submitted: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    active: AtomicUsize,
}

impl PoolStats {
    /// Tasks submitted since the pool was created.
    pub fn submitted(&self) -> u64 {
        self.submitted.load(Ordering::Relaxed)
    }
    /// Tasks that ran to completion.
    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }
    /// Tasks rejected with [`PoolError::Busy`].
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
    /// Tasks currently executing.
    pub fn active(&self) -> usize {
        self.active.load(Ordering::Relaxed)
    }
}

/// Error returned by [`ThreadPool::submit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolError {
    /// The bounded queue was full.
    Busy,
}

/// A bounded queue of jobs served by `N` worker tasks.
pub struct ThreadPool {
    sender: mpsc::Sender<Envelope>,
    receiver: Arc<AsyncMutex<mpsc::Receiver<Envelope>>>,
    workers: std::sync::Mutex<Vec<JoinHandle<()>>>,
    stats: Arc<PoolStats>,
}

impl ThreadPool {
    /// Create a pool with `workers` worker tasks and a queue of capacity
    /// `queue_capacity`.
    #[must_use]
    pub fn new(workers: usize, queue_capacity: usize) -> Arc<Self> {
        let (sender, receiver) = mpsc::channel(queue_capacity.max(1));
        let pool = Arc::new(Self {
            sender,
            receiver: Arc::new(AsyncMutex::new(receiver)),
            workers: std::sync::Mutex::new(Vec::new()),
            stats: Arc::new(PoolStats::default()),
        });
        pool.spawn_workers(workers.max(1));
        pool
    }

    fn spawn_workers(&self, count: usize) {
        let mut handles = self.workers.lock().expect("thread pool worker list poisoned");
        for _ in 0..count {
            let receiver = self.receiver.clone();
            let stats = self.stats.clone();
            handles.push(tokio::spawn(async move {
                worker_loop(receiver, stats).await;
            }));
        }
    }

    /// Queue a job for execution. Returns [`PoolError::Busy`] immediately if
    /// the queue is full, mirroring `submit`'s non-blocking configuration.
    pub fn submit<F>(&self, job: F) -> Result<(), PoolError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        match self.sender.try_send(Envelope::Task(Box::pin(job))) {
            Ok(()) => {
                self.stats.submitted.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(_) => {
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                Err(PoolError::Busy)
            }
        }
    }

    /// Counters for observability.
    #[must_use]
    pub fn stats(&self) -> &PoolStats {
        &self.stats
    }

    /// Grow the pool by spawning `new_n - current` additional workers.
    /// No-op if `new_n` is not larger than the current worker count.
    pub fn grow_to(self: &Arc<Self>, new_n: usize) {
        let current = self.workers.lock().expect("thread pool worker list poisoned").len();
        if new_n > current {
            self.spawn_workers(new_n - current);
        }
    }

    /// Shrink the pool by enqueueing `current - new_n` exit-only
    /// terminators; workers consuming one exit after finishing whatever
    /// task they are already running. No-op if `new_n` is not smaller than
    /// the current worker count.
    pub async fn shrink_to(&self, new_n: usize) {
        let current = self.workers.lock().expect("thread pool worker list poisoned").len();
        for _ in new_n..current {
            let _ = self.sender.send(Envelope::Terminate).await;
        }
    }

    /// Stop accepting new jobs and wait for every queued job to drain and
    /// every worker to exit.
    pub async fn shutdown(self: Arc<Self>) {
        drop(self.sender.clone());
        let handles = std::mem::take(&mut *self.workers.lock().expect("thread pool worker list poisoned"));
        // Dropping our own sender handle isn't enough while `self` (and thus
        // a clone of `sender`) is still held elsewhere; closing explicitly
        // guarantees `recv` eventually observes `None` once the queue drains.
        self.sender.closed().await;
        for handle in handles {
            let _ = handle.await;
        }
    }
}

async fn worker_loop(receiver: Arc<AsyncMutex<mpsc::Receiver<Envelope>>>, stats: Arc<PoolStats>) {
    loop {
        let envelope = {
            let mut guard = receiver.lock().await;
            guard.recv().await
        };
        match envelope {
            Some(Envelope::Task(job)) => {
                stats.active.fetch_add(1, Ordering::Relaxed);
                job.await;
                stats.active.fetch_sub(1, Ordering::Relaxed);
                stats.completed.fetch_add(1, Ordering::Relaxed);
            }
            Some(Envelope::Terminate) | None => return,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;
    use std::time::Duration;

    #[tokio::test]
    async fn submitted_tasks_all_run() {
        let pool = ThreadPool::new(4, 64);
        let counter = Arc::new(AtomicU32::new(0));
        for _ in 0..50 {
            let counter = counter.clone();
            pool.submit(async move {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 50);
        assert_eq!(pool.stats().completed(), 50);
    }

    #[tokio::test]
    async fn full_queue_returns_busy() {
        let pool = ThreadPool::new(1, 1);
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        pool.submit(async move {
            let _ = rx.await;
        })
        .unwrap();
        // One job is taken by the single worker, filling the queue slot
        // with a second that can't be dequeued until the first finishes.
        pool.submit(async {}).unwrap();
        assert_eq!(pool.submit(async {}), Err(PoolError::Busy));
        let _ = tx.send(());
    }

    #[tokio::test]
    async fn shutdown_drains_queued_tasks_before_returning() {
        let pool = ThreadPool::new(2, 16);
        let counter = Arc::new(AtomicU32::new(0));
        for _ in 0..10 {
            let counter = counter.clone();
            pool.submit(async move {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }
        pool.shutdown().await;
        assert_eq!(counter.load(Ordering::SeqCst), 10);
    }

    #[tokio::test]
    async fn shrink_exits_workers_without_dropping_queued_work() {
        let pool = ThreadPool::new(3, 16);
        pool.shrink_to(1).await;
        let counter = Arc::new(AtomicU32::new(0));
        for _ in 0..5 {
            let counter = counter.clone();
            pool.submit(async move {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 5);
    }
}
