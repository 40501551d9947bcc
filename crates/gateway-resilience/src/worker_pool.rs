//! Bounded worker pool with FIFO overflow queue.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

pub type BoxedTask = Pin<Box<dyn Future<Output = ()> + Send>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// A worker slot was free; the task started immediately.
    Started,
    /// No slot was free but the overflow queue accepted the task.
    Queued,
    /// Both the pool and the queue were full.
    PoolFull,
    /// `close()` has already been called; no new submissions are accepted.
    PoolClosed,
}

struct QueueItem {
    task: BoxedTask,
    cancellation: CancellationToken,
}

#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    pub max_workers: usize,
    pub queue_size: usize,
    pub task_timeout: Duration,
}

struct Inner {
    semaphore: Semaphore,
    queue: parking_lot::Mutex<VecDeque<QueueItem>>,
    queue_capacity: usize,
    max_workers: usize,
    task_timeout: Duration,
    closed: AtomicBool,
    active_tasks: AtomicUsize,
    drain: tokio::sync::Notify,
}

/// Bounded-concurrency task executor. `submit` never blocks: it either
/// starts a dedicated worker, enqueues for a running worker to pick up, or
/// rejects.
#[derive(Clone)]
pub struct WorkerPool {
    inner: Arc<Inner>,
}

impl WorkerPool {
    pub fn new(config: WorkerPoolConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                semaphore: Semaphore::new(config.max_workers),
                queue: parking_lot::Mutex::new(VecDeque::new()),
                queue_capacity: config.queue_size,
                max_workers: config.max_workers,
                task_timeout: config.task_timeout,
                closed: AtomicBool::new(false),
                active_tasks: AtomicUsize::new(0),
                drain: tokio::sync::Notify::new(),
            }),
        }
    }

    pub fn active_tasks(&self) -> usize {
        self.inner.active_tasks.load(Ordering::Acquire)
    }

    /// Free worker slots, used by the HTTP edge to populate
    /// `X-Rate-Limit-Remaining`.
    pub fn available_capacity(&self) -> usize {
        self.inner.max_workers.saturating_sub(self.active_tasks())
    }

    pub fn queued_tasks(&self) -> usize {
        self.inner.queue.lock().len()
    }

    pub fn submit(&self, task: BoxedTask, cancellation: CancellationToken) -> SubmitOutcome {
        if self.inner.closed.load(Ordering::Acquire) {
            return SubmitOutcome::PoolClosed;
        }

        match self.inner.semaphore.clone().try_acquire_owned() {
            Ok(permit) => {
                self.spawn_worker(permit, task, cancellation);
                SubmitOutcome::Started
            }
            Err(_) => {
                let mut queue = self.inner.queue.lock();
                if queue.len() >= self.inner.queue_capacity {
                    SubmitOutcome::PoolFull
                } else {
                    queue.push_back(QueueItem { task, cancellation });
                    SubmitOutcome::Queued
                }
            }
        }
    }

    fn spawn_worker(&self, permit: tokio::sync::OwnedSemaphorePermit, task: BoxedTask, cancellation: CancellationToken) {
        let inner = self.inner.clone();
        tokio::spawn(async move {
            run_one(&inner, task, cancellation).await;
            loop {
                let next = inner.queue.lock().pop_front();
                match next {
                    Some(item) => run_one(&inner, item.task, item.cancellation).await,
                    None => break,
                }
            }
            drop(permit);
            inner.drain.notify_waiters();
        });
    }

    /// Rejects new submissions, waits for in-flight and queued tasks to
    /// drain up to `deadline`. Returns `true` if the pool fully drained.
    pub async fn close(&self, deadline: Duration) -> bool {
        self.inner.closed.store(true, Ordering::Release);
        let drained = tokio::time::timeout(deadline, async {
            loop {
                if self.inner.active_tasks.load(Ordering::Acquire) == 0 && self.queued_tasks() == 0 {
                    return;
                }
                self.inner.drain.notified().await;
            }
        })
        .await;
        drained.is_ok()
    }
}

async fn run_one(inner: &Arc<Inner>, task: BoxedTask, cancellation: CancellationToken) {
    inner.active_tasks.fetch_add(1, Ordering::AcqRel);

    let guarded = async move {
        tokio::select! {
            _ = cancellation.cancelled() => {}
            _ = task => {}
        }
    };

    // Run on a nested task so a panic inside `task` is contained: the
    // JoinHandle reports it as an Err rather than unwinding this worker.
    let handle = tokio::spawn(guarded);
    match tokio::time::timeout(inner.task_timeout, handle).await {
        Ok(Ok(())) => {}
        Ok(Err(join_err)) if join_err.is_panic() => {
            tracing::error!("worker pool task panicked: {join_err}");
        }
        Ok(Err(join_err)) => {
            tracing::warn!("worker pool task was cancelled: {join_err}");
        }
        Err(_) => {
            tracing::warn!("worker pool task exceeded task_timeout");
        }
    }

    inner.active_tasks.fetch_sub(1, Ordering::AcqRel);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    fn config(max_workers: usize, queue_size: usize) -> WorkerPoolConfig {
        WorkerPoolConfig {
            max_workers,
            queue_size,
            task_timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn single_worker_no_queue_second_submission_is_pool_full() {
        let pool = WorkerPool::new(config(1, 0));
        let block = Arc::new(tokio::sync::Notify::new());
        let block2 = block.clone();

        let outcome1 = pool.submit(
            Box::pin(async move {
                block2.notified().await;
            }),
            CancellationToken::new(),
        );
        assert_eq!(outcome1, SubmitOutcome::Started);

        let outcome2 = pool.submit(Box::pin(async {}), CancellationToken::new());
        assert_eq!(outcome2, SubmitOutcome::PoolFull);

        block.notify_one();
    }

    #[tokio::test]
    async fn with_queue_capacity_second_submission_queues() {
        let pool = WorkerPool::new(config(1, 1));
        let block = Arc::new(tokio::sync::Notify::new());
        let block2 = block.clone();

        let outcome1 = pool.submit(
            Box::pin(async move {
                block2.notified().await;
            }),
            CancellationToken::new(),
        );
        assert_eq!(outcome1, SubmitOutcome::Started);

        let outcome2 = pool.submit(Box::pin(async {}), CancellationToken::new());
        assert_eq!(outcome2, SubmitOutcome::Queued);

        block.notify_one();
    }

    #[tokio::test]
    async fn panicking_task_does_not_stop_the_pool() {
        let pool = WorkerPool::new(config(1, 1));
        let counter = Arc::new(AtomicU32::new(0));
        let counter2 = counter.clone();

        pool.submit(Box::pin(async { panic!("boom") }), CancellationToken::new());
        pool.submit(
            Box::pin(async move {
                counter2.fetch_add(1, Ordering::SeqCst);
            }),
            CancellationToken::new(),
        );

        assert!(pool.close(Duration::from_secs(2)).await);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn submissions_after_close_are_rejected() {
        let pool = WorkerPool::new(config(1, 1));
        assert!(pool.close(Duration::from_secs(1)).await);
        let outcome = pool.submit(Box::pin(async {}), CancellationToken::new());
        assert_eq!(outcome, SubmitOutcome::PoolClosed);
    }
}
