//! Fixed-size pool running background cache rebuilds.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use futures_util::future::join_all;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

type Job = Pin<Box<dyn Future<Output = ()> + Send>>;

/// N workers sharing one job queue.
///
/// Jobs are fire-and-forget; a job must handle its own errors. After
/// [`RebuildPool::shutdown`] new submissions are refused and queued jobs are
/// still run to completion.
pub struct RebuildPool {
    sender: Mutex<Option<mpsc::UnboundedSender<Job>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    size: usize,
}

impl RebuildPool {
    /// Spawns `size` workers on the current runtime.
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        let (tx, rx) = mpsc::unbounded_channel::<Job>();
        let rx = Arc::new(tokio::sync::Mutex::new(rx));

        let workers = (0..size)
            .map(|worker| {
                let rx = rx.clone();
                tokio::spawn(async move {
                    loop {
                        // Hold the receiver only while waiting, not while running
                        let job = rx.lock().await.recv().await;
                        match job {
                            Some(job) => job.await,
                            None => break,
                        }
                    }
                    tracing::trace!(worker, "Rebuild worker stopped");
                })
            })
            .collect();

        Self {
            sender: Mutex::new(Some(tx)),
            workers: Mutex::new(workers),
            size,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Queues a job. Returns `false` if the pool is shut down.
    pub fn submit<F>(&self, job: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let sender = self.sender.lock();
        match sender.as_ref() {
            Some(tx) => tx.send(Box::pin(job)).is_ok(),
            None => false,
        }
    }

    /// Stops accepting jobs, then waits for queued and running ones.
    pub async fn shutdown(&self) {
        drop(self.sender.lock().take());
        let workers = std::mem::take(&mut *self.workers.lock());
        if workers.is_empty() {
            return;
        }
        tracing::debug!(workers = workers.len(), "Draining cache rebuild pool");
        for result in join_all(workers).await {
            if let Err(e) = result {
                tracing::error!(error = %e, "Cache rebuild worker panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_runs_jobs_and_drains_on_shutdown() {
        let pool = RebuildPool::new(3);
        let done = Arc::new(AtomicUsize::new(0));

        for _ in 0..20 {
            let done = done.clone();
            assert!(pool.submit(async move {
                tokio::task::yield_now().await;
                done.fetch_add(1, Ordering::SeqCst);
            }));
        }

        pool.shutdown().await;
        assert_eq!(done.load(Ordering::SeqCst), 20);
        assert!(!pool.submit(async {}));
    }

    #[tokio::test]
    async fn test_zero_size_gets_one_worker() {
        let pool = RebuildPool::new(0);
        assert_eq!(pool.size(), 1);
        pool.shutdown().await;
    }
}
