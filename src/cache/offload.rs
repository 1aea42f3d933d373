//! Async Offload Adapter
//!
//! Store calls block on file I/O. Every cache operation hands its store work
//! to an [`Offload`] implementation and awaits the result, so the calling
//! task never blocks on the file itself.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::error::{CacheError, Result};

/// Runs a synchronous operation somewhere and resolves to its result.
pub trait Offload: Send + Sync {
    fn run<F, R>(&self, op: F) -> impl Future<Output = Result<R>> + Send
    where
        F: FnOnce() -> Result<R> + Send + 'static,
        R: Send + 'static;
}

// == Blocking Pool ==
/// Runs operations on tokio's blocking threads, at most `max_workers` at once.
#[derive(Debug, Clone)]
pub struct BlockingPool {
    permits: Arc<Semaphore>,
    max_workers: usize,
}

impl BlockingPool {
    /// Creates a pool bounded to `max_workers` concurrent operations (minimum 1).
    pub fn new(max_workers: usize) -> Self {
        let max_workers = max_workers.max(1);
        Self {
            permits: Arc::new(Semaphore::new(max_workers)),
            max_workers,
        }
    }

    /// Upper bound on concurrently running operations.
    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Operations currently running.
    #[cfg(test)]
    fn in_flight(&self) -> usize {
        self.max_workers - self.permits.available_permits()
    }
}

impl Default for BlockingPool {
    fn default() -> Self {
        Self::new(4)
    }
}

impl Offload for BlockingPool {
    fn run<F, R>(&self, op: F) -> impl Future<Output = Result<R>> + Send
    where
        F: FnOnce() -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let permits = Arc::clone(&self.permits);
        async move {
            let permit = permits
                .acquire_owned()
                .await
                .map_err(|_| CacheError::Worker("worker pool is closed".to_string()))?;

            tokio::task::spawn_blocking(move || {
                let _permit = permit;
                op()
            })
            .await
            .map_err(|e| CacheError::Worker(e.to_string()))?
        }
    }
}

// == Inline ==
/// Runs operations directly on the calling task.
#[derive(Debug, Clone, Copy, Default)]
pub struct Inline;

impl Offload for Inline {
    fn run<F, R>(&self, op: F) -> impl Future<Output = Result<R>> + Send
    where
        F: FnOnce() -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        async move { op() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_pool_returns_result() {
        let pool = BlockingPool::new(2);
        let value = pool.run(|| Ok(21 * 2)).await.unwrap();
        assert_eq!(value, 42);
    }

    #[tokio::test]
    async fn test_pool_propagates_error() {
        let pool = BlockingPool::new(2);
        let result: Result<()> = pool
            .run(|| Err(CacheError::Serialization("bad".to_string())))
            .await;
        assert!(matches!(result, Err(CacheError::Serialization(_))));
    }

    #[tokio::test]
    async fn test_pool_reports_worker_panic() {
        let pool = BlockingPool::new(1);
        let result: Result<()> = pool.run(|| panic!("boom")).await;
        assert!(matches!(result, Err(CacheError::Worker(_))));

        // The permit is returned after a panic.
        assert_eq!(pool.in_flight(), 0);
        assert_eq!(pool.run(|| Ok(1)).await.unwrap(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_pool_bounds_concurrency() {
        let pool = BlockingPool::new(2);
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let pool = pool.clone();
            let active = Arc::clone(&active);
            let peak = Arc::clone(&peak);
            handles.push(tokio::spawn(async move {
                pool.run(move || {
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    std::thread::sleep(Duration::from_millis(20));
                    active.fetch_sub(1, Ordering::SeqCst);
                    Ok(())
                })
                .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(pool.max_workers(), 2);
    }

    #[test]
    fn test_pool_minimum_one_worker() {
        assert_eq!(BlockingPool::new(0).max_workers(), 1);
    }

    #[tokio::test]
    async fn test_inline_runs_on_caller() {
        let caller = std::thread::current().id();
        let ran_on = Inline.run(move || Ok(std::thread::current().id())).await.unwrap();
        assert_eq!(caller, ran_on);
    }
}
