//! Write Coordinator
//!
//! One mutation at a time per cache instance, regardless of store path.

use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

/// Single-writer lock shared by all clones of a cache.
///
/// Created together with the cache and held for the duration of each
/// `set`/`clean` call.
#[derive(Debug, Clone, Default)]
pub struct WriteCoordinator {
    lock: Arc<Mutex<()>>,
}

/// Proof of exclusive write access. Released on drop.
#[derive(Debug)]
pub struct WriteGuard {
    _guard: OwnedMutexGuard<()>,
}

impl WriteCoordinator {
    // == Constructor ==
    /// Creates an unlocked coordinator.
    pub fn new() -> Self {
        Self::default()
    }

    // == Acquire ==
    /// Waits for exclusive write access.
    ///
    /// The guard is owned so it can be moved into a worker closure and stay
    /// held for as long as the store I/O runs.
    pub async fn acquire(&self) -> WriteGuard {
        match Arc::clone(&self.lock).try_lock_owned() {
            Ok(guard) => WriteGuard { _guard: guard },
            Err(_) => {
                debug!("write lock busy, waiting");
                WriteGuard {
                    _guard: Arc::clone(&self.lock).lock_owned().await,
                }
            }
        }
    }

    // == Is Locked ==
    /// Returns true while some writer holds the lock.
    pub fn is_locked(&self) -> bool {
        self.lock.try_lock().is_err()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_guard_releases_on_drop() {
        let coordinator = WriteCoordinator::new();

        let guard = coordinator.acquire().await;
        assert!(coordinator.is_locked());

        drop(guard);
        assert!(!coordinator.is_locked());
    }

    #[tokio::test]
    async fn test_clones_share_the_lock() {
        let coordinator = WriteCoordinator::new();
        let other = coordinator.clone();

        let _guard = coordinator.acquire().await;
        assert!(other.is_locked());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_writers_never_overlap() {
        let coordinator = WriteCoordinator::new();
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let coordinator = coordinator.clone();
            let active = Arc::clone(&active);
            let peak = Arc::clone(&peak);
            handles.push(tokio::spawn(async move {
                let guard = coordinator.acquire().await;
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                active.fetch_sub(1, Ordering::SeqCst);
                drop(guard);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_guard_released_when_holder_panics() {
        let coordinator = WriteCoordinator::new();
        let held = coordinator.acquire().await;

        let result = tokio::task::spawn_blocking(move || {
            let _held = held;
            panic!("writer failed");
        })
        .await;

        assert!(result.is_err());
        assert!(!coordinator.is_locked());
    }
}
