//! TTL Cleanup Task
//!
//! Background task that periodically removes expired entries from a store file.

use std::path::PathBuf;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::{DbmCache, Offload};

/// Spawns a background task that periodically runs `clean` on one store.
///
/// The task sleeps for the interval, then runs a cleanup pass with the
/// current time as cutoff. Each pass takes the cache's write lock like any
/// other `clean`. A failed pass is logged and the loop carries on.
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// during shutdown.
///
/// # Example
/// ```ignore
/// let cache = DbmCache::new();
/// let handle = spawn_cleanup_task(cache.clone(), "/tmp/jobs.dbm".into(), 60, false);
/// // Later, during shutdown:
/// handle.abort();
/// ```
pub fn spawn_cleanup_task<O>(
    cache: DbmCache<O>,
    path: PathBuf,
    cleanup_interval_secs: u64,
    compact: bool,
) -> JoinHandle<()>
where
    O: Offload + 'static,
{
    let interval = Duration::from_secs(cleanup_interval_secs.max(1));

    tokio::spawn(async move {
        info!(
            path = %path.display(),
            "Starting TTL cleanup task with interval of {} seconds",
            interval.as_secs()
        );

        loop {
            tokio::time::sleep(interval).await;

            match cache.clean(&path, None, compact).await {
                Ok(report) if report.removed > 0 => {
                    info!("TTL cleanup: removed {} expired entries", report.removed);
                }
                Ok(_) => debug!("TTL cleanup: no expired entries found"),
                Err(err) => warn!(error = %err, "TTL cleanup pass failed"),
            }
        }
    })
}
