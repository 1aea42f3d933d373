//! Cache API
//!
//! `get`, `set`, `list` and `clean` over a store file. Every call opens the
//! store, does its work on the offload worker and closes the store again.
//! Mutating calls hold the write lock for the whole of their store I/O.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cache::coordinator::WriteCoordinator;
use crate::cache::offload::{BlockingPool, Offload};
use crate::cache::payload::{self, epoch_secs, Payload};
use crate::cache::stats::{CacheStats, StatsRecorder};
use crate::cache::store::Store;
use crate::config::Config;
use crate::error::{CacheError, Result};

// == Listed Entry ==
/// One row of a `list` walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedEntry {
    pub key: String,
    /// Decoded payload; `None` when listing keys only
    pub payload: Option<Payload>,
}

impl ListedEntry {
    /// Whether the entry is still physically stored but logically gone.
    pub fn is_expired(&self) -> bool {
        self.payload.as_ref().is_some_and(Payload::is_expired)
    }
}

// == Clean Report ==
/// Outcome of a cleanup pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanReport {
    /// Cutoff used: entries expiring before this were removed
    pub older_than: u64,
    /// Keys visited
    pub scanned: u64,
    /// Keys deleted
    pub removed: u64,
    /// Whether compaction ran after the sweep
    pub compacted: bool,
}

// == DbmCache ==
/// TTL cache over file-backed stores.
///
/// Cheap to clone; clones share the write lock, the worker pool and the
/// statistics. Create one instance per process and hand out clones: the
/// write lock belongs to the instance, so two caches built with
/// [`DbmCache::new`] do not serialize their writes against each other.
#[derive(Debug, Clone)]
pub struct DbmCache<O = BlockingPool> {
    offload: O,
    writes: WriteCoordinator,
    stats: Arc<StatsRecorder>,
    default_ttl: i64,
    busy_timeout: Duration,
}

impl DbmCache<BlockingPool> {
    /// Creates a cache with default configuration.
    pub fn new() -> Self {
        Self::from_config(&Config::default())
    }

    /// Creates a cache whose worker pool is sized from the Config.
    pub fn from_config(config: &Config) -> Self {
        let pool = BlockingPool::new(config.max_workers);
        debug!(max_workers = pool.max_workers(), "cache worker pool ready");
        Self::with_offload(pool, config)
    }
}

impl Default for DbmCache<BlockingPool> {
    fn default() -> Self {
        Self::new()
    }
}

impl<O: Offload> DbmCache<O> {
    /// Creates a cache running its store work on `offload`.
    pub fn with_offload(offload: O, config: &Config) -> Self {
        Self {
            offload,
            writes: WriteCoordinator::new(),
            stats: Arc::new(StatsRecorder::new()),
            default_ttl: config.default_ttl,
            busy_timeout: Duration::from_millis(config.busy_timeout_ms),
        }
    }

    /// TTL used by [`DbmCache::set_default_ttl`].
    pub fn default_ttl(&self) -> i64 {
        self.default_ttl
    }

    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot()
    }

    /// The lock serializing `set` and `clean`.
    pub fn write_coordinator(&self) -> &WriteCoordinator {
        &self.writes
    }

    // == Get ==
    /// Retrieves the raw value bytes stored under `key`.
    ///
    /// Absent stores, absent keys and expired entries are all `None`.
    /// Expired entries are left in place for `clean`.
    pub async fn get_bytes(&self, path: impl AsRef<Path>, key: &str) -> Result<Option<Vec<u8>>> {
        let path = path.as_ref().to_path_buf();
        let timeout = self.busy_timeout;
        let lookup = key.to_string();

        let payload = self
            .offload
            .run(move || {
                let Some(store) = Store::open_read_only(&path, timeout)? else {
                    return Ok(None);
                };
                store
                    .get_raw(&lookup)?
                    .map(|raw| Payload::decode(&raw))
                    .transpose()
            })
            .await?;

        match payload {
            Some(payload) if !payload.is_expired() => {
                self.stats.record_hit();
                Ok(Some(payload.value))
            }
            Some(payload) => {
                debug!(key, expiry = payload.expiry, "cache entry expired");
                self.stats.record_miss();
                Ok(None)
            }
            None => {
                debug!(key, "cache miss");
                self.stats.record_miss();
                Ok(None)
            }
        }
    }

    /// Retrieves and deserializes the value stored under `key`.
    pub async fn get<T: DeserializeOwned>(
        &self,
        path: impl AsRef<Path>,
        key: &str,
    ) -> Result<Option<T>> {
        match self.get_bytes(path, key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Like [`DbmCache::get`], returning `default` on a miss.
    pub async fn get_or<T: DeserializeOwned>(
        &self,
        path: impl AsRef<Path>,
        key: &str,
        default: T,
    ) -> Result<T> {
        Ok(self.get(path, key).await?.unwrap_or(default))
    }

    /// Like [`DbmCache::get`], failing with [`CacheError::KeyNotFound`] on a miss.
    ///
    /// Use this when a stored value could equal the default and a miss must
    /// be told apart from a hit.
    pub async fn get_strict<T: DeserializeOwned>(
        &self,
        path: impl AsRef<Path>,
        key: &str,
    ) -> Result<T> {
        self.get(path, key)
            .await?
            .ok_or_else(|| CacheError::KeyNotFound(key.to_string()))
    }

    // == Set ==
    /// Stores raw value bytes under `key` for `ttl_seconds` (`<= 0` never expires).
    pub async fn set_bytes(
        &self,
        path: impl AsRef<Path>,
        key: &str,
        value: Vec<u8>,
        ttl_seconds: i64,
    ) -> Result<()> {
        let bytes = payload::encode(value, ttl_seconds)?;
        let path = path.as_ref().to_path_buf();
        let timeout = self.busy_timeout;
        let owned_key = key.to_string();

        let guard = self.writes.acquire().await;
        self.offload
            .run(move || {
                let _guard = guard;
                let store = Store::open_create(&path, timeout)?;
                store.put_raw(&owned_key, &bytes)
            })
            .await?;

        self.stats.record_write();
        debug!(key, ttl_seconds, "cache entry stored");
        Ok(())
    }

    /// Serializes `value` and stores it under `key`, returning the stored value.
    ///
    /// Serialization happens before the write lock is taken, so a value that
    /// cannot be serialized never touches the store.
    pub async fn set<T: Serialize>(
        &self,
        path: impl AsRef<Path>,
        key: &str,
        value: T,
        ttl_seconds: i64,
    ) -> Result<T> {
        let bytes = serde_json::to_vec(&value)?;
        self.set_bytes(path, key, bytes, ttl_seconds).await?;
        Ok(value)
    }

    /// [`DbmCache::set`] with the configured default TTL.
    pub async fn set_default_ttl<T: Serialize>(
        &self,
        path: impl AsRef<Path>,
        key: &str,
        value: T,
    ) -> Result<T> {
        self.set(path, key, value, self.default_ttl).await
    }

    // == List ==
    /// Enumerates the store in engine order without mutating it.
    ///
    /// Expired entries that have not been cleaned yet are included.
    pub async fn list(&self, path: impl AsRef<Path>, keys_only: bool) -> Result<Vec<ListedEntry>> {
        let path = path.as_ref().to_path_buf();
        let timeout = self.busy_timeout;

        self.offload
            .run(move || {
                let Some(store) = Store::open_read_only(&path, timeout)? else {
                    return Ok(Vec::new());
                };

                let mut entries = Vec::new();
                for key in store.keys() {
                    let key = key?;
                    let payload = if keys_only {
                        None
                    } else {
                        // Deleted by another process between key and value reads.
                        let Some(raw) = store.get_raw(&key)? else {
                            continue;
                        };
                        Some(Payload::decode(&raw)?)
                    };
                    entries.push(ListedEntry { key, payload });
                }
                Ok(entries)
            })
            .await
    }

    // == Clean ==
    /// Deletes entries whose expiry is before `older_than` (default: now),
    /// then optionally compacts the store.
    ///
    /// A failure aborts the sweep; entries already deleted stay deleted.
    pub async fn clean(
        &self,
        path: impl AsRef<Path>,
        older_than: Option<u64>,
        compact: bool,
    ) -> Result<CleanReport> {
        let path = path.as_ref().to_path_buf();
        let timeout = self.busy_timeout;
        let cutoff = older_than.filter(|ts| *ts > 0).unwrap_or_else(epoch_secs);

        let guard = self.writes.acquire().await;
        let report = self
            .offload
            .run(move || {
                let _guard = guard;
                sweep(&path, timeout, cutoff, compact)
            })
            .await?;

        self.stats.record_removed(report.removed);
        info!(
            scanned = report.scanned,
            removed = report.removed,
            compacted = report.compacted,
            "cache cleanup finished"
        );
        Ok(report)
    }
}

/// Runs a cleanup pass on the calling thread. Expects the write lock held.
fn sweep(path: &Path, timeout: Duration, cutoff: u64, compact: bool) -> Result<CleanReport> {
    let store = Store::open_create(path, timeout)?;
    let mut report = CleanReport {
        older_than: cutoff,
        ..CleanReport::default()
    };

    if let Err(err) = remove_expired(&store, cutoff, &mut report) {
        warn!(
            path = %path.display(),
            removed = report.removed,
            error = %err,
            "cleanup aborted mid-sweep"
        );
        return Err(err);
    }

    if compact {
        store.compact()?;
        report.compacted = true;
    }
    Ok(report)
}

/// Each delete commits on its own, so `report` reflects progress even on error.
fn remove_expired(store: &Store, cutoff: u64, report: &mut CleanReport) -> Result<()> {
    for key in store.keys() {
        let key = key?;
        report.scanned += 1;
        let Some(raw) = store.get_raw(&key)? else {
            continue;
        };
        if Payload::decode(&raw)?.expired_before(cutoff) && store.delete_raw(&key)? {
            report.removed += 1;
        }
    }
    Ok(())
}
