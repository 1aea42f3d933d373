//! Configuration Module
//!
//! Handles loading and managing cache configuration from environment variables.

use std::env;
use std::path::PathBuf;

use crate::cache::DEFAULT_TTL_SECS;

/// Cache configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding named store files
    pub store_dir: PathBuf,
    /// Default TTL in seconds for `set` calls without explicit TTL
    pub default_ttl: i64,
    /// Maximum number of concurrently running store workers
    pub max_workers: usize,
    /// How long a store handle waits on an engine-level lock, in milliseconds
    pub busy_timeout_ms: u64,
    /// Periodic cleanup interval in seconds
    pub cleanup_interval: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `DBM_CACHE_STORE_DIR` - Directory for store files (default: /tmp)
    /// - `DBM_CACHE_DEFAULT_TTL` - Default TTL in seconds (default: 300)
    /// - `DBM_CACHE_MAX_WORKERS` - Worker pool bound (default: 4)
    /// - `DBM_CACHE_BUSY_TIMEOUT_MS` - Engine busy timeout (default: 5000)
    /// - `DBM_CACHE_CLEANUP_INTERVAL` - Cleanup frequency in seconds (default: 60)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            store_dir: env::var("DBM_CACHE_STORE_DIR")
                .ok()
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.store_dir),
            default_ttl: env::var("DBM_CACHE_DEFAULT_TTL")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.default_ttl),
            max_workers: env::var("DBM_CACHE_MAX_WORKERS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|n: &usize| *n > 0)
                .unwrap_or(defaults.max_workers),
            busy_timeout_ms: env::var("DBM_CACHE_BUSY_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.busy_timeout_ms),
            cleanup_interval: env::var("DBM_CACHE_CLEANUP_INTERVAL")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.cleanup_interval),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_dir: PathBuf::from("/tmp"),
            default_ttl: DEFAULT_TTL_SECS,
            max_workers: 4,
            busy_timeout_ms: 5000,
            cleanup_interval: 60,
        }
    }
}
