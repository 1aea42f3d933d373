//! Command Handlers
//!
//! One function per `dbm-cache` subcommand. Each resolves the named store
//! inside the configured directory and calls the cache; printing and exit
//! codes are left to the binary.

use std::path::PathBuf;

use serde_json::Value;
use tracing::info;

use crate::cache::{CleanReport, DbmCache, Offload};
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::models::{store_path, validate_filename, ListItem, SetRequest};

/// Resolves a store name to its path, rejecting unsafe names.
pub fn resolve_store(config: &Config, filename: &str) -> Result<PathBuf> {
    if let Some(msg) = validate_filename(filename) {
        return Err(CacheError::InvalidRequest(msg));
    }
    Ok(store_path(&config.store_dir, filename))
}

/// Handler for `set MESSAGE CONTEXT`
///
/// Parses the JSON message, stores its value and returns the stored value.
/// The workflow context must be valid JSON but is otherwise unused.
pub async fn set_command<O: Offload>(
    cache: &DbmCache<O>,
    config: &Config,
    message: &str,
    context: &str,
) -> Result<Value> {
    serde_json::from_str::<Value>(context)
        .map_err(|e| CacheError::InvalidRequest(format!("invalid context: {}", e)))?;
    let req = SetRequest::from_json(message)?;
    if let Some(msg) = req.validate() {
        return Err(CacheError::InvalidRequest(msg));
    }

    let path = req.store_path(&config.store_dir);
    info!(path = %path.display(), key = %req.key, expiry_secs = req.expiry_secs, "set");
    cache.set(&path, &req.key, req.value, req.expiry_secs).await
}

/// Handler for `get FILENAME KEY`
pub async fn get_command<O: Offload>(
    cache: &DbmCache<O>,
    config: &Config,
    filename: &str,
    key: &str,
) -> Result<Value> {
    let path = resolve_store(config, filename)?;
    cache.get_strict(&path, key).await
}

/// Handler for `list FILENAME`
pub async fn list_command<O: Offload>(
    cache: &DbmCache<O>,
    config: &Config,
    filename: &str,
    keys_only: bool,
) -> Result<Vec<ListItem>> {
    let path = resolve_store(config, filename)?;
    let entries = cache.list(&path, keys_only).await?;
    Ok(entries.iter().map(ListItem::from).collect())
}

/// Handler for a single `clean FILENAME` pass
pub async fn clean_command<O: Offload>(
    cache: &DbmCache<O>,
    config: &Config,
    filename: &str,
    older_than: Option<u64>,
    compact: bool,
) -> Result<CleanReport> {
    let path = resolve_store(config, filename)?;
    cache.clean(&path, older_than, compact).await
}
