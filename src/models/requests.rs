//! Request DTOs for the invocation layer
//!
//! Defines the structure of the JSON message handed to `dbm-cache set`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::cache::DEFAULT_TTL_SECS;
use crate::error::{CacheError, Result};

/// Extension given to named store files
pub const STORE_EXTENSION: &str = "dbm";

/// Message body for the SET invocation
///
/// # Fields
/// - `filename`: Name of the store, without directory or extension
/// - `key`: The cache key to store the value under
/// - `value`: The value to store (any JSON)
/// - `expiry_secs`: TTL in seconds (default 300, `<= 0` never expires). Accepts
///   an integer, a float (truncated) or a string holding an integer.
#[derive(Debug, Clone, Deserialize)]
pub struct SetRequest {
    /// Store name
    pub filename: String,
    /// The cache key
    pub key: String,
    /// The value to store; `null` is allowed but the field must be present
    #[serde(deserialize_with = "required_value")]
    pub value: Value,
    /// TTL in seconds
    #[serde(default = "default_expiry_secs", deserialize_with = "lenient_secs")]
    pub expiry_secs: i64,
}

fn default_expiry_secs() -> i64 {
    DEFAULT_TTL_SECS
}

/// Keeps a missing `value` an error instead of reading it as `null`.
fn required_value<'de, D>(deserializer: D) -> std::result::Result<Value, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer)
}

/// Reads a whole number of seconds from `60`, `60.0` or `"60"`.
fn lenient_secs<'de, D>(deserializer: D) -> std::result::Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
            .ok_or_else(|| D::Error::custom(format!("'expiry_secs' out of range: {}", n))),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| D::Error::custom(format!("'expiry_secs' is not an integer: {:?}", s))),
        other => Err(D::Error::custom(format!(
            "'expiry_secs' must be a number, got {}",
            other
        ))),
    }
}

impl SetRequest {
    /// Parses a JSON message, reporting missing or mistyped fields as invalid requests.
    pub fn from_json(message: &str) -> Result<Self> {
        serde_json::from_str(message).map_err(|e| CacheError::InvalidRequest(e.to_string()))
    }

    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        validate_filename(&self.filename)
    }

    /// Store path for this request inside `store_dir`.
    pub fn store_path(&self, store_dir: &Path) -> PathBuf {
        store_path(store_dir, &self.filename)
    }
}

/// Store names must be plain: no path separators and no dots.
pub fn validate_filename(filename: &str) -> Option<String> {
    if filename.is_empty() {
        return Some("'filename' cannot be empty".to_string());
    }
    if filename.contains(['/', '\\', '.']) {
        return Some("'filename' must not contain '/', '\\' or '.'".to_string());
    }
    None
}

/// Deterministic path of the named store: `<store_dir>/<filename>.dbm`.
pub fn store_path(store_dir: &Path, filename: &str) -> PathBuf {
    store_dir.join(format!("{}.{}", filename, STORE_EXTENSION))
}
