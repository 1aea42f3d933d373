//! Output DTOs for the invocation layer
//!
//! Shapes printed by the `dbm-cache` binary.

use serde::Serialize;
use serde_json::Value;

use crate::cache::{ListedEntry, Payload};

/// One line of `dbm-cache list` output
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListItem {
    /// The stored key
    pub key: String,
    /// Expiration timestamp (Unix seconds); absent for entries that never expire
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<u64>,
    /// Seconds left before expiry; absent for entries that never expire
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl_remaining: Option<u64>,
    /// Whether the entry is logically gone but not yet cleaned
    pub expired: bool,
    /// The stored value; absent when listing keys only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl From<&ListedEntry> for ListItem {
    fn from(entry: &ListedEntry) -> Self {
        let payload = entry.payload.as_ref();
        Self {
            key: entry.key.clone(),
            expires_at: payload.map(|p| p.expiry).filter(|e| *e != 0),
            ttl_remaining: payload.and_then(Payload::ttl_remaining),
            expired: entry.is_expired(),
            value: payload.map(|p| display_value(&p.value)),
        }
    }
}

/// JSON values are shown as-is; anything else as lossy UTF-8 text.
fn display_value(bytes: &[u8]) -> Value {
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned()))
}
