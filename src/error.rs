//! Error types for the cache
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Key not found in cache (or expired), raised only by strict lookups
    #[error("Key not found in cache: {0}")]
    KeyNotFound(String),

    /// Value or payload could not be encoded/decoded
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The store engine rejected an operation
    #[error("Store error: {0}")]
    Store(#[from] rusqlite::Error),

    /// The offloaded worker panicked or the pool was shut down
    #[error("Worker error: {0}")]
    Worker(String),

    /// Invalid invocation request
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl CacheError {
    /// Returns true for the strict-miss signal.
    pub fn is_not_found(&self) -> bool {
        matches!(self, CacheError::KeyNotFound(_))
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::Serialization(err.to_string())
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache.
pub type Result<T> = std::result::Result<T, CacheError>;
