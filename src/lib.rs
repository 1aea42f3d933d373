//! dbm-cache - A file-backed TTL cache
//!
//! Wraps a persistent key-value store with expiry semantics, a single-writer
//! lock and non-blocking offload of store I/O.

pub mod cache;
pub mod commands;
pub mod config;
pub mod error;
pub mod models;
pub mod tasks;

pub use cache::DbmCache;
pub use config::Config;
pub use error::{CacheError, Result};
pub use tasks::spawn_cleanup_task;
