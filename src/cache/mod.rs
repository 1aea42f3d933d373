//! Cache Module
//!
//! Provides a TTL cache over file-backed key-value stores.

mod api;
mod coordinator;
mod offload;
mod payload;
mod stats;
mod store;


// Re-export public types
pub use api::{CleanReport, DbmCache, ListedEntry};
pub use coordinator::{WriteCoordinator, WriteGuard};
pub use offload::{BlockingPool, Inline, Offload};
pub use payload::{decode, encode, epoch_secs, Payload, FORMAT_VERSION, MAGIC};
pub use stats::{CacheStats, StatsRecorder};
pub use store::{Keys, OpenMode, Store};

// == Public Constants ==
/// TTL applied when the caller does not give one, in seconds
pub const DEFAULT_TTL_SECS: i64 = 300;
