//! Request and output models for the invocation layer
//!
//! This module defines the DTOs the `dbm-cache` binary reads from its
//! arguments and prints on stdout.

pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use requests::{store_path, validate_filename, SetRequest};
pub use responses::ListItem;
