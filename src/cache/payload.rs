//! Payload Codec Module
//!
//! Frames a cached value together with its expiry timestamp.
//!
//! # Wire Format
//! ```text
//! +-------+---------+----------------+---------------+-------------+
//! | "DC"  | version | expiry (u64 BE)| length (u32 BE)| value bytes |
//! | 2 B   | 1 B     | 8 B            | 4 B            | length B    |
//! +-------+---------+----------------+---------------+-------------+
//! ```
//! An expiry of `0` means the entry never expires. Blobs that do not start
//! with the magic are read as a bare value with no expiry.

use crate::error::{CacheError, Result};

// == Format Constants ==
/// Leading bytes of every framed payload
pub const MAGIC: [u8; 2] = *b"DC";
/// Current frame version
pub const FORMAT_VERSION: u8 = 1;
/// Magic + version + expiry + length
const HEADER_LEN: usize = 2 + 1 + 8 + 4;

// == Payload ==
/// A decoded store record: the opaque value bytes and their expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    /// Expiration timestamp (Unix seconds), 0 = no expiration
    pub expiry: u64,
    /// The stored value
    pub value: Vec<u8>,
}

impl Payload {
    // == Constructor ==
    /// Creates a payload expiring `ttl_seconds` from now.
    ///
    /// A TTL of zero or less produces an entry that never expires.
    pub fn new(value: Vec<u8>, ttl_seconds: i64) -> Self {
        Self {
            expiry: expiry_for(ttl_seconds, epoch_secs()),
            value,
        }
    }

    /// Creates a payload with an absolute expiry timestamp.
    pub fn with_expiry(value: Vec<u8>, expiry: u64) -> Self {
        Self { expiry, value }
    }

    // == Expiry Checks ==
    /// Checks if the payload has expired as of now.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(epoch_secs())
    }

    /// Checks expiry against a given timestamp.
    ///
    /// Boundary condition: an entry is expired once `now >= expiry`, so a
    /// reader never sees a value at the exact second it lapses.
    pub fn is_expired_at(&self, now: u64) -> bool {
        self.expiry != 0 && now >= self.expiry
    }

    /// Checks whether a cleanup pass with cutoff `older_than` removes this payload.
    ///
    /// Strictly greater: an entry expiring exactly at the cutoff is kept.
    pub fn expired_before(&self, older_than: u64) -> bool {
        self.expiry != 0 && older_than > self.expiry
    }

    /// Returns remaining TTL in seconds, or None if no expiration is set.
    pub fn ttl_remaining(&self) -> Option<u64> {
        if self.expiry == 0 {
            return None;
        }
        Some(self.expiry.saturating_sub(epoch_secs()))
    }

    // == Encode ==
    /// Serializes the payload into its framed byte form.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let len = u32::try_from(self.value.len()).map_err(|_| {
            CacheError::Serialization(format!(
                "value of {} bytes exceeds the frame limit of {} bytes",
                self.value.len(),
                u32::MAX
            ))
        })?;

        let mut out = Vec::with_capacity(HEADER_LEN + self.value.len());
        out.extend_from_slice(&MAGIC);
        out.push(FORMAT_VERSION);
        out.extend_from_slice(&self.expiry.to_be_bytes());
        out.extend_from_slice(&len.to_be_bytes());
        out.extend_from_slice(&self.value);
        Ok(out)
    }

    // == Decode ==
    /// Parses a stored blob.
    ///
    /// Blobs without the magic prefix are legacy records: the whole blob is
    /// the value and it never expires.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if !bytes.starts_with(&MAGIC) {
            return Ok(Self::with_expiry(bytes.to_vec(), 0));
        }

        if bytes.len() < HEADER_LEN {
            return Err(CacheError::Serialization(format!(
                "truncated payload header: {} of {} bytes",
                bytes.len(),
                HEADER_LEN
            )));
        }

        let version = bytes[2];
        if version != FORMAT_VERSION {
            return Err(CacheError::Serialization(format!(
                "unsupported payload version {}",
                version
            )));
        }

        let mut expiry = [0u8; 8];
        expiry.copy_from_slice(&bytes[3..11]);
        let mut len = [0u8; 4];
        len.copy_from_slice(&bytes[11..HEADER_LEN]);
        let len = u32::from_be_bytes(len) as usize;

        let body = &bytes[HEADER_LEN..];
        if body.len() != len {
            return Err(CacheError::Serialization(format!(
                "payload length mismatch: header says {} bytes, found {}",
                len,
                body.len()
            )));
        }

        Ok(Self::with_expiry(body.to_vec(), u64::from_be_bytes(expiry)))
    }
}

/// Encodes `value` with an expiry `ttl_seconds` from now.
pub fn encode(value: Vec<u8>, ttl_seconds: i64) -> Result<Vec<u8>> {
    Payload::new(value, ttl_seconds).encode()
}

/// Decodes a stored blob.
pub fn decode(bytes: &[u8]) -> Result<Payload> {
    Payload::decode(bytes)
}

// == Utility Functions ==
/// Returns current Unix timestamp in seconds.
pub fn epoch_secs() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}

/// Absolute expiry for a TTL relative to `now`; 0 when the TTL is not positive.
pub fn expiry_for(ttl_seconds: i64, now: u64) -> u64 {
    if ttl_seconds > 0 {
        now.saturating_add(ttl_seconds as u64)
    } else {
        0
    }
}
