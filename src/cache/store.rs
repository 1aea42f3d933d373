//! Store Engine Adapter
//!
//! Wraps a single on-disk SQLite file as a flat key → blob mapping. A handle
//! is opened per call in one of two modes and closed when dropped.

use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use tracing::debug;

use crate::error::Result;

const TABLE: &str = "entries";

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS entries (
    key     TEXT PRIMARY KEY NOT NULL,
    payload BLOB NOT NULL
) WITHOUT ROWID";

// == Open Mode ==
/// How a store handle was acquired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Never creates the file, never writes, no write synchronization
    ReadOnly,
    /// Creates the file if missing; every mutation is durable on return
    CreateSync,
}

// == Store ==
/// A scoped handle on a store file.
#[derive(Debug)]
pub struct Store {
    conn: Connection,
    path: PathBuf,
    mode: OpenMode,
}

impl Store {
    // == Read-Only Open ==
    /// Opens an existing store for reading.
    ///
    /// Returns `None` when the file is absent or has never been written to,
    /// which callers treat as an empty store.
    pub fn open_read_only(path: &Path, busy_timeout: Duration) -> Result<Option<Self>> {
        if !path.exists() {
            debug!(path = %path.display(), "store file absent");
            return Ok(None);
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.busy_timeout(busy_timeout)?;

        let tables: i64 = conn.query_row(
            "SELECT count(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            params![TABLE],
            |row| row.get(0),
        )?;
        if tables == 0 {
            debug!(path = %path.display(), "store file has no entries table");
            return Ok(None);
        }

        Ok(Some(Self {
            conn,
            path: path.to_path_buf(),
            mode: OpenMode::ReadOnly,
        }))
    }

    // == Create+Sync Open ==
    /// Opens a store for writing, creating the file and table if missing.
    pub fn open_create(path: &Path, busy_timeout: Duration) -> Result<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.busy_timeout(busy_timeout)?;
        conn.pragma_update(None, "synchronous", "FULL")?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn,
            path: path.to_path_buf(),
            mode: OpenMode::CreateSync,
        })
    }

    /// Path of the underlying store file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Mode this handle was opened in.
    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    // == Point Operations ==
    /// Fetches the raw payload stored under `key`.
    pub fn get_raw(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let raw = self
            .conn
            .query_row(
                "SELECT payload FROM entries WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(raw)
    }

    /// Stores `bytes` under `key`, replacing any previous payload.
    pub fn put_raw(&self, key: &str, bytes: &[u8]) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO entries (key, payload) VALUES (?1, ?2)",
            params![key, bytes],
        )?;
        debug!(path = %self.path.display(), key, size = bytes.len(), "stored payload");
        Ok(())
    }

    /// Removes `key`. Returns whether a row was deleted.
    pub fn delete_raw(&self, key: &str) -> Result<bool> {
        let deleted = self
            .conn
            .execute("DELETE FROM entries WHERE key = ?1", params![key])?;
        Ok(deleted > 0)
    }

    // == Enumeration ==
    /// First key in engine order.
    pub fn first_key(&self) -> Result<Option<String>> {
        let key = self
            .conn
            .query_row("SELECT key FROM entries ORDER BY key LIMIT 1", [], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(key)
    }

    /// Key following `key` in engine order.
    ///
    /// `key` need not still exist, so a walk survives deleting the current key.
    pub fn next_key(&self, key: &str) -> Result<Option<String>> {
        let next = self
            .conn
            .query_row(
                "SELECT key FROM entries WHERE key > ?1 ORDER BY key LIMIT 1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(next)
    }

    /// Iterates over all keys via `first_key`/`next_key`.
    pub fn keys(&self) -> Keys<'_> {
        Keys {
            store: self,
            last: None,
            done: false,
        }
    }

    // == Maintenance ==
    /// Reclaims space left by deleted or overwritten entries.
    pub fn compact(&self) -> Result<()> {
        self.conn.execute_batch("VACUUM")?;
        debug!(path = %self.path.display(), "compacted store");
        Ok(())
    }
}

// == Key Walk ==
/// Iterator over store keys. Stops after the first error.
pub struct Keys<'a> {
    store: &'a Store,
    last: Option<String>,
    done: bool,
}

impl Iterator for Keys<'_> {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let next = match &self.last {
            None => self.store.first_key(),
            Some(key) => self.store.next_key(key),
        };

        match next {
            Ok(Some(key)) => {
                self.last = Some(key.clone());
                Some(Ok(key))
            }
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}
