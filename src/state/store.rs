use rusqlite::{Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use chrono::Utc;
use tracing::{debug, info};

use crate::error::CacheError;

/// The LocalStore is the resilient key/value store behind the cache and
/// the session. Values are JSON text; writes are last-write-wins per key.
///
/// Each process (or "tab") opens its own connection to the same file.
/// SQLite's `data_version` then tells a connection whether some *other*
/// connection committed since it last looked.
pub struct LocalStore {
    conn: Mutex<Connection>,
    db_path: Option<PathBuf>,
}

impl LocalStore {
    /// Open (or create) the store at the given path
    pub fn open(db_path: &Path) -> Result<Self, CacheError> {
        // Ensure the parent directory exists
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(db_path)?;
        info!("📁 Local store opened at: {}", db_path.display());

        let store = LocalStore {
            conn: Mutex::new(conn),
            db_path: Some(db_path.to_path_buf()),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// In-memory store, private to this connection
    pub fn open_in_memory() -> Result<Self, CacheError> {
        let store = LocalStore {
            conn: Mutex::new(Connection::open_in_memory()?),
            db_path: None,
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Create the key/value table if it doesn't exist.
    fn init_schema(&self) -> Result<(), CacheError> {
        let conn = self.conn();

        // Wait for other tabs instead of failing on a locked file
        conn.busy_timeout(std::time::Duration::from_secs(5))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS entries (
                key             TEXT PRIMARY KEY,
                value           TEXT NOT NULL,
                updated_at      INTEGER NOT NULL
            )",
            [],
        )?;

        debug!("Local store schema initialized");
        Ok(())
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        // A poisoned lock only means another thread panicked mid-call;
        // every statement is atomic so the connection is still consistent.
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Get the path to the database file (None for in-memory stores)
    pub fn path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Read the raw value stored under a key
    pub fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let value = self
            .conn()
            .query_row("SELECT value FROM entries WHERE key = ?1", [key], |row| row.get(0))
            .optional()?;
        Ok(value)
    }

    /// Store a value, replacing whatever was there
    pub fn set(&self, key: &str, value: &str) -> Result<(), CacheError> {
        self.conn().execute(
            "INSERT INTO entries (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            rusqlite::params![key, value, Utc::now().timestamp()],
        )?;
        Ok(())
    }

    /// Remove a key; removing a missing key is not an error
    pub fn remove(&self, key: &str) -> Result<(), CacheError> {
        self.conn().execute("DELETE FROM entries WHERE key = ?1", [key])?;
        Ok(())
    }

    /// Counter that changes whenever another connection commits
    pub fn data_version(&self) -> Result<i64, CacheError> {
        let version = self
            .conn()
            .query_row("PRAGMA data_version", [], |row| row.get(0))?;
        Ok(version)
    }
}

// Implement Debug for better error messages
impl std::fmt::Debug for LocalStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalStore")
            .field("db_path", &self.db_path)
            .finish()
    }
}
