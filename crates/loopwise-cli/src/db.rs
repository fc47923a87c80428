use crate::error::{LoopError, Result};
use crate::storage::{LocalStore, StoreError};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

/// `LocalStore` backed by a single SQLite key/value table.
pub struct SqliteStore {
    conn: Connection,
    capacity: usize,
}

impl SqliteStore {
    /// Open (or create) the store at `~/.loopwise/loopwise.db`.
    pub fn open(capacity: usize) -> Result<Self> {
        let home = crate::config::loopwise_home()?;
        std::fs::create_dir_all(&home)?;
        Self::open_at(&home.join("loopwise.db"), capacity)
    }

    pub fn open_at(path: &Path, capacity: usize) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::with_connection(conn, capacity)
    }

    #[cfg(test)]
    pub fn open_in_memory(capacity: usize) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn, capacity)
    }

    fn with_connection(conn: Connection, capacity: usize) -> Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );",
        )
        .map_err(|e| LoopError::Database(e.to_string()))?;

        Ok(Self { conn, capacity })
    }

    /// Bytes used by every entry except `key`.
    fn used_bytes_excluding(&self, key: &str) -> std::result::Result<usize, StoreError> {
        let used: i64 = self
            .conn
            .query_row(
                "SELECT COALESCE(SUM(LENGTH(CAST(key AS BLOB)) + LENGTH(CAST(value AS BLOB))), 0) \
                 FROM kv WHERE key != ?1",
                params![key],
                |row| row.get(0),
            )
            .map_err(backend)?;
        Ok(used.max(0) as usize)
    }
}

fn backend(e: rusqlite::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

impl LocalStore for SqliteStore {
    fn get(&self, key: &str) -> std::result::Result<Option<String>, StoreError> {
        self.conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()
            .map_err(backend)
    }

    fn set(&mut self, key: &str, value: &str) -> std::result::Result<(), StoreError> {
        let needed = self.used_bytes_excluding(key)? + key.len() + value.len();
        if needed > self.capacity {
            return Err(StoreError::QuotaExceeded {
                needed,
                capacity: self.capacity,
            });
        }

        let now = chrono::Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3) \
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                params![key, value, now],
            )
            .map_err(backend)?;
        Ok(())
    }

}
