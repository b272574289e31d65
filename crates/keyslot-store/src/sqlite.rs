//! SQLite implementation of the Backend trait.
//!
//! This is the primary durable backend. It uses rusqlite with bundled SQLite;
//! the connection sits behind a mutex so the backend can be shared with the
//! registry's save worker.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::Backend;

/// SQLite-based backend.
pub struct SqliteBackend {
    /// The SQLite connection, protected by a mutex.
    conn: Arc<Mutex<Connection>>,
}

impl SqliteBackend {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file (and its parent directories) and runs migrations if
    /// it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| StoreError::Poisoned(format!("sqlite connection: {}", e)))
    }
}

impl Backend for SqliteBackend {
    fn get_string(&self, key: &str) -> Result<Option<String>> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT text FROM slots WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()
        .map_err(StoreError::from)
    }

    fn set_string(&self, key: &str, text: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO slots (key, text, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET text = excluded.text, updated_at = excluded.updated_at",
            params![key, text, crate::now_millis()],
        )?;
        tracing::trace!(key, bytes = text.len(), "stored slot text");
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT key FROM slots ORDER BY key")?;
        let keys = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_sqlite_backend_basic() {
        let backend = SqliteBackend::open_memory().unwrap();
        assert_eq!(backend.get_string("prefs").unwrap(), None);

        backend.set_string("prefs", "{\"a\": 1}").unwrap();
        assert_eq!(
            backend.get_string("prefs").unwrap().as_deref(),
            Some("{\"a\": 1}")
        );
    }

    #[test]
    fn test_sqlite_backend_upsert() {
        let backend = SqliteBackend::open_memory().unwrap();
        backend.set_string("prefs", "1").unwrap();
        backend.set_string("prefs", "2").unwrap();
        backend.set_string("other", "3").unwrap();

        assert_eq!(backend.get_string("prefs").unwrap().as_deref(), Some("2"));
        assert_eq!(
            backend.keys().unwrap(),
            vec!["other".to_string(), "prefs".to_string()]
        );
    }

    #[test]
    fn test_sqlite_backend_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state").join("slots.db");
        let backend = SqliteBackend::open(&path).unwrap();
        backend.set_string("prefs", "{}").unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_sqlite_backend_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("slots.db");

        {
            let backend = SqliteBackend::open(&path).unwrap();
            backend.set_string("prefs", "persisted").unwrap();
        }

        let backend = SqliteBackend::open(&path).unwrap();
        assert_eq!(
            backend.get_string("prefs").unwrap().as_deref(),
            Some("persisted")
        );
    }

    proptest! {
        #[test]
        fn test_sqlite_text_roundtrip(key in "[a-z][a-z0-9:_-]{0,31}", text in "\\PC*") {
            let backend = SqliteBackend::open_memory().unwrap();
            backend.set_string(&key, &text).unwrap();
            prop_assert_eq!(backend.get_string(&key).unwrap(), Some(text));
        }
    }
}
