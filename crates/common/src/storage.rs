//! Origin-scoped durable key-value storage
//!
//! The SQLite-backed equivalent of a browser profile's local storage: every
//! origin owns an independent string-to-string map that survives reloads and
//! process restarts until it is cleared.

use crate::types::Origin;
use crate::Result;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// All storage areas, keyed by origin then by item key
pub type StorageSnapshot = BTreeMap<Origin, BTreeMap<String, String>>;

/// Local storage for every origin of one profile
#[derive(Clone)]
pub struct LocalStorage {
    conn: Arc<Mutex<Connection>>,
}

impl LocalStorage {
    /// Open or create the storage database at path
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref())?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        let storage = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        storage.init_schema()?;

        info!("Opened local storage at {:?}", path.as_ref());
        Ok(storage)
    }

    /// Open in-memory storage (for testing)
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let storage = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        storage.init_schema()?;
        Ok(storage)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS local_storage (
                origin TEXT NOT NULL,
                key TEXT NOT NULL,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL,
                PRIMARY KEY (origin, key)
            );
            "#,
        )?;

        debug!("Local storage schema initialized");
        Ok(())
    }

    /// Handle on the storage area of one origin
    pub fn area(&self, origin: Origin) -> StorageArea {
        StorageArea {
            storage: self.clone(),
            origin,
        }
    }

    /// Read an item
    pub fn get_item(&self, origin: &Origin, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock();
        let value = conn
            .query_row(
                "SELECT value FROM local_storage WHERE origin = ?1 AND key = ?2",
                params![origin.as_str(), key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    /// Write an item, replacing any previous value
    pub fn set_item(&self, origin: &Origin, key: &str, value: &str) -> Result<()> {
        let conn = self.conn.lock();
        let now = chrono::Utc::now().timestamp();

        conn.execute(
            "INSERT INTO local_storage (origin, key, value, updated_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(origin, key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![origin.as_str(), key, value, now],
        )?;

        debug!("Stored {} bytes under {} for {}", value.len(), key, origin);
        Ok(())
    }

    /// Remove an item. Returns whether it existed.
    pub fn remove_item(&self, origin: &Origin, key: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let n = conn.execute(
            "DELETE FROM local_storage WHERE origin = ?1 AND key = ?2",
            params![origin.as_str(), key],
        )?;
        Ok(n > 0)
    }

    /// Keys stored for an origin, in key order
    pub fn keys(&self, origin: &Origin) -> Result<Vec<String>> {
        let conn = self.conn.lock();
        let mut stmt =
            conn.prepare("SELECT key FROM local_storage WHERE origin = ?1 ORDER BY key")?;
        let keys = stmt
            .query_map(params![origin.as_str()], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(keys)
    }

    /// Clear one origin's storage area. Returns the number of removed items.
    pub fn clear(&self, origin: &Origin) -> Result<usize> {
        let conn = self.conn.lock();
        let n = conn.execute(
            "DELETE FROM local_storage WHERE origin = ?1",
            params![origin.as_str()],
        )?;
        info!("Cleared {} item(s) from local storage of {}", n, origin);
        Ok(n)
    }

    /// Clear the storage of every origin
    pub fn clear_all(&self) -> Result<usize> {
        let conn = self.conn.lock();
        let n = conn.execute("DELETE FROM local_storage", [])?;
        info!("Cleared {} item(s) from all local storage", n);
        Ok(n)
    }

    /// Every item of every origin
    pub fn snapshot_all(&self) -> Result<StorageSnapshot> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT origin, key, value FROM local_storage")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut snapshot = StorageSnapshot::new();
        for row in rows {
            let (origin, key, value) = row?;
            snapshot
                .entry(Origin::from_url(&origin)?)
                .or_default()
                .insert(key, value);
        }
        Ok(snapshot)
    }
}

/// The storage area of a single origin
#[derive(Clone)]
pub struct StorageArea {
    storage: LocalStorage,
    origin: Origin,
}

impl StorageArea {
    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    pub fn get_item(&self, key: &str) -> Result<Option<String>> {
        self.storage.get_item(&self.origin, key)
    }

    pub fn set_item(&self, key: &str, value: &str) -> Result<()> {
        self.storage.set_item(&self.origin, key, value)
    }

    pub fn remove_item(&self, key: &str) -> Result<bool> {
        self.storage.remove_item(&self.origin, key)
    }

    pub fn keys(&self) -> Result<Vec<String>> {
        self.storage.keys(&self.origin)
    }

    pub fn clear(&self) -> Result<usize> {
        self.storage.clear(&self.origin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin(s: &str) -> Origin {
        Origin::from_url(s).unwrap()
    }

    #[test]
    fn test_items_are_scoped_by_origin() {
        let storage = LocalStorage::open_memory().unwrap();
        let a = origin("http://127.0.0.1:8080");
        let b = origin("http://127.0.0.1:9090");

        storage.set_item(&a, "images", "[]").unwrap();
        assert_eq!(storage.get_item(&a, "images").unwrap().as_deref(), Some("[]"));
        assert_eq!(storage.get_item(&b, "images").unwrap(), None);

        storage.set_item(&a, "images", "[1]").unwrap();
        assert_eq!(storage.get_item(&a, "images").unwrap().as_deref(), Some("[1]"));
        assert_eq!(storage.keys(&a).unwrap(), vec!["images".to_string()]);
    }

    #[test]
    fn test_clear_and_clear_all() {
        let storage = LocalStorage::open_memory().unwrap();
        let a = origin("http://a.test");
        let b = origin("http://b.test");
        storage.set_item(&a, "k", "1").unwrap();
        storage.set_item(&b, "k", "2").unwrap();

        assert_eq!(storage.clear(&a).unwrap(), 1);
        let snapshot = storage.snapshot_all().unwrap();
        assert!(!snapshot.contains_key(&a));
        assert_eq!(snapshot[&b]["k"], "2");

        assert_eq!(storage.clear_all().unwrap(), 1);
        assert!(storage.snapshot_all().unwrap().is_empty());
    }

    #[test]
    fn test_remove_item() {
        let storage = LocalStorage::open_memory().unwrap();
        let area = storage.area(origin("http://a.test"));
        area.set_item("k", "v").unwrap();
        assert!(area.remove_item("k").unwrap());
        assert!(!area.remove_item("k").unwrap());
        assert!(area.keys().unwrap().is_empty());
    }

    #[test]
    fn test_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.db");
        let a = origin("http://a.test");

        {
            let storage = LocalStorage::open(&path).unwrap();
            storage.set_item(&a, "images", r#"[{"title":"t","imageUrl":"u"}]"#).unwrap();
        }

        let storage = LocalStorage::open(&path).unwrap();
        assert_eq!(
            storage.get_item(&a, "images").unwrap().as_deref(),
            Some(r#"[{"title":"t","imageUrl":"u"}]"#)
        );
    }
}
