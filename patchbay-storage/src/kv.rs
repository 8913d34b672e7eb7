//! Persistent key/value adapter backed by SQLite.
//!
//! Keys live in fixed namespaces (one per storage category) so collisions
//! across categories are impossible by construction. The adapter stores
//! opaque blobs; the compression/encryption pipeline lives above it in
//! `StorageManager`.

use crate::error::{StorageError, StorageResult};
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Storage namespace. Each category maps to a fixed key prefix used in
/// exported backups and log messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageCategory {
    Component,
    Config,
    Backup,
    Resource,
}

impl StorageCategory {
    /// Fixed key prefix for this category.
    #[must_use]
    pub const fn prefix(&self) -> &'static str {
        match self {
            Self::Component => "component_",
            Self::Config => "config_",
            Self::Backup => "backup_",
            Self::Resource => "resource_",
        }
    }

    /// All categories, in export order.
    pub const ALL: [StorageCategory; 4] = [
        Self::Component,
        Self::Config,
        Self::Backup,
        Self::Resource,
    ];

    /// Resolves a category from an exported flat key, returning the category
    /// and the bare key.
    pub fn split_flat_key(flat: &str) -> Option<(StorageCategory, &str)> {
        Self::ALL
            .iter()
            .find_map(|c| flat.strip_prefix(c.prefix()).map(|rest| (*c, rest)))
    }

    /// Builds the exported flat key for a bare key in this category.
    #[must_use]
    pub fn flat_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix(), key)
    }
}

/// Persistent store backed by SQLite.
pub struct KvStore {
    conn: Arc<Mutex<Connection>>,
}

impl KvStore {
    /// Opens (or creates) a store at the given path.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Opens an in-memory store (for testing).
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> StorageResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS kv (
                category TEXT NOT NULL,
                key TEXT NOT NULL,
                value BLOB NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (category, key)
            );
            ",
        )?;
        Ok(())
    }

    /// Inserts or replaces a blob.
    pub fn put(&self, category: StorageCategory, key: &str, value: &[u8]) -> StorageResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO kv (category, key, value, updated_at)
             VALUES (?1, ?2, ?3, datetime('now'))",
            params![category.prefix(), key, value],
        )?;
        Ok(())
    }

    /// Reads a blob, `None` when absent.
    pub fn get(&self, category: StorageCategory, key: &str) -> StorageResult<Option<Vec<u8>>> {
        let conn = self.conn.lock().unwrap();
        let value = conn
            .query_row(
                "SELECT value FROM kv WHERE category = ?1 AND key = ?2",
                params![category.prefix(), key],
                |row| row.get::<_, Vec<u8>>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// Deletes a key. Returns whether a row was removed.
    pub fn delete(&self, category: StorageCategory, key: &str) -> StorageResult<bool> {
        let conn = self.conn.lock().unwrap();
        let removed = conn.execute(
            "DELETE FROM kv WHERE category = ?1 AND key = ?2",
            params![category.prefix(), key],
        )?;
        Ok(removed > 0)
    }

    /// Lists all keys in a category.
    pub fn keys(&self, category: StorageCategory) -> StorageResult<Vec<String>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt =
            conn.prepare("SELECT key FROM kv WHERE category = ?1 ORDER BY key")?;
        let keys = stmt
            .query_map(params![category.prefix()], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(keys)
    }

    /// Returns every (category, key, value) triple, for backup export.
    pub fn dump(&self) -> StorageResult<Vec<(StorageCategory, String, Vec<u8>)>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt =
            conn.prepare("SELECT category, key, value FROM kv ORDER BY category, key")?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Vec<u8>>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut out = Vec::with_capacity(rows.len());
        for (prefix, key, value) in rows {
            let category = StorageCategory::ALL
                .iter()
                .copied()
                .find(|c| c.prefix() == prefix)
                .ok_or_else(|| {
                    StorageError::InvalidData(format!("unknown storage category: {prefix}"))
                })?;
            out.push((category, key, value));
        }
        Ok(out)
    }

    /// Number of rows in a category.
    pub fn count(&self, category: StorageCategory) -> StorageResult<usize> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM kv WHERE category = ?1",
            params![category.prefix()],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_get_delete() {
        let store = KvStore::open_in_memory().unwrap();
        store.put(StorageCategory::Component, "a", b"one").unwrap();
        assert_eq!(
            store.get(StorageCategory::Component, "a").unwrap(),
            Some(b"one".to_vec())
        );
        assert!(store.delete(StorageCategory::Component, "a").unwrap());
        assert_eq!(store.get(StorageCategory::Component, "a").unwrap(), None);
        assert!(!store.delete(StorageCategory::Component, "a").unwrap());
    }

    #[test]
    fn categories_do_not_collide() {
        let store = KvStore::open_in_memory().unwrap();
        store.put(StorageCategory::Component, "x", b"comp").unwrap();
        store.put(StorageCategory::Config, "x", b"conf").unwrap();
        assert_eq!(
            store.get(StorageCategory::Component, "x").unwrap(),
            Some(b"comp".to_vec())
        );
        assert_eq!(
            store.get(StorageCategory::Config, "x").unwrap(),
            Some(b"conf".to_vec())
        );
    }

    #[test]
    fn keys_are_scoped_to_category() {
        let store = KvStore::open_in_memory().unwrap();
        store.put(StorageCategory::Backup, "b1", b"1").unwrap();
        store.put(StorageCategory::Backup, "b2", b"2").unwrap();
        store.put(StorageCategory::Resource, "r1", b"3").unwrap();
        assert_eq!(store.keys(StorageCategory::Backup).unwrap(), vec!["b1", "b2"]);
        assert_eq!(store.count(StorageCategory::Resource).unwrap(), 1);
    }

    #[test]
    fn flat_key_splits_back() {
        let flat = StorageCategory::Backup.flat_key("point-1");
        assert_eq!(flat, "backup_point-1");
        let (cat, key) = StorageCategory::split_flat_key(&flat).unwrap();
        assert_eq!(cat, StorageCategory::Backup);
        assert_eq!(key, "point-1");
    }

    #[test]
    fn split_rejects_unknown_prefix() {
        assert!(StorageCategory::split_flat_key("mystery_key").is_none());
    }

    #[test]
    fn open_on_disk_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kv.db");
        {
            let store = KvStore::open(&path).unwrap();
            store.put(StorageCategory::Config, "k", b"v").unwrap();
        }
        let store = KvStore::open(&path).unwrap();
        assert_eq!(
            store.get(StorageCategory::Config, "k").unwrap(),
            Some(b"v".to_vec())
        );
    }
}
