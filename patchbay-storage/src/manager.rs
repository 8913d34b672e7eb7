//! Storage manager: caching front over the encrypted persistence pipeline.
//!
//! Writes run serialize → compress → encrypt → persist; reads run the exact
//! inverse. The in-memory cache holds plaintext blobs keyed by flat
//! namespaced key and is updated synchronously with every write. Blocking
//! SQLite work runs on the blocking pool.

use crate::cache::{CacheStats, MemoryCache};
use crate::error::{StorageError, StorageResult};
use crate::kv::{KvStore, StorageCategory};
use crate::pipeline::{compress, decompress};
use base64::{Engine, engine::general_purpose::STANDARD};
use patchbay_crypto::PayloadCipher;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// Default cache capacity (entries).
const DEFAULT_CACHE_CAPACITY: usize = 256;

/// Outcome of replaying an exported backup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportReport {
    /// Keys restored successfully.
    pub imported: usize,
    /// Keys that failed, with the failure message.
    pub failed: Vec<(String, String)>,
}

impl ImportReport {
    /// True when every key was restored.
    #[must_use]
    pub fn success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Caching, encrypting key/value store shared by all subsystems.
pub struct StorageManager {
    store: Arc<KvStore>,
    cipher: Arc<dyn PayloadCipher>,
    cache: Mutex<MemoryCache>,
}

impl StorageManager {
    /// Creates a manager over an opened store and cipher.
    pub fn new(store: KvStore, cipher: Arc<dyn PayloadCipher>) -> Self {
        Self::with_cache_capacity(store, cipher, DEFAULT_CACHE_CAPACITY)
    }

    /// Creates a manager with an explicit cache capacity.
    pub fn with_cache_capacity(
        store: KvStore,
        cipher: Arc<dyn PayloadCipher>,
        capacity: usize,
    ) -> Self {
        Self {
            store: Arc::new(store),
            cipher,
            cache: Mutex::new(MemoryCache::new(capacity)),
        }
    }

    // ── Raw byte interface ───────────────────────────────────────

    /// Persists a plaintext blob through the compress→encrypt pipeline,
    /// updating the cache synchronously.
    pub async fn put_bytes(
        &self,
        category: StorageCategory,
        key: &str,
        plaintext: Vec<u8>,
    ) -> StorageResult<()> {
        let store = Arc::clone(&self.store);
        let cipher = Arc::clone(&self.cipher);
        let key_owned = key.to_string();
        let to_persist = plaintext.clone();

        tokio::task::spawn_blocking(move || -> StorageResult<()> {
            let compressed = compress(&to_persist)?;
            let encrypted = cipher.encrypt_bytes(&compressed)?;
            store.put(category, &key_owned, &encrypted)
        })
        .await
        .map_err(|e| StorageError::TaskJoin(e.to_string()))??;

        self.cache
            .lock()
            .unwrap()
            .put(category.flat_key(key), plaintext);
        Ok(())
    }

    /// Reads a plaintext blob, checking the cache first. Corrupt rows
    /// (decrypt or decompress failure) degrade to `None` with a warning
    /// instead of propagating.
    pub async fn get_bytes(
        &self,
        category: StorageCategory,
        key: &str,
    ) -> StorageResult<Option<Vec<u8>>> {
        let flat = category.flat_key(key);
        if let Some(cached) = self.cache.lock().unwrap().get(&flat) {
            return Ok(Some(cached));
        }

        let store = Arc::clone(&self.store);
        let cipher = Arc::clone(&self.cipher);
        let key_owned = key.to_string();

        let decoded = tokio::task::spawn_blocking(move || -> StorageResult<Option<Vec<u8>>> {
            let Some(encrypted) = store.get(category, &key_owned)? else {
                return Ok(None);
            };
            let compressed = cipher.decrypt_bytes(&encrypted)?;
            Ok(Some(decompress(&compressed)?))
        })
        .await
        .map_err(|e| StorageError::TaskJoin(e.to_string()))?;

        match decoded {
            Ok(Some(plaintext)) => {
                self.cache.lock().unwrap().put(flat, plaintext.clone());
                Ok(Some(plaintext))
            }
            Ok(None) => Ok(None),
            Err(e @ (StorageError::Encryption(_) | StorageError::Io(_))) => {
                warn!(key = %flat, error = %e, "corrupt storage row, degrading to not-found");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Deletes a key from store and cache.
    pub async fn delete(&self, category: StorageCategory, key: &str) -> StorageResult<bool> {
        let store = Arc::clone(&self.store);
        let key_owned = key.to_string();
        let removed = tokio::task::spawn_blocking(move || store.delete(category, &key_owned))
            .await
            .map_err(|e| StorageError::TaskJoin(e.to_string()))??;

        self.cache.lock().unwrap().remove(&category.flat_key(key));
        Ok(removed)
    }

    /// Lists keys in a category.
    pub async fn keys(&self, category: StorageCategory) -> StorageResult<Vec<String>> {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || store.keys(category))
            .await
            .map_err(|e| StorageError::TaskJoin(e.to_string()))?
    }

    // ── Typed interface ──────────────────────────────────────────

    /// Serializes a value as JSON and persists it.
    pub async fn put_json<T: Serialize>(
        &self,
        category: StorageCategory,
        key: &str,
        value: &T,
    ) -> StorageResult<()> {
        let bytes = serde_json::to_vec(value)?;
        self.put_bytes(category, key, bytes).await
    }

    /// Reads a JSON value. Rows that fail to deserialize degrade to `None`
    /// with a warning, matching the raw read path.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        category: StorageCategory,
        key: &str,
    ) -> StorageResult<Option<T>> {
        let Some(bytes) = self.get_bytes(category, key).await? else {
            return Ok(None);
        };
        match serde_json::from_slice(&bytes) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!(key = %category.flat_key(key), error = %e, "stored JSON failed to parse");
                Ok(None)
            }
        }
    }

    // ── Cache maintenance ────────────────────────────────────────

    /// Current cache counters.
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.lock().unwrap().stats()
    }

    /// Drops all cached entries.
    pub fn clear_cache(&self) {
        self.cache.lock().unwrap().clear();
    }

    // ── Backup export / import ───────────────────────────────────

    /// Exports every persisted row as a flat `namespaced-key → base64`
    /// map. Values are exported as stored (still encrypted), so a backup
    /// is only readable by a manager holding the same key.
    pub async fn export_backup(&self) -> StorageResult<BTreeMap<String, String>> {
        let store = Arc::clone(&self.store);
        let rows = tokio::task::spawn_blocking(move || store.dump())
            .await
            .map_err(|e| StorageError::TaskJoin(e.to_string()))??;

        let mut out = BTreeMap::new();
        for (category, key, value) in rows {
            out.insert(category.flat_key(&key), STANDARD.encode(&value));
        }
        debug!(entries = out.len(), "exported storage backup");
        Ok(out)
    }

    /// Replays an exported backup key-by-key. A bad entry is recorded and
    /// skipped; the report carries the aggregate outcome.
    pub async fn import_backup(
        &self,
        backup: &BTreeMap<String, String>,
    ) -> StorageResult<ImportReport> {
        let mut report = ImportReport {
            imported: 0,
            failed: Vec::new(),
        };

        for (flat, encoded) in backup {
            let Some((category, key)) = StorageCategory::split_flat_key(flat) else {
                report
                    .failed
                    .push((flat.clone(), "unknown key namespace".to_string()));
                continue;
            };
            let value = match STANDARD.decode(encoded.as_bytes()) {
                Ok(v) => v,
                Err(e) => {
                    report.failed.push((flat.clone(), format!("invalid base64: {e}")));
                    continue;
                }
            };

            let store = Arc::clone(&self.store);
            let key_owned = key.to_string();
            let result = tokio::task::spawn_blocking(move || store.put(category, &key_owned, &value))
                .await
                .map_err(|e| StorageError::TaskJoin(e.to_string()))?;

            match result {
                Ok(()) => report.imported += 1,
                Err(e) => report.failed.push((flat.clone(), e.to_string())),
            }
        }

        // Imported rows bypass the write-through path, so drop stale entries.
        self.clear_cache();

        if !report.success() {
            warn!(failed = report.failed.len(), "backup import completed with failures");
        }
        Ok(report)
    }
}
