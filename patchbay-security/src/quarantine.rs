//! Quarantine registry — a persisted block-list of component ids.
//!
//! A quarantined component cannot load, and any component that depends on
//! it fails validation with a CRITICAL violation. The set survives restarts
//! through the storage manager; reads are served from an in-memory mirror
//! so the validator stays synchronous.

use crate::error::{SecurityError, SecurityResult};
use patchbay_storage::{StorageCategory, StorageManager};
use patchbay_types::ComponentId;
use std::collections::HashSet;
use std::sync::{Arc, RwLock};
use tracing::info;

/// Reserved key in the config namespace holding the quarantine set.
const QUARANTINE_KEY: &str = "quarantine_set";

/// Persisted set of blocked component ids.
pub struct QuarantineRegistry {
    ids: RwLock<HashSet<ComponentId>>,
    storage: Arc<StorageManager>,
}

impl QuarantineRegistry {
    /// Loads the persisted set (empty when none was saved yet).
    pub async fn load(storage: Arc<StorageManager>) -> SecurityResult<Self> {
        let ids: HashSet<ComponentId> = storage
            .get_json(StorageCategory::Config, QUARANTINE_KEY)
            .await?
            .unwrap_or_default();
        Ok(Self {
            ids: RwLock::new(ids),
            storage,
        })
    }

    /// Adds a component to quarantine and persists the set.
    pub async fn quarantine(&self, id: ComponentId) -> SecurityResult<()> {
        let snapshot = {
            let mut ids = self.ids.write().unwrap();
            if !ids.insert(id.clone()) {
                return Ok(());
            }
            ids.clone()
        };
        info!(component_id = %id, "component quarantined");
        self.persist(&snapshot).await
    }

    /// Removes a component from quarantine and persists the set.
    pub async fn release(&self, id: &ComponentId) -> SecurityResult<()> {
        let snapshot = {
            let mut ids = self.ids.write().unwrap();
            if !ids.remove(id) {
                return Ok(());
            }
            ids.clone()
        };
        info!(component_id = %id, "component released from quarantine");
        self.persist(&snapshot).await
    }

    /// Synchronous membership check, served from the in-memory mirror.
    #[must_use]
    pub fn is_quarantined(&self, id: &ComponentId) -> bool {
        self.ids.read().unwrap().contains(id)
    }

    /// Current quarantined ids.
    #[must_use]
    pub fn all(&self) -> Vec<ComponentId> {
        let mut ids: Vec<_> = self.ids.read().unwrap().iter().cloned().collect();
        ids.sort();
        ids
    }

    async fn persist(&self, snapshot: &HashSet<ComponentId>) -> SecurityResult<()> {
        self.storage
            .put_json(StorageCategory::Config, QUARANTINE_KEY, snapshot)
            .await
            .map_err(SecurityError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use patchbay_crypto::PassthroughCipher;
    use patchbay_storage::KvStore;

    async fn storage() -> Arc<StorageManager> {
        Arc::new(StorageManager::new(
            KvStore::open_in_memory().unwrap(),
            Arc::new(PassthroughCipher),
        ))
    }

    #[tokio::test]
    async fn quarantine_and_release() {
        let registry = QuarantineRegistry::load(storage().await).await.unwrap();
        let id = ComponentId::new("bad.module");

        assert!(!registry.is_quarantined(&id));
        registry.quarantine(id.clone()).await.unwrap();
        assert!(registry.is_quarantined(&id));

        registry.release(&id).await.unwrap();
        assert!(!registry.is_quarantined(&id));
    }

    #[tokio::test]
    async fn set_survives_reload() {
        let storage = storage().await;
        {
            let registry = QuarantineRegistry::load(Arc::clone(&storage)).await.unwrap();
            registry.quarantine(ComponentId::new("bad.module")).await.unwrap();
        }

        let reloaded = QuarantineRegistry::load(storage).await.unwrap();
        assert!(reloaded.is_quarantined(&ComponentId::new("bad.module")));
        assert_eq!(reloaded.all().len(), 1);
    }

    #[tokio::test]
    async fn double_quarantine_is_idempotent() {
        let registry = QuarantineRegistry::load(storage().await).await.unwrap();
        let id = ComponentId::new("x");
        registry.quarantine(id.clone()).await.unwrap();
        registry.quarantine(id.clone()).await.unwrap();
        assert_eq!(registry.all(), vec![id]);
    }
}
