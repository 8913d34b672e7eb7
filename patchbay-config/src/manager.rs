//! Configuration manager: typed documents, validation, merge, change events.
//!
//! Documents persist in the `config_` storage namespace keyed by config id
//! and are mirrored in memory. Every successful write emits exactly one
//! `ConfigChangeEvent` on the broadcast channel.

use crate::configuration::DynamicConfiguration;
use crate::error::{ConfigError, ConfigResult};
use crate::events::{ConfigChangeEvent, ConfigChangeKind, KeyEvents};
use crate::rules::{validate_values, CustomPredicate, CustomRuleSet, ValidationReport};
use crate::value::ConfigValue;
use patchbay_storage::{StorageCategory, StorageManager};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::{info, warn};

const EVENT_CHANNEL_CAPACITY: usize = 64;

pub struct ConfigManager {
    storage: Arc<StorageManager>,
    configs: RwLock<HashMap<String, DynamicConfiguration>>,
    custom_rules: std::sync::RwLock<CustomRuleSet>,
    events: broadcast::Sender<ConfigChangeEvent>,
}

impl ConfigManager {
    /// Creates a manager, rebuilding the in-memory mirror from storage.
    /// Unreadable rows (including foreign keys sharing the namespace) are
    /// skipped with a warning.
    pub async fn load(storage: Arc<StorageManager>) -> ConfigResult<Self> {
        let mut configs = HashMap::new();
        for key in storage.keys(StorageCategory::Config).await? {
            match storage
                .get_json::<DynamicConfiguration>(StorageCategory::Config, &key)
                .await?
            {
                Some(config) => {
                    configs.insert(config.id.clone(), config);
                }
                None => warn!(key = %key, "skipping unreadable configuration row"),
            }
        }
        info!(count = configs.len(), "configurations loaded");

        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Ok(Self {
            storage,
            configs: RwLock::new(configs),
            custom_rules: std::sync::RwLock::new(CustomRuleSet::default()),
            events,
        })
    }

    // ── Validation ───────────────────────────────────────────────

    /// Registers a named predicate for `Custom` rules.
    pub fn register_custom_rule(&self, name: impl Into<String>, predicate: CustomPredicate) {
        self.custom_rules
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .register(name, predicate);
    }

    /// Evaluates a document against its own rules.
    #[must_use]
    pub fn validate(&self, config: &DynamicConfiguration) -> ValidationReport {
        let custom = self
            .custom_rules
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        validate_values(&config.values, &config.validation_rules, &custom)
    }

    // ── Document operations ──────────────────────────────────────

    /// Validates, persists, and registers a configuration. Emits `Created`
    /// for new ids, `Updated` otherwise.
    pub async fn save_configuration(&self, mut config: DynamicConfiguration) -> ConfigResult<()> {
        let report = self.validate(&config);
        if !report.is_valid() {
            return Err(ConfigError::Invalid {
                id: config.id,
                errors: report.errors,
            });
        }
        for warning in &report.warnings {
            warn!(config_id = %config.id, %warning, "configuration warning");
        }

        config.refresh_checksum();
        self.persist(&config).await?;

        let kind = {
            let mut configs = self.configs.write().await;
            let existed = configs.insert(config.id.clone(), config.clone()).is_some();
            if existed {
                ConfigChangeKind::Updated
            } else {
                ConfigChangeKind::Created
            }
        };
        self.emit(ConfigChangeEvent::now(kind, &config.id, None));
        Ok(())
    }

    pub async fn get_configuration(&self, id: &str) -> Option<DynamicConfiguration> {
        self.configs.read().await.get(id).cloned()
    }

    pub async fn configurations(&self) -> Vec<DynamicConfiguration> {
        let mut all: Vec<_> = self.configs.read().await.values().cloned().collect();
        all.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.id.cmp(&b.id)));
        all
    }

    /// Removes a configuration. Returns false if the id was unknown.
    pub async fn delete_configuration(&self, id: &str) -> ConfigResult<bool> {
        let removed = self.configs.write().await.remove(id).is_some();
        if removed {
            self.storage.delete(StorageCategory::Config, id).await?;
            self.emit(ConfigChangeEvent::now(ConfigChangeKind::Deleted, id, None));
        }
        Ok(removed)
    }

    // ── Value operations ─────────────────────────────────────────

    /// Writes one key, revalidating the whole document. Emits `Updated`
    /// carrying the key.
    pub async fn set_config_value(
        &self,
        config_id: &str,
        key: &str,
        value: ConfigValue,
    ) -> ConfigResult<()> {
        let updated = {
            let configs = self.configs.read().await;
            let mut config = configs
                .get(config_id)
                .cloned()
                .ok_or_else(|| ConfigError::NotFound(config_id.to_string()))?;
            config.values.insert(key.to_string(), value);
            config
        };

        let report = self.validate(&updated);
        if !report.is_valid() {
            return Err(ConfigError::Invalid {
                id: config_id.to_string(),
                errors: report.errors,
            });
        }

        let mut updated = updated;
        updated.refresh_checksum();
        self.persist(&updated).await?;
        self.configs
            .write()
            .await
            .insert(config_id.to_string(), updated);

        self.emit(ConfigChangeEvent::now(
            ConfigChangeKind::Updated,
            config_id,
            Some(key),
        ));
        Ok(())
    }

    pub async fn get_config_value(&self, config_id: &str, key: &str) -> Option<ConfigValue> {
        self.configs
            .read()
            .await
            .get(config_id)?
            .values
            .get(key)
            .cloned()
    }

    // ── Merge ────────────────────────────────────────────────────

    /// Pure merge: the override's keys win on conflict, neither source is
    /// mutated. The result keeps the base's identity and the higher of the
    /// two priorities; the override's rules are appended (deduplicated).
    #[must_use]
    pub fn merge_configurations(
        base: &DynamicConfiguration,
        overlay: &DynamicConfiguration,
    ) -> DynamicConfiguration {
        let mut merged = base.clone();
        merged.priority = base.priority.max(overlay.priority);
        for (key, value) in &overlay.values {
            merged.values.insert(key.clone(), value.clone());
        }
        for rule in &overlay.validation_rules {
            if !merged.validation_rules.contains(rule) {
                merged.validation_rules.push(rule.clone());
            }
        }
        merged.refresh_checksum();
        merged
    }

    /// Merges two registered documents and saves the result under the base
    /// id, emitting a single `Merged` event.
    pub async fn merge_and_save(
        &self,
        base_id: &str,
        overlay_id: &str,
    ) -> ConfigResult<DynamicConfiguration> {
        let (base, overlay) = {
            let configs = self.configs.read().await;
            let base = configs
                .get(base_id)
                .cloned()
                .ok_or_else(|| ConfigError::NotFound(base_id.to_string()))?;
            let overlay = configs
                .get(overlay_id)
                .cloned()
                .ok_or_else(|| ConfigError::NotFound(overlay_id.to_string()))?;
            (base, overlay)
        };

        let merged = Self::merge_configurations(&base, &overlay);
        let report = self.validate(&merged);
        if !report.is_valid() {
            return Err(ConfigError::Invalid {
                id: merged.id,
                errors: report.errors,
            });
        }

        self.persist(&merged).await?;
        self.configs
            .write()
            .await
            .insert(merged.id.clone(), merged.clone());
        self.emit(ConfigChangeEvent::now(
            ConfigChangeKind::Merged,
            &merged.id,
            None,
        ));
        Ok(merged)
    }

    // ── Remote application ───────────────────────────────────────

    /// Applies configurations from a remote update package or a rollback,
    /// continue-on-error. Invalid documents are skipped with a warning.
    /// Returns the number applied; each emits a `Restored` event.
    pub async fn apply_remote(&self, incoming: Vec<DynamicConfiguration>) -> ConfigResult<usize> {
        let mut applied = 0;
        for mut config in incoming {
            let report = self.validate(&config);
            if !report.is_valid() {
                warn!(
                    config_id = %config.id,
                    errors = ?report.errors,
                    "skipping invalid remote configuration"
                );
                continue;
            }

            config.refresh_checksum();
            if let Err(e) = self.persist(&config).await {
                warn!(config_id = %config.id, error = %e, "failed to persist remote configuration");
                continue;
            }
            let id = config.id.clone();
            self.configs.write().await.insert(id.clone(), config);
            self.emit(ConfigChangeEvent::now(ConfigChangeKind::Restored, &id, None));
            applied += 1;
        }
        Ok(applied)
    }

    // ── Observation ──────────────────────────────────────────────

    /// All change events, unfiltered.
    pub fn subscribe(&self) -> broadcast::Receiver<ConfigChangeEvent> {
        self.events.subscribe()
    }

    /// Events for one configuration, optionally narrowed to one key.
    pub fn subscribe_key(&self, config_id: &str, key: Option<&str>) -> KeyEvents {
        KeyEvents::new(
            self.events.subscribe(),
            config_id.to_string(),
            key.map(str::to_string),
        )
    }

    // ── Internals ────────────────────────────────────────────────

    async fn persist(&self, config: &DynamicConfiguration) -> ConfigResult<()> {
        self.storage
            .put_json(StorageCategory::Config, &config.id, config)
            .await?;
        Ok(())
    }

    fn emit(&self, event: ConfigChangeEvent) {
        // No receivers is fine.
        let _ = self.events.send(event);
    }
}
