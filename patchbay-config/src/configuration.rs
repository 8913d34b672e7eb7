//! The configuration document model.

use crate::rules::ValidationRule;
use crate::value::ConfigValue;
use chrono::{DateTime, Utc};
use patchbay_crypto::sha256_hex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Where a configuration applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConfigScope {
    Global,
    Application,
    Component,
    Session,
}

/// A named bag of typed values plus the rules that constrain them.
///
/// The checksum covers the serialized value map and is recomputed on every
/// write, so drift between `values` and `checksum` marks a tampered or
/// torn document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DynamicConfiguration {
    pub id: String,
    pub category: String,
    /// Higher priority wins when scopes overlap; informational here, the
    /// engine orders by it when applying remote packages.
    pub priority: i32,
    pub scope: ConfigScope,
    pub values: BTreeMap<String, ConfigValue>,
    pub validation_rules: Vec<ValidationRule>,
    pub last_modified: DateTime<Utc>,
    pub checksum: String,
}

impl DynamicConfiguration {
    pub fn new(id: impl Into<String>, category: impl Into<String>, scope: ConfigScope) -> Self {
        let mut config = Self {
            id: id.into(),
            category: category.into(),
            priority: 0,
            scope,
            values: BTreeMap::new(),
            validation_rules: Vec::new(),
            last_modified: Utc::now(),
            checksum: String::new(),
        };
        config.refresh_checksum();
        config
    }

    /// Digest over the serialized value map. `values` is a `BTreeMap`, so
    /// serialization order is stable and the digest is deterministic.
    #[must_use]
    pub fn compute_checksum(&self) -> String {
        // BTreeMap serialization cannot fail.
        let bytes = serde_json::to_vec(&self.values).unwrap_or_default();
        sha256_hex(&bytes)
    }

    /// Recomputes the checksum and bumps `last_modified`. Call after any
    /// mutation of `values`.
    pub fn refresh_checksum(&mut self) {
        self.checksum = self.compute_checksum();
        self.last_modified = Utc::now();
    }

    #[must_use]
    pub fn checksum_matches(&self) -> bool {
        self.checksum == self.compute_checksum()
    }
}
