//! The dynamic component descriptor.
//!
//! A component is a versioned, checksummed unit of loadable payload
//! (code / resource / config) fetched from an update source. The descriptor
//! wire shape is JSON with the payload transported as base64.

use crate::ids::ComponentId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Kind of payload a component carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComponentType {
    UiModule,
    NativeModule,
    Logic,
    Config,
    Resource,
    Hybrid,
}

/// A versioned, loadable component as described by an update package.
///
/// Invariants enforced by the security validator, not by construction:
/// `checksum` must equal the SHA-256 hex digest of `content`, and
/// `signature` must verify against the configured signing key when the
/// policy requires signed components.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DynamicComponent {
    pub id: ComponentId,
    pub name: String,
    /// Semver version string, e.g. "1.4.0".
    pub version: String,
    #[serde(rename = "type")]
    pub component_type: ComponentType,
    /// Free-form descriptor metadata. BTreeMap keeps the wire order stable.
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    /// Ids of components that must be registered before this one loads.
    #[serde(default)]
    pub dependencies: Vec<ComponentId>,
    /// Component-scoped configuration overrides.
    #[serde(default)]
    pub config: BTreeMap<String, String>,
    /// Opaque payload bytes, base64 on the wire.
    #[serde(with = "base64_bytes")]
    pub content: Vec<u8>,
    /// SHA-256 hex digest of `content`.
    pub checksum: String,
    /// Keyed digest over the checksum; empty when unsigned.
    #[serde(default)]
    pub signature: String,
}

impl DynamicComponent {
    /// Source domain of the component, read from descriptor metadata.
    /// Components without a `source` entry have no domain to trust-check.
    #[must_use]
    pub fn source_domain(&self) -> Option<&str> {
        self.metadata.get("source").map(String::as_str)
    }
}

/// Serde helper: `Vec<u8>` as a base64 string on the wire.
mod base64_bytes {
    use base64::{Engine, engine::general_purpose::STANDARD};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
