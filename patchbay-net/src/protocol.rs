//! Wire shapes for the update service.

use patchbay_config::DynamicConfiguration;
use patchbay_types::DynamicComponent;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Body of `POST /updates/check`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateCheckRequest {
    pub current_version: String,
    pub platform: String,
    pub device_id: String,
}

/// One available update, as announced by the update service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateDescriptor {
    pub component_id: String,
    pub version: String,
    pub checksum: String,
    #[serde(default)]
    pub mandatory: bool,
}

/// A full update bundle: component payloads plus the configurations that
/// ship with them, keyed by configuration id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdatePackage {
    pub version: String,
    pub components: Vec<DynamicComponent>,
    #[serde(default)]
    pub configurations: BTreeMap<String, DynamicConfiguration>,
    pub signature: String,
    pub checksum: String,
}
