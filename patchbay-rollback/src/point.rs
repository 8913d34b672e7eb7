//! Rollback points and the append-only operation history.

use crate::error::{RollbackError, RollbackResult};
use chrono::{DateTime, Utc};
use patchbay_crypto::sha256_hex;
use patchbay_types::{ComponentId, DynamicComponent, OperationId, RollbackPointId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// An immutable snapshot of a component's full state, taken before a
/// load or update so the previous version can be restored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollbackPoint {
    pub id: RollbackPointId,
    pub component_id: ComponentId,
    pub version: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    /// Serialized `DynamicComponent` snapshot.
    pub component_data: Vec<u8>,
    /// Component-scoped configuration at snapshot time.
    pub config_data: BTreeMap<String, String>,
    pub dependencies: Vec<ComponentId>,
    /// SHA-256 hex digest of `component_data`, verified on restore.
    pub checksum: String,
}

impl RollbackPoint {
    /// Snapshots a component under a fresh point id.
    pub fn snapshot(component: &DynamicComponent, description: &str) -> RollbackResult<Self> {
        let component_data = serde_json::to_vec(component)?;
        let checksum = sha256_hex(&component_data);
        Ok(Self {
            id: RollbackPointId::new(),
            component_id: component.id.clone(),
            version: component.version.clone(),
            description: description.to_string(),
            created_at: Utc::now(),
            component_data,
            config_data: component.config.clone(),
            dependencies: component.dependencies.clone(),
            checksum,
        })
    }

    /// Recomputes the snapshot checksum. False means the point is corrupt.
    #[must_use]
    pub fn verify_integrity(&self) -> bool {
        sha256_hex(&self.component_data) == self.checksum
    }

    /// Reconstructs the snapshotted component, rejecting corrupted points.
    pub fn restore(&self) -> RollbackResult<DynamicComponent> {
        if !self.verify_integrity() {
            return Err(RollbackError::CorruptedPoint(self.id));
        }
        Ok(serde_json::from_slice(&self.component_data)?)
    }
}

/// Status of a recorded rollback operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RollbackStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

/// One entry in the append-only rollback history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollbackOperation {
    pub id: OperationId,
    pub component_id: ComponentId,
    pub from_version: Option<String>,
    pub to_version: String,
    pub rollback_point_id: RollbackPointId,
    pub status: RollbackStatus,
    pub started_at: DateTime<Utc>,
}

impl RollbackOperation {
    /// Starts a new operation record in `Pending`.
    pub fn begin(
        component_id: ComponentId,
        from_version: Option<String>,
        to_version: String,
        rollback_point_id: RollbackPointId,
    ) -> Self {
        Self {
            id: OperationId::new(),
            component_id,
            from_version,
            to_version,
            rollback_point_id,
            status: RollbackStatus::Pending,
            started_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use patchbay_types::ComponentType;

    fn component() -> DynamicComponent {
        DynamicComponent {
            id: ComponentId::new("ui.panel"),
            name: "Panel".to_string(),
            version: "2.1.0".to_string(),
            component_type: ComponentType::UiModule,
            metadata: BTreeMap::new(),
            dependencies: vec![ComponentId::new("core.theme")],
            config: BTreeMap::from([("theme".to_string(), "dark".to_string())]),
            content: b"panel payload".to_vec(),
            checksum: "irrelevant-here".to_string(),
            signature: String::new(),
        }
    }

    #[test]
    fn snapshot_restores_identical_component() {
        let original = component();
        let point = RollbackPoint::snapshot(&original, "pre-update").unwrap();

        assert_eq!(point.component_id, original.id);
        assert_eq!(point.version, "2.1.0");
        assert_eq!(point.dependencies, original.dependencies);
        assert_eq!(point.config_data, original.config);
        assert!(point.verify_integrity());

        let restored = point.restore().unwrap();
        assert_eq!(restored, original);
    }

    #[test]
    fn tampered_snapshot_is_rejected() {
        let mut point = RollbackPoint::snapshot(&component(), "pre-update").unwrap();
        point.component_data[0] ^= 0xff;

        assert!(!point.verify_integrity());
        assert!(matches!(
            point.restore(),
            Err(RollbackError::CorruptedPoint(_))
        ));
    }

    #[test]
    fn operation_begins_pending() {
        let op = RollbackOperation::begin(
            ComponentId::new("x"),
            Some("2.0.0".to_string()),
            "1.0.0".to_string(),
            RollbackPointId::new(),
        );
        assert_eq!(op.status, RollbackStatus::Pending);
        assert_eq!(op.from_version.as_deref(), Some("2.0.0"));
    }
}
