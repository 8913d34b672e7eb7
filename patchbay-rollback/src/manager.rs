//! Rollback manager: snapshot creation, retention, restore, history.
//!
//! Points persist in the `backup_` storage namespace keyed by point id and
//! are indexed in memory per component in creation order. The manager is
//! data-plane only — it hands restored components back to the lifecycle
//! engine, which owns the registry mutation.

use crate::error::{RollbackError, RollbackResult};
use crate::point::{RollbackOperation, RollbackPoint, RollbackStatus};
use chrono::{Duration, Utc};
use futures::stream::{self, StreamExt};
use patchbay_storage::{StorageCategory, StorageManager};
use patchbay_types::{ComponentId, DynamicComponent, RollbackPointId};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Retention and concurrency settings.
#[derive(Debug, Clone)]
pub struct RollbackConfig {
    /// Maximum points kept per component; oldest evicted first.
    pub max_rollback_points: usize,
    /// Points older than this are removed by the cleanup pass.
    pub retention_days: i64,
    /// Bounded parallelism for batch rollback.
    pub batch_parallelism: usize,
}

impl Default for RollbackConfig {
    fn default() -> Self {
        Self {
            max_rollback_points: 5,
            retention_days: 30,
            batch_parallelism: 4,
        }
    }
}

/// Outcome of an integrity sweep. Corrupted points are reported, not
/// deleted — the caller decides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegrityReport {
    pub checked: usize,
    pub corrupted: Vec<RollbackPointId>,
}

impl IntegrityReport {
    #[must_use]
    pub fn all_intact(&self) -> bool {
        self.corrupted.is_empty()
    }
}

/// Manages rollback points and the append-only operation history.
pub struct RollbackManager {
    storage: Arc<StorageManager>,
    config: RollbackConfig,
    /// Point ids per component, oldest first.
    index: RwLock<HashMap<ComponentId, Vec<RollbackPointId>>>,
    history: RwLock<Vec<RollbackOperation>>,
}

impl RollbackManager {
    /// Creates a manager, rebuilding the point index from storage.
    pub async fn load(storage: Arc<StorageManager>, config: RollbackConfig) -> RollbackResult<Self> {
        let mut points = Vec::new();
        for key in storage.keys(StorageCategory::Backup).await? {
            match storage
                .get_json::<RollbackPoint>(StorageCategory::Backup, &key)
                .await?
            {
                Some(point) => points.push(point),
                None => warn!(key = %key, "unreadable rollback point skipped during index rebuild"),
            }
        }
        points.sort_by_key(|p| p.created_at);

        let mut index: HashMap<ComponentId, Vec<RollbackPointId>> = HashMap::new();
        for point in points {
            index.entry(point.component_id).or_default().push(point.id);
        }

        Ok(Self {
            storage,
            config,
            index: RwLock::new(index),
            history: RwLock::new(Vec::new()),
        })
    }

    // ── Backup creation / retention ──────────────────────────────

    /// Snapshots a component's current state. Enforces the per-component
    /// point limit by evicting oldest-first.
    pub async fn create_backup(
        &self,
        component: &DynamicComponent,
        description: &str,
    ) -> RollbackResult<RollbackPointId> {
        let point = RollbackPoint::snapshot(component, description)?;
        let point_id = point.id;

        self.storage
            .put_json(StorageCategory::Backup, &point_id.to_string(), &point)
            .await?;

        let evicted = {
            let mut index = self.index.write().await;
            let points = index.entry(component.id.clone()).or_default();
            points.push(point_id);
            let mut evicted = Vec::new();
            while points.len() > self.config.max_rollback_points {
                evicted.push(points.remove(0));
            }
            evicted
        };

        for old in evicted {
            self.storage
                .delete(StorageCategory::Backup, &old.to_string())
                .await?;
            info!(point_id = %old, component_id = %component.id, "evicted oldest rollback point");
        }

        info!(
            point_id = %point_id,
            component_id = %component.id,
            version = %component.version,
            "rollback point created"
        );
        Ok(point_id)
    }

    /// Most recent point for a component, if any.
    pub async fn latest_point(&self, component_id: &ComponentId) -> Option<RollbackPointId> {
        self.index
            .read()
            .await
            .get(component_id)
            .and_then(|points| points.last().copied())
    }

    /// All point ids for a component, oldest first.
    pub async fn points_for(&self, component_id: &ComponentId) -> Vec<RollbackPointId> {
        self.index
            .read()
            .await
            .get(component_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Loads a point from storage.
    pub async fn get_point(&self, point_id: RollbackPointId) -> RollbackResult<RollbackPoint> {
        self.storage
            .get_json(StorageCategory::Backup, &point_id.to_string())
            .await?
            .ok_or(RollbackError::PointNotFound(point_id))
    }

    /// Deletes a point explicitly.
    pub async fn delete_point(&self, point_id: RollbackPointId) -> RollbackResult<bool> {
        let removed = self
            .storage
            .delete(StorageCategory::Backup, &point_id.to_string())
            .await?;
        if removed {
            let mut index = self.index.write().await;
            for points in index.values_mut() {
                points.retain(|p| *p != point_id);
            }
        }
        Ok(removed)
    }

    // ── Rollback ─────────────────────────────────────────────────

    /// Restores a component from a rollback point, defaulting to the most
    /// recent one. The operation record moves Pending→InProgress before any
    /// state is touched and ends Completed or Failed.
    pub async fn rollback(
        &self,
        component_id: &ComponentId,
        point_id: Option<RollbackPointId>,
        from_version: Option<String>,
    ) -> RollbackResult<DynamicComponent> {
        let point_id = match point_id {
            Some(id) => id,
            None => self
                .latest_point(component_id)
                .await
                .ok_or_else(|| RollbackError::NoPointForComponent(component_id.clone()))?,
        };

        let point = self.get_point(point_id).await?;
        let operation = RollbackOperation::begin(
            component_id.clone(),
            from_version,
            point.version.clone(),
            point_id,
        );
        let operation_id = operation.id;
        self.history.write().await.push(operation);
        self.set_status(operation_id, RollbackStatus::InProgress).await;

        match point.restore() {
            Ok(component) => {
                self.set_status(operation_id, RollbackStatus::Completed).await;
                info!(
                    component_id = %component_id,
                    point_id = %point_id,
                    to_version = %component.version,
                    "rollback completed"
                );
                Ok(component)
            }
            Err(e) => {
                self.set_status(operation_id, RollbackStatus::Failed).await;
                warn!(component_id = %component_id, point_id = %point_id, error = %e, "rollback failed");
                Err(e)
            }
        }
    }

    /// Rolls back several components with bounded parallelism. The result
    /// map always carries one entry per input id, failures included.
    pub async fn rollback_batch(
        &self,
        component_ids: &[ComponentId],
    ) -> HashMap<ComponentId, RollbackResult<DynamicComponent>> {
        stream::iter(component_ids.iter().cloned())
            .map(|id| async move {
                let result = self.rollback(&id, None, None).await;
                (id, result)
            })
            .buffer_unordered(self.config.batch_parallelism.max(1))
            .collect()
            .await
    }

    async fn set_status(&self, operation_id: patchbay_types::OperationId, status: RollbackStatus) {
        let mut history = self.history.write().await;
        if let Some(op) = history.iter_mut().find(|op| op.id == operation_id) {
            op.status = status;
        }
    }

    /// The append-only operation history, oldest first.
    pub async fn history(&self) -> Vec<RollbackOperation> {
        self.history.read().await.clone()
    }

    // ── Maintenance ──────────────────────────────────────────────

    /// Deletes points older than `retention_days`, independent of the
    /// per-component count limit. Returns the number removed.
    pub async fn cleanup_expired_backups(&self) -> RollbackResult<usize> {
        let cutoff = Utc::now() - Duration::days(self.config.retention_days);
        let point_ids: Vec<RollbackPointId> = {
            let index = self.index.read().await;
            index.values().flatten().copied().collect()
        };

        let mut removed = 0;
        for point_id in point_ids {
            let Ok(point) = self.get_point(point_id).await else {
                continue;
            };
            if point.created_at < cutoff {
                self.delete_point(point_id).await?;
                removed += 1;
            }
        }
        if removed > 0 {
            info!(removed, "expired rollback points cleaned up");
        }
        Ok(removed)
    }

    /// Recomputes every point's checksum, reporting corrupted ones without
    /// deleting them. An indexed point whose stored row can no longer be
    /// read counts as corrupted; the sweep always covers every point.
    pub async fn validate_backup_integrity(&self) -> RollbackResult<IntegrityReport> {
        let point_ids: Vec<RollbackPointId> = {
            let index = self.index.read().await;
            index.values().flatten().copied().collect()
        };

        let mut report = IntegrityReport {
            checked: 0,
            corrupted: Vec::new(),
        };
        for point_id in point_ids {
            report.checked += 1;
            match self.get_point(point_id).await {
                Ok(point) => {
                    if !point.verify_integrity() {
                        report.corrupted.push(point_id);
                    }
                }
                Err(RollbackError::PointNotFound(_)) => {
                    warn!(point_id = %point_id, "indexed rollback point is unreadable");
                    report.corrupted.push(point_id);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(report)
    }
}
