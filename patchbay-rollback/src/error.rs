//! Error types for the rollback layer.

use patchbay_types::{ComponentId, RollbackPointId};
use thiserror::Error;

/// Result type for rollback operations.
pub type RollbackResult<T> = Result<T, RollbackError>;

/// Errors that can occur during backup/restore. A failed rollback is fatal
/// for that call only — it never aborts the engine.
#[derive(Debug, Error)]
pub enum RollbackError {
    /// No rollback point exists for the component.
    #[error("no rollback point for component '{0}'")]
    NoPointForComponent(ComponentId),

    /// A specific rollback point is missing.
    #[error("rollback point not found: {0}")]
    PointNotFound(RollbackPointId),

    /// The snapshot checksum does not match its recomputed value.
    #[error("rollback point {0} is corrupted (checksum mismatch)")]
    CorruptedPoint(RollbackPointId),

    /// Snapshot (de)serialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Persistence failed.
    #[error("storage error: {0}")]
    Storage(#[from] patchbay_storage::StorageError),
}
