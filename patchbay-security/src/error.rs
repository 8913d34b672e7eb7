//! Error types for the security layer.

use thiserror::Error;

/// Result type for security operations.
pub type SecurityResult<T> = Result<T, SecurityError>;

/// Errors that can occur in security operations. Validation findings are
/// not errors — they come back inside `SecurityValidationResult`.
#[derive(Debug, Error)]
pub enum SecurityError {
    /// Quarantine persistence failed.
    #[error("storage error: {0}")]
    Storage(#[from] patchbay_storage::StorageError),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
