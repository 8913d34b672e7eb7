//! Error types for the configuration layer.

use thiserror::Error;

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    /// No configuration registered under the given id.
    #[error("configuration not found: {0}")]
    NotFound(String),

    /// Validation produced at least one error.
    #[error("configuration '{id}' failed validation: {}", errors.join("; "))]
    Invalid { id: String, errors: Vec<String> },

    /// (De)serialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Persistence failed.
    #[error("storage error: {0}")]
    Storage(#[from] patchbay_storage::StorageError),
}
