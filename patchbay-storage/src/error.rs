//! Error types for the storage layer.

use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur in storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Key not found.
    #[error("key not found: {0}")]
    NotFound(String),

    /// IO error (compression).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Encryption/decryption error.
    #[error("encryption error: {0}")]
    Encryption(#[from] patchbay_crypto::CryptoError),

    /// Invalid data (corrupt blob, bad backup entry).
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Background task failed to complete.
    #[error("task join error: {0}")]
    TaskJoin(String),
}
