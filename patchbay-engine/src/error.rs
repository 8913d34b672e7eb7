//! Error taxonomy for the lifecycle engine.
//!
//! Every mutating operation returns one of these; nothing panics across the
//! public boundary. Validation and dependency failures are local and never
//! retried. Network errors surface only after the client exhausts its retries.
//! Rollback failures are fatal for that call, not for the engine.

use patchbay_types::ComponentId;
use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Security validation found a critical violation.
    #[error("validation failed for '{component_id}': {reason}")]
    Validation {
        component_id: ComponentId,
        reason: String,
    },

    /// Dependencies are missing or circular; the registry was not touched.
    #[error("dependency error for '{component_id}': {reason}")]
    Dependency {
        component_id: ComponentId,
        reason: String,
    },

    /// The component already holds the active slot for its id.
    #[error("component '{0}' is already loaded")]
    AlreadyLoaded(ComponentId),

    /// No registration exists for the id.
    #[error("component '{0}' is not registered")]
    NotFound(ComponentId),

    /// The network client gave up after its retries.
    #[error(transparent)]
    Network(#[from] patchbay_net::NetworkError),

    #[error(transparent)]
    Storage(#[from] patchbay_storage::StorageError),

    #[error(transparent)]
    Rollback(#[from] patchbay_rollback::RollbackError),

    #[error(transparent)]
    Config(#[from] patchbay_config::ConfigError),

    #[error(transparent)]
    Security(#[from] patchbay_security::SecurityError),
}
