//! Snapshot-based backup and rollback for Patchbay components.
//!
//! - `RollbackPoint` — immutable, checksummed snapshot of a component
//! - `RollbackOperation` — append-only history of restore attempts
//! - `RollbackManager` — creation, retention, restore, batch rollback,
//!   integrity sweeps

mod error;
mod manager;
mod point;

pub use error::{RollbackError, RollbackResult};
pub use manager::{IntegrityReport, RollbackConfig, RollbackManager};
pub use point::{RollbackOperation, RollbackPoint, RollbackStatus};
