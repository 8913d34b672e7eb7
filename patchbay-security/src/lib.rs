//! Component security validation for Patchbay.
//!
//! - `SecurityPolicy` — what to enforce, loadable from TOML
//! - `SecurityValidator` — the fixed-order, accumulating check sequence
//! - `QuarantineRegistry` — persisted block-list of component ids
//! - violation/level model shared with the lifecycle engine

mod error;
mod policy;
mod quarantine;
mod validator;
mod violation;

pub use error::{SecurityError, SecurityResult};
pub use policy::SecurityPolicy;
pub use quarantine::QuarantineRegistry;
pub use validator::SecurityValidator;
pub use violation::{
    SecurityLevel, SecurityValidationResult, SecurityViolation, ViolationKind, ViolationSeverity,
};
