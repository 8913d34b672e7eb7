//! Core type definitions for Patchbay.
//!
//! This crate defines the fundamental, subsystem-agnostic types used
//! throughout the engine:
//! - Component and rollback identifiers
//! - The `DynamicComponent` descriptor and its wire shape
//! - Component lifecycle states and registry entries
//!
//! Subsystem-specific types (rollback points, violations, configuration
//! values, update packages) belong in their respective crates, not here.

mod component;
mod ids;
mod state;

pub use component::{ComponentType, DynamicComponent};
pub use ids::{ComponentId, OperationId, RollbackPointId};
pub use state::{ComponentInfo, ComponentState};
