//! The Patchbay lifecycle engine.
//!
//! Ties the security validator, rollback manager, storage manager,
//! configuration manager, and network client together behind the
//! load/unload/update/rollback API, and exposes the state streams external
//! collaborators consume.

mod engine;
mod error;
mod locks;
mod registry;

pub use engine::{DynamicEngine, EngineBuilder, EngineConfig};
pub use error::{EngineError, EngineResult};
pub use registry::{ComponentRegistry, StateChangeEvent};
