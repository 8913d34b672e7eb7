//! Component lifecycle states and registry entries.

use crate::component::DynamicComponent;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a registered component.
///
/// Exactly one state per component id at any instant, owned exclusively
/// by the lifecycle engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComponentState {
    Unloaded,
    Loading,
    Loaded,
    Active,
    Updating,
    Error,
}

impl ComponentState {
    /// Whether a component in this state counts as holding the active slot
    /// for its id (a second load of the same id must be rejected).
    #[must_use]
    pub fn is_resident(&self) -> bool {
        matches!(self, Self::Loaded | Self::Active | Self::Updating)
    }
}

/// Registry entry: a component plus its lifecycle bookkeeping.
/// Created on load, mutated on every transition, destroyed on unregister.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentInfo {
    pub component: DynamicComponent,
    pub state: ComponentState,
    pub load_time: DateTime<Utc>,
    pub last_update: DateTime<Utc>,
    pub error_message: Option<String>,
}

impl ComponentInfo {
    /// Creates a fresh registry entry in the given state.
    pub fn new(component: DynamicComponent, state: ComponentState) -> Self {
        let now = Utc::now();
        Self {
            component,
            state,
            load_time: now,
            last_update: now,
            error_message: None,
        }
    }

    /// Applies a state transition, updating `last_update`.
    pub fn transition(&mut self, state: ComponentState) {
        self.state = state;
        self.last_update = Utc::now();
        if state != ComponentState::Error {
            self.error_message = None;
        }
    }

    /// Applies a transition to `Error` with a message.
    pub fn fail(&mut self, message: impl Into<String>) {
        self.state = ComponentState::Error;
        self.last_update = Utc::now();
        self.error_message = Some(message.into());
    }
}
