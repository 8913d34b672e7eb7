//! The component registry: one `ComponentInfo` per id, plus the two
//! observation channels — a broadcast of individual transitions and a
//! `watch` carrying full snapshots.

use chrono::{DateTime, Utc};
use patchbay_types::{ComponentId, ComponentInfo, ComponentState, DynamicComponent};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::{broadcast, watch, RwLock};

const EVENT_CHANNEL_CAPACITY: usize = 128;

/// One lifecycle transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateChangeEvent {
    pub component_id: ComponentId,
    pub from: ComponentState,
    pub to: ComponentState,
    pub at: DateTime<Utc>,
}

pub struct ComponentRegistry {
    entries: RwLock<HashMap<ComponentId, ComponentInfo>>,
    events: broadcast::Sender<StateChangeEvent>,
    snapshots: watch::Sender<Vec<ComponentInfo>>,
}

impl ComponentRegistry {
    #[must_use]
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (snapshots, _) = watch::channel(Vec::new());
        Self {
            entries: RwLock::new(HashMap::new()),
            events,
            snapshots,
        }
    }

    pub async fn get(&self, id: &ComponentId) -> Option<ComponentInfo> {
        self.entries.read().await.get(id).cloned()
    }

    pub async fn state_of(&self, id: &ComponentId) -> Option<ComponentState> {
        self.entries.read().await.get(id).map(|info| info.state)
    }

    pub async fn all(&self) -> Vec<ComponentInfo> {
        let mut all: Vec<_> = self.entries.read().await.values().cloned().collect();
        all.sort_by(|a, b| a.component.id.cmp(&b.component.id));
        all
    }

    /// Inserts a fresh entry, emitting an `Unloaded → state` event.
    pub async fn register(&self, component: DynamicComponent, state: ComponentState) {
        let id = component.id.clone();
        {
            let mut entries = self.entries.write().await;
            entries.insert(id.clone(), ComponentInfo::new(component, state));
        }
        self.emit(id, ComponentState::Unloaded, state).await;
    }

    /// Moves an existing entry to a new state, one event per call.
    /// No-op for unknown ids.
    pub async fn transition(&self, id: &ComponentId, to: ComponentState) {
        let from = {
            let mut entries = self.entries.write().await;
            let Some(info) = entries.get_mut(id) else {
                return;
            };
            let from = info.state;
            info.transition(to);
            from
        };
        self.emit(id.clone(), from, to).await;
    }

    /// Moves an entry to `Error` with a message.
    pub async fn fail(&self, id: &ComponentId, message: &str) {
        let from = {
            let mut entries = self.entries.write().await;
            let Some(info) = entries.get_mut(id) else {
                return;
            };
            let from = info.state;
            info.fail(message);
            from
        };
        self.emit(id.clone(), from, ComponentState::Error).await;
    }

    /// Replaces an entry's component payload, keeping lifecycle bookkeeping.
    pub async fn replace_component(&self, id: &ComponentId, component: DynamicComponent) {
        let mut entries = self.entries.write().await;
        if let Some(info) = entries.get_mut(id) {
            info.component = component;
            info.last_update = Utc::now();
        }
    }

    /// Removes an entry, emitting a `→ Unloaded` event. Returns the removed
    /// entry, if any.
    pub async fn remove(&self, id: &ComponentId) -> Option<ComponentInfo> {
        let removed = self.entries.write().await.remove(id);
        if let Some(info) = &removed {
            self.emit(id.clone(), info.state, ComponentState::Unloaded)
                .await;
        }
        removed
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StateChangeEvent> {
        self.events.subscribe()
    }

    pub fn watch(&self) -> watch::Receiver<Vec<ComponentInfo>> {
        self.snapshots.subscribe()
    }

    async fn emit(&self, component_id: ComponentId, from: ComponentState, to: ComponentState) {
        let _ = self.events.send(StateChangeEvent {
            component_id,
            from,
            to,
            at: Utc::now(),
        });
        let _ = self.snapshots.send(self.all().await);
    }
}

impl Default for ComponentRegistry {
    fn default() -> Self {
        Self::new()
    }
}
