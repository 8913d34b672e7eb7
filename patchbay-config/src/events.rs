//! Change events emitted on every successful configuration write.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConfigChangeKind {
    Created,
    Updated,
    Deleted,
    Merged,
    /// Applied from a remote update package or a rollback.
    Restored,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigChangeEvent {
    pub kind: ConfigChangeKind,
    pub config_id: String,
    /// Set for single-key writes, `None` for whole-document changes.
    pub key: Option<String>,
    pub at: DateTime<Utc>,
}

impl ConfigChangeEvent {
    pub(crate) fn now(kind: ConfigChangeKind, config_id: &str, key: Option<&str>) -> Self {
        Self {
            kind,
            config_id: config_id.to_string(),
            key: key.map(str::to_string),
            at: Utc::now(),
        }
    }
}

/// A filtered view over the broadcast stream: only events for one
/// configuration id (and optionally one key) come through.
pub struct KeyEvents {
    receiver: broadcast::Receiver<ConfigChangeEvent>,
    config_id: String,
    key: Option<String>,
}

impl KeyEvents {
    pub(crate) fn new(
        receiver: broadcast::Receiver<ConfigChangeEvent>,
        config_id: String,
        key: Option<String>,
    ) -> Self {
        Self {
            receiver,
            config_id,
            key,
        }
    }

    /// Next matching event. `None` once the manager is dropped. Whole-document
    /// events (key `None`) always match a key-scoped subscription, since they
    /// may have touched that key.
    pub async fn recv(&mut self) -> Option<ConfigChangeEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => {
                    if event.config_id != self.config_id {
                        continue;
                    }
                    let matches = match (&self.key, &event.key) {
                        (None, _) | (_, None) => true,
                        (Some(wanted), Some(changed)) => wanted == changed,
                    };
                    if matches {
                        return Some(event);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
