//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! Downstream collaborators (notifications, reports) subscribe here instead
//! of being called by the operations that produce the events. Share it as
//! `Arc<EventBus>`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use courtbook_core::audit::AuditEvent;
use courtbook_core::types::DbId;

// ---------------------------------------------------------------------------
// PlatformEvent
// ---------------------------------------------------------------------------

/// A domain event that occurred inside one tenant (or the platform).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformEvent {
    /// Dot-separated event name, e.g. `"credit.allocated"`.
    pub event_type: String,

    /// Owning tenant; `None` for platform-level events.
    pub tenant_id: Option<DbId>,

    pub entity_type: Option<String>,
    pub entity_id: Option<String>,

    /// Free-form JSON payload carrying event-specific data.
    pub payload: serde_json::Value,

    pub timestamp: DateTime<Utc>,
}

impl PlatformEvent {
    pub fn new(event_type: impl Into<String>, tenant_id: Option<DbId>) -> Self {
        Self {
            event_type: event_type.into(),
            tenant_id,
            entity_type: None,
            entity_id: None,
            payload: serde_json::Value::Object(Default::default()),
            timestamp: Utc::now(),
        }
    }

    pub fn with_entity(mut self, entity_type: impl Into<String>, entity_id: impl ToString) -> Self {
        self.entity_type = Some(entity_type.into());
        self.entity_id = Some(entity_id.to_string());
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

impl From<&AuditEvent> for PlatformEvent {
    fn from(event: &AuditEvent) -> Self {
        Self {
            event_type: event.event_type.to_string(),
            tenant_id: event.tenant_id,
            entity_type: Some(event.entity.entity_type.to_string()),
            entity_id: event.entity.id.clone(),
            payload: event.metadata.clone(),
            timestamp: event.timestamp,
        }
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
///
/// When the buffer is full the oldest un-consumed messages are dropped and
/// slow receivers observe `RecvError::Lagged`.
pub struct EventBus {
    sender: broadcast::Sender<PlatformEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers. Dropped if there are none.
    pub fn publish(&self, event: PlatformEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlatformEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
