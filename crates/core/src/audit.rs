//! Audit trail vocabulary, event envelope, and sink interface.
//!
//! Every state-changing operation emits an [`AuditEvent`] to an
//! [`AuditSink`]. The event carries the tenant of the mutation it describes
//! so the record is written in the same scope. Persistence lives in the db
//! crate; this module stays free of storage concerns.

use std::sync::Mutex;

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::tenant::TenantContext;
use crate::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Event type constants
// ---------------------------------------------------------------------------

/// Known event types for audit entries.
pub mod event_types {
    pub const CREDIT_GRANTED: &str = "credit.granted";
    pub const CREDIT_ALLOCATED: &str = "credit.allocated";
    pub const CREDIT_DEACTIVATED: &str = "credit.deactivated";
    pub const CREDIT_EXPIRED: &str = "credit.expired";
    pub const PAYMENT_STATUS_CHANGED: &str = "payment.status_changed";
    pub const WEBHOOK_REJECTED: &str = "webhook.rejected";
    pub const WEBHOOK_JOB_REPLAYED: &str = "webhook.job_replayed";
    pub const TENANT_CREATED: &str = "tenant.created";
}

// ---------------------------------------------------------------------------
// Category constants
// ---------------------------------------------------------------------------

/// Known audit categories, used for filtering and retention grouping.
pub mod categories {
    pub const FINANCIAL: &str = "financial";
    pub const INTEGRATION: &str = "integration";
    pub const SECURITY: &str = "security";
    pub const ADMINISTRATION: &str = "administration";
}

/// Map an event type to its audit category.
///
/// Unknown event types default to `"administration"`.
pub fn event_category(event_type: &str) -> &'static str {
    match event_type {
        event_types::CREDIT_GRANTED
        | event_types::CREDIT_ALLOCATED
        | event_types::CREDIT_DEACTIVATED
        | event_types::CREDIT_EXPIRED
        | event_types::PAYMENT_STATUS_CHANGED => categories::FINANCIAL,
        event_types::WEBHOOK_JOB_REPLAYED => categories::INTEGRATION,
        event_types::WEBHOOK_REJECTED => categories::SECURITY,
        _ => categories::ADMINISTRATION,
    }
}

// ---------------------------------------------------------------------------
// Event envelope
// ---------------------------------------------------------------------------

/// Who performed an audited action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Actor {
    /// `"user"`, `"system"`, or `"webhook"`.
    #[serde(rename = "type")]
    pub actor_type: &'static str,
    pub id: Option<String>,
}

impl Actor {
    pub fn user(user_id: Option<DbId>) -> Self {
        Self {
            actor_type: "user",
            id: user_id.map(|id| id.to_string()),
        }
    }

    pub fn system(task: &str) -> Self {
        Self {
            actor_type: "system",
            id: Some(task.to_string()),
        }
    }

    pub fn webhook(provider: &str) -> Self {
        Self {
            actor_type: "webhook",
            id: Some(provider.to_string()),
        }
    }
}

/// The entity an audited action touched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityRef {
    #[serde(rename = "type")]
    pub entity_type: &'static str,
    pub id: Option<String>,
}

/// One audit record as emitted by a domain operation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEvent {
    pub category: &'static str,
    pub event_type: &'static str,
    pub tenant_id: Option<DbId>,
    pub actor: Actor,
    pub entity: EntityRef,
    pub metadata: serde_json::Value,
    pub before: Option<serde_json::Value>,
    pub after: Option<serde_json::Value>,
    pub timestamp: Timestamp,
}

impl AuditEvent {
    /// Start an event; the category is derived from `event_type`.
    pub fn new(event_type: &'static str, tenant_id: Option<DbId>, actor: Actor) -> Self {
        Self {
            category: event_category(event_type),
            event_type,
            tenant_id,
            actor,
            entity: EntityRef {
                entity_type: "none",
                id: None,
            },
            metadata: serde_json::Value::Object(Default::default()),
            before: None,
            after: None,
            timestamp: chrono::Utc::now(),
        }
    }

    /// Start an event attributed to the caller of `ctx`.
    pub fn from_context(event_type: &'static str, ctx: &TenantContext) -> Self {
        Self::new(event_type, ctx.tenant_id(), Actor::user(ctx.user_id()))
    }

    pub fn with_entity(mut self, entity_type: &'static str, id: impl ToString) -> Self {
        self.entity = EntityRef {
            entity_type,
            id: Some(id.to_string()),
        };
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_change(
        mut self,
        before: Option<serde_json::Value>,
        after: Option<serde_json::Value>,
    ) -> Self {
        self.before = before;
        self.after = after;
        self
    }
}

// ---------------------------------------------------------------------------
// Sink
// ---------------------------------------------------------------------------

/// Error returned by an [`AuditSink`] that could not record an event.
#[derive(Debug, thiserror::Error)]
#[error("Audit sink failure: {0}")]
pub struct AuditError(pub String);

/// Destination for audit events.
///
/// Held as `Arc<dyn AuditSink>` by services, so the trait is object-safe.
#[async_trait::async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, event: AuditEvent) -> Result<(), AuditError>;
}

/// Record an event, logging instead of propagating sink failures.
///
/// The mutation an event describes has already been committed when this is
/// called, so a sink outage must not turn a successful operation into an
/// error for the caller.
pub async fn emit(sink: &dyn AuditSink, event: AuditEvent) {
    let event_type = event.event_type;
    let tenant_id = event.tenant_id;
    if let Err(e) = sink.record(event).await {
        tracing::error!(error = %e, event_type, ?tenant_id, "Failed to record audit event");
    }
}

/// Sink that keeps events in memory. Used by tests and local tooling.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every event recorded so far, in emission order.
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl AuditSink for MemoryAuditSink {
    async fn record(&self, event: AuditEvent) -> Result<(), AuditError> {
        self.events
            .lock()
            .map_err(|_| AuditError("memory sink poisoned".into()))?
            .push(event);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Integrity hash computation
// ---------------------------------------------------------------------------

/// Known seed value for the first entry in the hash chain.
const CHAIN_SEED: &str = "COURTBOOK_AUDIT_CHAIN_V1";

/// Compute the SHA-256 integrity hash for an audit record.
///
/// `prev_hash` is the hash of the previous record, or `None` for the first
/// record in the chain. `entry_data` is the canonical JSON of the record.
pub fn compute_integrity_hash(prev_hash: Option<&str>, entry_data: &str) -> String {
    let prev = prev_hash.unwrap_or(CHAIN_SEED);
    let digest = Sha256::digest(format!("{prev}|{entry_data}").as_bytes());
    format!("{digest:x}")
}

// ---------------------------------------------------------------------------
// Sensitive field redaction
// ---------------------------------------------------------------------------

/// Metadata keys whose values never reach the audit trail.
pub const SENSITIVE_FIELDS: &[&str] = &[
    "password",
    "token",
    "secret",
    "signature",
    "api_key",
    "authorization",
    "card",
];

/// Recursively replace values of sensitive keys with `"[REDACTED]"`.
pub fn redact_sensitive_fields(value: &serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => serde_json::Value::Object(
            map.iter()
                .map(|(key, val)| {
                    let lower = key.to_lowercase();
                    let redacted = if SENSITIVE_FIELDS.iter().any(|f| lower.contains(f)) {
                        serde_json::Value::String("[REDACTED]".into())
                    } else {
                        redact_sensitive_fields(val)
                    };
                    (key.clone(), redacted)
                })
                .collect(),
        ),
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.iter().map(redact_sensitive_fields).collect())
        }
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn credit_events_are_financial() {
        assert_eq!(event_category(event_types::CREDIT_ALLOCATED), categories::FINANCIAL);
        assert_eq!(event_category(event_types::CREDIT_EXPIRED), categories::FINANCIAL);
    }

    #[test]
    fn rejected_webhooks_are_security_events() {
        assert_eq!(event_category(event_types::WEBHOOK_REJECTED), categories::SECURITY);
    }

    #[test]
    fn unknown_event_defaults_to_administration() {
        assert_eq!(event_category("something.else"), categories::ADMINISTRATION);
    }

    #[test]
    fn from_context_copies_tenant_and_user() {
        let ctx = TenantContext::for_tenant(5, Some(11));
        let event = AuditEvent::from_context(event_types::CREDIT_GRANTED, &ctx)
            .with_entity("credit", 42);
        assert_eq!(event.tenant_id, Some(5));
        assert_eq!(event.actor, Actor::user(Some(11)));
        assert_eq!(event.entity.id.as_deref(), Some("42"));
        assert_eq!(event.category, categories::FINANCIAL);
    }

    #[test]
    fn chained_hashes_differ_and_are_stable() {
        let first = compute_integrity_hash(None, "a");
        let second = compute_integrity_hash(Some(&first), "b");
        assert_eq!(first.len(), 64);
        assert_ne!(first, second);
        assert_eq!(first, compute_integrity_hash(None, "a"));
    }

    #[test]
    fn redaction_is_recursive() {
        let input = json!({
            "amount": 100,
            "x-signature": "ts=1,v1=abc",
            "nested": { "api_key": "k", "keep": true },
            "list": [{ "token": "t" }]
        });
        let out = redact_sensitive_fields(&input);
        assert_eq!(out["amount"], 100);
        assert_eq!(out["x-signature"], "[REDACTED]");
        assert_eq!(out["nested"]["api_key"], "[REDACTED]");
        assert_eq!(out["nested"]["keep"], true);
        assert_eq!(out["list"][0]["token"], "[REDACTED]");
    }

    #[tokio::test]
    async fn memory_sink_records_in_order() {
        let sink = MemoryAuditSink::new();
        emit(&sink, AuditEvent::new(event_types::CREDIT_GRANTED, Some(1), Actor::system("t"))).await;
        emit(&sink, AuditEvent::new(event_types::CREDIT_EXPIRED, None, Actor::system("t"))).await;
        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, event_types::CREDIT_GRANTED);
        assert_eq!(events[1].event_type, event_types::CREDIT_EXPIRED);
    }
}
