//! Audit log row and query DTOs.
//!
//! Audit logs are append-only: no `updated_at`, no update or delete paths.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use courtbook_core::audit::{redact_sensitive_fields, AuditEvent};
use courtbook_core::types::{DbId, Timestamp};

use crate::scoping::{BindValue, InsertRow, ScopedEntity, TENANT_COLUMN};

/// A single audit log entry. `tenant_id` is `None` for system events.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLog {
    pub id: DbId,
    pub tenant_id: Option<DbId>,
    pub category: String,
    pub event_type: String,
    pub actor_type: String,
    pub actor_id: Option<String>,
    pub entity_type: String,
    pub entity_id: Option<String>,
    pub metadata: serde_json::Value,
    pub before_state: Option<serde_json::Value>,
    pub after_state: Option<serde_json::Value>,
    pub integrity_hash: Option<String>,
    pub created_at: Timestamp,
}

/// Insert DTO, built from an [`AuditEvent`].
#[derive(Debug, Clone)]
pub struct CreateAuditLog {
    pub tenant_id: Option<DbId>,
    pub category: String,
    pub event_type: String,
    pub actor_type: String,
    pub actor_id: Option<String>,
    pub entity_type: String,
    pub entity_id: Option<String>,
    pub metadata: serde_json::Value,
    pub before_state: Option<serde_json::Value>,
    pub after_state: Option<serde_json::Value>,
    pub integrity_hash: Option<String>,
}

impl CreateAuditLog {
    /// Convert an event, redacting sensitive keys in every JSON field.
    pub fn from_event(event: &AuditEvent) -> Self {
        Self {
            tenant_id: event.tenant_id,
            category: event.category.to_string(),
            event_type: event.event_type.to_string(),
            actor_type: event.actor.actor_type.to_string(),
            actor_id: event.actor.id.clone(),
            entity_type: event.entity.entity_type.to_string(),
            entity_id: event.entity.id.clone(),
            metadata: redact_sensitive_fields(&event.metadata),
            before_state: event.before.as_ref().map(redact_sensitive_fields),
            after_state: event.after.as_ref().map(redact_sensitive_fields),
            integrity_hash: None,
        }
    }

    /// Canonical JSON used as hash-chain input.
    pub fn canonical_json(&self) -> String {
        serde_json::json!({
            "tenantId": self.tenant_id,
            "category": self.category,
            "eventType": self.event_type,
            "actor": { "type": self.actor_type, "id": self.actor_id },
            "entity": { "type": self.entity_type, "id": self.entity_id },
            "metadata": self.metadata,
            "before": self.before_state,
            "after": self.after_state,
        })
        .to_string()
    }
}

/// Rebuild the insert payload of a stored row, for re-hashing.
impl From<&AuditLog> for CreateAuditLog {
    fn from(log: &AuditLog) -> Self {
        Self {
            tenant_id: log.tenant_id,
            category: log.category.clone(),
            event_type: log.event_type.clone(),
            actor_type: log.actor_type.clone(),
            actor_id: log.actor_id.clone(),
            entity_type: log.entity_type.clone(),
            entity_id: log.entity_id.clone(),
            metadata: log.metadata.clone(),
            before_state: log.before_state.clone(),
            after_state: log.after_state.clone(),
            integrity_hash: None,
        }
    }
}

/// Filter parameters for querying audit logs.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditQuery {
    pub category: Option<String>,
    pub event_type: Option<String>,
    pub entity_type: Option<String>,
    pub entity_id: Option<String>,
    pub from: Option<Timestamp>,
    pub to: Option<Timestamp>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Paginated response for audit log queries.
#[derive(Debug, Clone, Serialize)]
pub struct AuditLogPage {
    pub items: Vec<AuditLog>,
    pub total: i64,
}

impl ScopedEntity for AuditLog {
    const TABLE: &'static str = "audit_logs";
    const ENTITY: &'static str = "AuditLog";
    const COLUMNS: &'static str = "\
        id, tenant_id, category, event_type, actor_type, actor_id, entity_type, \
        entity_id, metadata, before_state, after_state, integrity_hash, created_at";

    type New = CreateAuditLog;
}

impl InsertRow for CreateAuditLog {
    fn tenant_id(&self) -> Option<DbId> {
        self.tenant_id
    }

    fn values(&self) -> Vec<(&'static str, BindValue)> {
        vec![
            (TENANT_COLUMN, self.tenant_id.into()),
            ("category", self.category.clone().into()),
            ("event_type", self.event_type.clone().into()),
            ("actor_type", self.actor_type.clone().into()),
            ("actor_id", self.actor_id.clone().into()),
            ("entity_type", self.entity_type.clone().into()),
            ("entity_id", self.entity_id.clone().into()),
            ("metadata", self.metadata.clone().into()),
            ("before_state", self.before_state.clone().into()),
            ("after_state", self.after_state.clone().into()),
            ("integrity_hash", self.integrity_hash.clone().into()),
        ]
    }
}
