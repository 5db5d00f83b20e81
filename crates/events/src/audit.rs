//! [`AuditSink`] that persists to `audit_logs` and fans out on the bus.

use std::sync::Arc;

use sqlx::PgPool;

use courtbook_core::audit::{AuditError, AuditEvent, AuditSink};
use courtbook_core::tenant::{Scope, SystemTask};
use courtbook_db::models::audit::CreateAuditLog;
use courtbook_db::repositories::AuditLogRepo;

use crate::bus::{EventBus, PlatformEvent};

pub struct AuditPublisher {
    pool: PgPool,
    bus: Arc<EventBus>,
}

impl AuditPublisher {
    pub fn new(pool: PgPool, bus: Arc<EventBus>) -> Self {
        Self { pool, bus }
    }
}

/// Scope an audit record is written in: the tenant of the mutation it
/// describes, or the system audit scope for platform events.
pub fn audit_scope(event: &AuditEvent) -> Scope {
    match event.tenant_id {
        Some(tenant_id) => Scope::Tenant(tenant_id),
        None => Scope::System(SystemTask::SystemAudit),
    }
}

#[async_trait::async_trait]
impl AuditSink for AuditPublisher {
    async fn record(&self, event: AuditEvent) -> Result<(), AuditError> {
        let row = AuditLogRepo::insert(
            &self.pool,
            audit_scope(&event),
            CreateAuditLog::from_event(&event),
        )
        .await
        .map_err(|e| AuditError(e.to_string()))?;

        tracing::debug!(
            audit_id = row.id,
            event_type = event.event_type,
            tenant_id = ?event.tenant_id,
            "Audit event recorded",
        );

        self.bus.publish(PlatformEvent::from(&event));
        Ok(())
    }
}
