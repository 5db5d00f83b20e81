//! Idempotency claims for processed webhook notifications.

use sqlx::FromRow;

use courtbook_core::types::{DbId, Timestamp};

#[derive(Debug, Clone, FromRow)]
pub struct ProcessedWebhookEvent {
    pub id: DbId,
    pub provider: String,
    pub event_key: String,
    pub job_id: Option<DbId>,
    pub processed_at: Timestamp,
}
