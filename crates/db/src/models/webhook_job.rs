//! Webhook job queue rows.

use serde::Serialize;
use sqlx::FromRow;

use courtbook_core::types::{DbId, Timestamp};
use courtbook_core::webhooks::WebhookJobPayload;

/// A row from the tenant-free `webhook_jobs` table.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookJob {
    pub id: DbId,
    pub provider: String,
    pub payload: serde_json::Value,
    pub request_id: String,
    pub status: String,
    pub attempts: i32,
    pub max_attempts: i32,
    pub next_run_at: Timestamp,
    pub locked_at: Option<Timestamp>,
    pub last_error: Option<String>,
    pub received_at: Timestamp,
    pub completed_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl WebhookJob {
    /// The queue contract view of this job.
    pub fn to_payload(&self) -> WebhookJobPayload {
        WebhookJobPayload {
            provider: self.provider.clone(),
            raw_payload: self.payload.clone(),
            request_id: self.request_id.clone(),
            received_at: self.received_at,
        }
    }

    /// Ownership token for the attempt this row was claimed for.
    pub fn lease(&self) -> JobLease {
        JobLease {
            id: self.id,
            attempts: self.attempts,
            locked_at: self.locked_at,
        }
    }
}

/// Identifies one claimed attempt of a job.
///
/// Every claim bumps `attempts` and stamps `locked_at`, so a worker whose
/// lock expired and was re-claimed elsewhere no longer holds a matching
/// lease.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobLease {
    pub id: DbId,
    pub attempts: i32,
    pub locked_at: Option<Timestamp>,
}
