//! Inbound webhook domain: authenticity, notification shape, queue contract
//! and retry policy.

pub mod notification;
pub mod signature;

use std::sync::Mutex;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::{DbId, Timestamp};

pub use notification::{validate_provider, NotificationError, WebhookNotification};
pub use signature::{compute_signature, verify_signature, SignatureError, REPLAY_WINDOW_SECS};

// ---------------------------------------------------------------------------
// Job status constants
// ---------------------------------------------------------------------------

/// Lifecycle states of a queued webhook job.
pub mod job_status {
    pub const PENDING: &str = "pending";
    pub const PROCESSING: &str = "processing";
    pub const COMPLETED: &str = "completed";
    pub const FAILED: &str = "failed";
}

/// Default number of processing attempts per job.
pub const DEFAULT_MAX_ATTEMPTS: i32 = 3;

/// Upper bound on a single backoff delay.
pub const MAX_BACKOFF_SECS: i64 = 3600;

// ---------------------------------------------------------------------------
// Retry policy
// ---------------------------------------------------------------------------

/// Exponential backoff between attempts of the same job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: i32,
    pub base_delay_secs: i64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay_secs: 2,
        }
    }
}

impl RetryPolicy {
    /// Delay before the retry that follows failed attempt number `attempt`
    /// (1-based): `base * 2^(attempt-1)`, capped at [`MAX_BACKOFF_SECS`].
    pub fn delay_for(&self, attempt: i32) -> i64 {
        let exponent = attempt.saturating_sub(1).clamp(0, 30) as u32;
        self.base_delay_secs
            .saturating_mul(2i64.saturating_pow(exponent))
            .min(MAX_BACKOFF_SECS)
    }

    /// Whether a job that has used `attempts` attempts may run again.
    pub fn can_retry(&self, attempts: i32) -> bool {
        attempts < self.max_attempts
    }
}

// ---------------------------------------------------------------------------
// Queue contract
// ---------------------------------------------------------------------------

/// What the gateway enqueues and the worker consumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookJobPayload {
    pub provider: String,
    pub raw_payload: serde_json::Value,
    /// Correlation id of the inbound HTTP request.
    pub request_id: String,
    pub received_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewWebhookJob {
    pub payload: WebhookJobPayload,
    pub max_attempts: i32,
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("queue backend unavailable: {0}")]
    Unavailable(String),
}

/// Durable queue the gateway hands authenticated notifications to.
#[async_trait::async_trait]
pub trait WebhookQueue: Send + Sync {
    /// Persist a job and return its id.
    async fn enqueue(&self, job: NewWebhookJob) -> Result<DbId, QueueError>;
}

/// In-memory queue for tests and local runs.
#[derive(Debug, Default)]
pub struct MemoryWebhookQueue {
    jobs: Mutex<Vec<NewWebhookJob>>,
    fail: bool,
    delay: Option<Duration>,
}

impl MemoryWebhookQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// A queue whose every enqueue fails.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// A queue that takes `delay` to accept each job.
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn jobs(&self) -> Vec<NewWebhookJob> {
        self.jobs
            .lock()
            .map(|jobs| jobs.clone())
            .unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl WebhookQueue for MemoryWebhookQueue {
    async fn enqueue(&self, job: NewWebhookJob) -> Result<DbId, QueueError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(QueueError::Unavailable("memory queue configured to fail".into()));
        }
        let mut jobs = self
            .jobs
            .lock()
            .map_err(|_| QueueError::Unavailable("memory queue poisoned".into()))?;
        jobs.push(job);
        Ok(jobs.len() as DbId)
    }
}
