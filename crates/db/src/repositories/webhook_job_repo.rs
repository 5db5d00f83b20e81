//! Repository for the durable webhook job queue (`webhook_jobs`).
//!
//! Jobs move `pending -> processing -> completed`, or back to `pending`
//! with a later `next_run_at` after a failed attempt, or to `failed` once
//! their attempts are used up. Transitions out of `processing` are fenced
//! by the [`JobLease`] of the claim that started the attempt.

use sqlx::PgPool;

use courtbook_core::types::DbId;
use courtbook_core::webhooks::{job_status, NewWebhookJob, QueueError, WebhookQueue};

use crate::models::webhook_job::{JobLease, WebhookJob};

const COLUMNS: &str = "\
    id, provider, payload, request_id, status, attempts, max_attempts, \
    next_run_at, locked_at, last_error, received_at, completed_at, created_at, updated_at";

pub struct WebhookJobRepo;

impl WebhookJobRepo {
    pub async fn enqueue(pool: &PgPool, job: &NewWebhookJob) -> Result<WebhookJob, sqlx::Error> {
        let query = format!(
            "INSERT INTO webhook_jobs (provider, payload, request_id, max_attempts, received_at) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, WebhookJob>(&query)
            .bind(&job.payload.provider)
            .bind(&job.payload.raw_payload)
            .bind(&job.payload.request_id)
            .bind(job.max_attempts)
            .bind(job.payload.received_at)
            .fetch_one(pool)
            .await
    }

    /// Atomically claim up to `limit` due jobs and count the attempt.
    ///
    /// Uses `FOR UPDATE SKIP LOCKED` so concurrent workers never claim the
    /// same job.
    pub async fn claim_batch(pool: &PgPool, limit: i64) -> Result<Vec<WebhookJob>, sqlx::Error> {
        let query = format!(
            "UPDATE webhook_jobs \
             SET status = $1, locked_at = NOW(), attempts = attempts + 1, updated_at = NOW() \
             WHERE id IN ( \
                 SELECT id FROM webhook_jobs \
                 WHERE status = $2 AND next_run_at <= NOW() \
                 ORDER BY next_run_at ASC, id ASC \
                 LIMIT $3 \
                 FOR UPDATE SKIP LOCKED \
             ) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, WebhookJob>(&query)
            .bind(job_status::PROCESSING)
            .bind(job_status::PENDING)
            .bind(limit)
            .fetch_all(pool)
            .await
    }

    /// Mark the leased attempt as done.
    ///
    /// Returns `false` when the lease is no longer held, in which case the
    /// row is left untouched.
    pub async fn complete(pool: &PgPool, lease: &JobLease) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE webhook_jobs \
             SET status = $4, completed_at = NOW(), locked_at = NULL, last_error = NULL, \
                 updated_at = NOW() \
             WHERE id = $1 AND attempts = $2 AND locked_at IS NOT DISTINCT FROM $3 \
               AND status = $5",
        )
        .bind(lease.id)
        .bind(lease.attempts)
        .bind(lease.locked_at)
        .bind(job_status::COMPLETED)
        .bind(job_status::PROCESSING)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Return the leased job to `pending`, due again after `delay_secs`.
    pub async fn reschedule(
        pool: &PgPool,
        lease: &JobLease,
        error: &str,
        delay_secs: i64,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE webhook_jobs \
             SET status = $4, last_error = $6, locked_at = NULL, \
                 next_run_at = NOW() + make_interval(secs => $7), updated_at = NOW() \
             WHERE id = $1 AND attempts = $2 AND locked_at IS NOT DISTINCT FROM $3 \
               AND status = $5",
        )
        .bind(lease.id)
        .bind(lease.attempts)
        .bind(lease.locked_at)
        .bind(job_status::PENDING)
        .bind(job_status::PROCESSING)
        .bind(error)
        .bind(delay_secs as f64)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Move the leased job to the terminal `failed` state for manual
    /// inspection.
    pub async fn mark_failed(
        pool: &PgPool,
        lease: &JobLease,
        error: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE webhook_jobs \
             SET status = $4, last_error = $6, locked_at = NULL, updated_at = NOW() \
             WHERE id = $1 AND attempts = $2 AND locked_at IS NOT DISTINCT FROM $3 \
               AND status = $5",
        )
        .bind(lease.id)
        .bind(lease.attempts)
        .bind(lease.locked_at)
        .bind(job_status::FAILED)
        .bind(job_status::PROCESSING)
        .bind(error)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Release jobs whose worker disappeared mid-attempt.
    ///
    /// Jobs locked for longer than `stale_after_secs` go back to `pending`,
    /// or to `failed` if that attempt was their last. Returns the number of
    /// jobs released.
    pub async fn requeue_stale(pool: &PgPool, stale_after_secs: i64) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE webhook_jobs \
             SET status = CASE WHEN attempts >= max_attempts THEN $2 ELSE $3 END, \
                 last_error = COALESCE(last_error, 'worker lock expired'), \
                 locked_at = NULL, updated_at = NOW() \
             WHERE status = $1 AND locked_at < NOW() - make_interval(secs => $4)",
        )
        .bind(job_status::PROCESSING)
        .bind(job_status::FAILED)
        .bind(job_status::PENDING)
        .bind(stale_after_secs as f64)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<WebhookJob>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM webhook_jobs WHERE id = $1");
        sqlx::query_as::<_, WebhookJob>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List jobs in a given status, most recently updated first.
    pub async fn list_by_status(
        pool: &PgPool,
        status: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<WebhookJob>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM webhook_jobs WHERE status = $1 \
             ORDER BY updated_at DESC, id DESC LIMIT $2 OFFSET $3"
        );
        sqlx::query_as::<_, WebhookJob>(&query)
            .bind(status)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    /// Put a failed job back in the queue with a fresh attempt budget.
    ///
    /// Returns `None` if the job does not exist or is not in `failed`.
    pub async fn replay(pool: &PgPool, id: DbId) -> Result<Option<WebhookJob>, sqlx::Error> {
        let query = format!(
            "UPDATE webhook_jobs \
             SET status = $2, attempts = 0, next_run_at = NOW(), locked_at = NULL, \
                 last_error = NULL, updated_at = NOW() \
             WHERE id = $1 AND status = $3 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, WebhookJob>(&query)
            .bind(id)
            .bind(job_status::PENDING)
            .bind(job_status::FAILED)
            .fetch_optional(pool)
            .await
    }
}

// ---------------------------------------------------------------------------
// Queue adapter
// ---------------------------------------------------------------------------

/// [`WebhookQueue`] backed by the `webhook_jobs` table.
#[derive(Clone)]
pub struct PgWebhookQueue {
    pool: PgPool,
}

impl PgWebhookQueue {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl WebhookQueue for PgWebhookQueue {
    async fn enqueue(&self, job: NewWebhookJob) -> Result<DbId, QueueError> {
        WebhookJobRepo::enqueue(&self.pool, &job)
            .await
            .map(|row| row.id)
            .map_err(|e| QueueError::Unavailable(e.to_string()))
    }
}
