//! Repository for `processed_webhook_events`, the worker's idempotency
//! claims.

use sqlx::PgPool;

use courtbook_core::types::DbId;

pub struct ProcessedEventRepo;

impl ProcessedEventRepo {
    /// Claim a notification for processing.
    ///
    /// Returns `false` if the `(provider, event_key)` pair was already
    /// claimed by another job, in which case the caller must treat the
    /// delivery as a duplicate. A retry of the job holding the claim gets it
    /// again, so an attempt cut off after claiming does not block its own
    /// retries.
    pub async fn claim(
        pool: &PgPool,
        provider: &str,
        event_key: &str,
        job_id: Option<DbId>,
    ) -> Result<bool, sqlx::Error> {
        let claimed = sqlx::query_scalar::<_, DbId>(
            "INSERT INTO processed_webhook_events (provider, event_key, job_id) \
             VALUES ($1, $2, $3) \
             ON CONFLICT (provider, event_key) DO UPDATE SET job_id = EXCLUDED.job_id \
             WHERE processed_webhook_events.job_id = EXCLUDED.job_id \
             RETURNING id",
        )
        .bind(provider)
        .bind(event_key)
        .bind(job_id)
        .fetch_optional(pool)
        .await?;
        Ok(claimed.is_some())
    }

    /// Drop a claim so that a retry can process the notification again.
    pub async fn release(pool: &PgPool, provider: &str, event_key: &str) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM processed_webhook_events WHERE provider = $1 AND event_key = $2")
            .bind(provider)
            .bind(event_key)
            .execute(pool)
            .await?;
        Ok(())
    }
}
