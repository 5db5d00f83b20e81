//! Webhook job runner.
//!
//! Polls `webhook_jobs` every `poll_interval`, claims a batch with
//! `FOR UPDATE SKIP LOCKED` (see [`WebhookJobRepo::claim_batch`]) and drives
//! each job through the [`WebhookProcessor`]. Transient failures are
//! rescheduled with exponential backoff until the job's attempt cap, after
//! which the job is parked as `failed` for manual replay.

use std::time::Duration;

use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

use courtbook_core::webhooks::RetryPolicy;
use courtbook_db::models::webhook_job::WebhookJob;
use courtbook_db::repositories::WebhookJobRepo;

use crate::config::WorkerConfig;
use crate::processor::{ProcessError, ProcessOutcome, WebhookEffects, WebhookProcessor};

// ---------------------------------------------------------------------------
// Attempt results
// ---------------------------------------------------------------------------

/// Why a single job attempt did not succeed.
#[derive(Debug, thiserror::Error)]
pub enum AttemptError {
    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error("attempt timed out after {0:?}")]
    TimedOut(Duration),
}

impl AttemptError {
    pub fn is_permanent(&self) -> bool {
        match self {
            AttemptError::Process(e) => e.is_permanent(),
            AttemptError::TimedOut(_) => false,
        }
    }
}

/// What to do with a job after an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStep {
    Complete,
    Retry { delay_secs: i64 },
    Fail,
}

/// Decide the fate of a job that has now used `attempts` attempts.
pub fn next_step(
    result: &Result<ProcessOutcome, AttemptError>,
    attempts: i32,
    policy: RetryPolicy,
) -> JobStep {
    match result {
        Ok(_) => JobStep::Complete,
        Err(e) if e.is_permanent() => JobStep::Fail,
        Err(_) if policy.can_retry(attempts) => JobStep::Retry {
            delay_secs: policy.delay_for(attempts),
        },
        Err(_) => JobStep::Fail,
    }
}

// ---------------------------------------------------------------------------
// Worker
// ---------------------------------------------------------------------------

pub struct WebhookWorker<E> {
    pool: PgPool,
    processor: WebhookProcessor<E>,
    config: WorkerConfig,
}

impl<E: WebhookEffects> WebhookWorker<E> {
    pub fn new(pool: PgPool, processor: WebhookProcessor<E>, config: WorkerConfig) -> Self {
        Self {
            pool,
            processor,
            config,
        }
    }

    /// Run the polling loop until the cancellation token is triggered.
    ///
    /// A job in flight when cancellation arrives finishes its attempt first.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.config.poll_interval);
        tracing::info!(
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            batch_size = self.config.batch_size,
            "Webhook worker started",
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Webhook worker shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.run_once().await {
                        tracing::error!(error = %e, "Webhook poll cycle failed");
                    }
                }
            }
        }
    }

    /// One poll cycle. Returns the number of jobs attempted.
    pub async fn run_once(&self) -> Result<usize, sqlx::Error> {
        let requeued = WebhookJobRepo::requeue_stale(&self.pool, self.config.stale_lock_secs).await?;
        if requeued > 0 {
            tracing::warn!(requeued, "Recovered webhook jobs from expired worker locks");
        }

        let jobs = WebhookJobRepo::claim_batch(&self.pool, self.config.batch_size).await?;
        for job in &jobs {
            self.run_job(job).await?;
        }
        Ok(jobs.len())
    }

    async fn run_job(&self, job: &WebhookJob) -> Result<(), sqlx::Error> {
        let payload = job.to_payload();
        let result = match tokio::time::timeout(
            self.config.job_timeout,
            self.processor.process(job.id, &payload),
        )
        .await
        {
            Ok(result) => result.map_err(AttemptError::from),
            Err(_) => Err(AttemptError::TimedOut(self.config.job_timeout)),
        };

        let policy = self.config.retry_policy(job.max_attempts);
        let lease = job.lease();
        let held = match (next_step(&result, job.attempts, policy), &result) {
            (JobStep::Retry { delay_secs }, Err(e)) => {
                tracing::warn!(
                    job_id = job.id,
                    attempt = job.attempts,
                    max_attempts = job.max_attempts,
                    delay_secs,
                    error = %e,
                    "Webhook job failed, retry scheduled",
                );
                WebhookJobRepo::reschedule(&self.pool, &lease, &e.to_string(), delay_secs).await?
            }
            (_, Err(e)) => {
                tracing::error!(
                    escalate = true,
                    job_id = job.id,
                    provider = %job.provider,
                    attempt = job.attempts,
                    error = %e,
                    "Webhook job failed permanently",
                );
                WebhookJobRepo::mark_failed(&self.pool, &lease, &e.to_string()).await?
            }
            (_, Ok(outcome)) => {
                tracing::info!(job_id = job.id, provider = %job.provider, ?outcome, "Webhook job completed");
                WebhookJobRepo::complete(&self.pool, &lease).await?
            }
        };

        if !held {
            tracing::warn!(
                job_id = job.id,
                attempt = job.attempts,
                "Webhook job lock lost to another worker, result discarded",
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use courtbook_core::webhooks::NotificationError;

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay_secs: 2,
        }
    }

    fn transient() -> Result<ProcessOutcome, AttemptError> {
        Err(ProcessError::Storage("connection reset".into()).into())
    }

    #[test]
    fn success_completes() {
        assert_eq!(next_step(&Ok(ProcessOutcome::Duplicate), 1, policy()), JobStep::Complete);
    }

    #[test]
    fn transient_failure_backs_off_exponentially() {
        assert_eq!(next_step(&transient(), 1, policy()), JobStep::Retry { delay_secs: 2 });
        assert_eq!(next_step(&transient(), 2, policy()), JobStep::Retry { delay_secs: 4 });
    }

    #[test]
    fn last_attempt_fails_the_job() {
        assert_eq!(next_step(&transient(), 3, policy()), JobStep::Fail);
    }

    #[test]
    fn malformed_payload_fails_without_retry() {
        let result = Err(ProcessError::Malformed(NotificationError::MissingField("data.status")).into());
        assert_eq!(next_step(&result, 1, policy()), JobStep::Fail);
    }

    #[test]
    fn timeout_is_retried() {
        let result = Err(AttemptError::TimedOut(Duration::from_secs(30)));
        assert_matches!(next_step(&result, 1, policy()), JobStep::Retry { .. });
    }

    #[test]
    fn unknown_payment_is_retried() {
        let result = Err(
            ProcessError::UnknownPayment {
                provider: "mercadopago".into(),
                external_id: "PAY-404".into(),
            }
            .into(),
        );
        assert_matches!(next_step(&result, 2, policy()), JobStep::Retry { delay_secs: 4 });
    }
}
