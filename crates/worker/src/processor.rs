//! Idempotent processing of one webhook job.
//!
//! Delivery is at-least-once, so every notification is first claimed under
//! its idempotency key; a claim held by another job means the notification
//! was already handled and the job is a no-op. The payment's tenant is
//! resolved under the system resolution scope, and the status change itself
//! runs inside that tenant through the scoping engine.

use std::future::Future;
use std::sync::Arc;

use serde_json::json;

use courtbook_core::audit::{self, event_types, Actor, AuditEvent, AuditSink};
use courtbook_core::tenant::TenantContext;
use courtbook_core::types::DbId;
use courtbook_core::webhooks::{NotificationError, WebhookJobPayload, WebhookNotification};

// ---------------------------------------------------------------------------
// Errors and outcomes
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    /// The payload can never be processed. Not retried.
    #[error("malformed notification: {0}")]
    Malformed(#[from] NotificationError),

    /// The notification references a payment we do not know (yet).
    #[error("no payment {external_id} from provider {provider}")]
    UnknownPayment {
        provider: String,
        external_id: String,
    },

    /// The payment's status moved while this job was applying its own.
    #[error("payment {payment_id} left status {expected} concurrently")]
    StatusConflict { payment_id: DbId, expected: String },

    #[error("storage error: {0}")]
    Storage(String),
}

impl ProcessError {
    /// Whether retrying the job can never succeed.
    pub fn is_permanent(&self) -> bool {
        matches!(self, ProcessError::Malformed(_))
    }
}

/// What processing a job did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    Applied {
        payment_id: DbId,
        tenant_id: DbId,
        status: String,
    },
    /// Payment already had the reported status.
    Unchanged { payment_id: DbId },
    /// Another job already claimed this notification.
    Duplicate,
    /// Not a notification type that changes state.
    Ignored { kind: String },
}

// ---------------------------------------------------------------------------
// Effects
// ---------------------------------------------------------------------------

/// The payment a notification refers to, as seen by tenant resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentRef {
    pub id: DbId,
    pub tenant_id: DbId,
    pub status: String,
}

/// Side effects the processor needs from storage.
pub trait WebhookEffects: Send + Sync {
    /// Claim `(provider, key)` for `job_id`. `false` means another job holds it.
    fn claim(
        &self,
        provider: &str,
        key: &str,
        job_id: DbId,
    ) -> impl Future<Output = Result<bool, ProcessError>> + Send;

    /// Drop a claim so a retry can take it again.
    fn release(
        &self,
        provider: &str,
        key: &str,
    ) -> impl Future<Output = Result<(), ProcessError>> + Send;

    /// Find a payment by provider reference across tenants.
    fn resolve_payment(
        &self,
        provider: &str,
        external_id: &str,
    ) -> impl Future<Output = Result<Option<PaymentRef>, ProcessError>> + Send;

    /// Move a payment from `from` to `to` inside `ctx`'s tenant.
    ///
    /// `false` if the payment is not visible or no longer has status `from`.
    fn update_payment_status(
        &self,
        ctx: &TenantContext,
        payment_id: DbId,
        from: &str,
        to: &str,
    ) -> impl Future<Output = Result<bool, ProcessError>> + Send;
}

// ---------------------------------------------------------------------------
// Processor
// ---------------------------------------------------------------------------

pub struct WebhookProcessor<E> {
    effects: E,
    audit: Arc<dyn AuditSink>,
}

impl<E: WebhookEffects> WebhookProcessor<E> {
    pub fn new(effects: E, audit: Arc<dyn AuditSink>) -> Self {
        Self { effects, audit }
    }

    pub fn effects(&self) -> &E {
        &self.effects
    }

    pub async fn process(
        &self,
        job_id: DbId,
        job: &WebhookJobPayload,
    ) -> Result<ProcessOutcome, ProcessError> {
        let notification = WebhookNotification::parse(&job.raw_payload)?;
        if !notification.is_payment() {
            tracing::debug!(job_id, kind = %notification.kind, "Notification type ignored");
            return Ok(ProcessOutcome::Ignored {
                kind: notification.kind,
            });
        }
        let status = notification.payment_status()?.to_string();

        let key = notification.idempotency_key();
        if !self.effects.claim(&job.provider, &key, job_id).await? {
            tracing::info!(
                job_id,
                provider = %job.provider,
                external_id = %notification.external_id,
                "Duplicate notification skipped",
            );
            return Ok(ProcessOutcome::Duplicate);
        }

        match self.apply(job_id, job, &notification, &status).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                if let Err(release_err) = self.effects.release(&job.provider, &key).await {
                    tracing::error!(job_id, error = %release_err, "Failed to release notification claim");
                }
                Err(e)
            }
        }
    }

    async fn apply(
        &self,
        job_id: DbId,
        job: &WebhookJobPayload,
        notification: &WebhookNotification,
        status: &str,
    ) -> Result<ProcessOutcome, ProcessError> {
        let unknown = || ProcessError::UnknownPayment {
            provider: job.provider.clone(),
            external_id: notification.external_id.clone(),
        };

        let payment = self
            .effects
            .resolve_payment(&job.provider, &notification.external_id)
            .await?
            .ok_or_else(unknown)?;

        if payment.status == status {
            return Ok(ProcessOutcome::Unchanged {
                payment_id: payment.id,
            });
        }

        let ctx = TenantContext::for_tenant(payment.tenant_id, None);
        if !self
            .effects
            .update_payment_status(&ctx, payment.id, &payment.status, status)
            .await?
        {
            // Lost a race with another writer. Look again to tell a payment
            // that vanished from one that moved on.
            let current = self
                .effects
                .resolve_payment(&job.provider, &notification.external_id)
                .await?
                .ok_or_else(unknown)?;
            if current.status == status {
                return Ok(ProcessOutcome::Unchanged {
                    payment_id: current.id,
                });
            }
            tracing::warn!(
                job_id,
                payment_id = payment.id,
                expected = %payment.status,
                found = %current.status,
                "Payment status changed concurrently",
            );
            return Err(ProcessError::StatusConflict {
                payment_id: payment.id,
                expected: payment.status,
            });
        }

        tracing::info!(
            job_id,
            tenant_id = payment.tenant_id,
            payment_id = payment.id,
            from = %payment.status,
            to = %status,
            "Payment status updated from webhook",
        );

        audit::emit(
            self.audit.as_ref(),
            AuditEvent::new(
                event_types::PAYMENT_STATUS_CHANGED,
                Some(payment.tenant_id),
                Actor::webhook(&job.provider),
            )
            .with_entity("payment", payment.id)
            .with_metadata(json!({
                "externalId": notification.external_id,
                "jobId": job_id,
                "requestId": job.request_id,
            }))
            .with_change(
                Some(json!({ "status": payment.status })),
                Some(json!({ "status": status })),
            ),
        )
        .await;

        Ok(ProcessOutcome::Applied {
            payment_id: payment.id,
            tenant_id: payment.tenant_id,
            status: status.to_string(),
        })
    }
}
