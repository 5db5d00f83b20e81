//! Postgres-backed [`WebhookEffects`].

use sqlx::PgPool;

use courtbook_core::tenant::TenantContext;
use courtbook_core::types::DbId;
use courtbook_db::repositories::{PaymentRepo, ProcessedEventRepo};

use crate::processor::{PaymentRef, ProcessError, WebhookEffects};

#[derive(Clone)]
pub struct PgWebhookEffects {
    pool: PgPool,
}

impl PgWebhookEffects {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn storage(e: sqlx::Error) -> ProcessError {
    ProcessError::Storage(e.to_string())
}

impl WebhookEffects for PgWebhookEffects {
    async fn claim(&self, provider: &str, key: &str, job_id: DbId) -> Result<bool, ProcessError> {
        ProcessedEventRepo::claim(&self.pool, provider, key, Some(job_id))
            .await
            .map_err(storage)
    }

    async fn release(&self, provider: &str, key: &str) -> Result<(), ProcessError> {
        ProcessedEventRepo::release(&self.pool, provider, key)
            .await
            .map_err(storage)
    }

    async fn resolve_payment(
        &self,
        provider: &str,
        external_id: &str,
    ) -> Result<Option<PaymentRef>, ProcessError> {
        let payment = PaymentRepo::find_by_external_id(&self.pool, provider, external_id)
            .await
            .map_err(storage)?;
        Ok(payment.map(|p| PaymentRef {
            id: p.id,
            tenant_id: p.tenant_id,
            status: p.status,
        }))
    }

    async fn update_payment_status(
        &self,
        ctx: &TenantContext,
        payment_id: DbId,
        from: &str,
        to: &str,
    ) -> Result<bool, ProcessError> {
        let updated = PaymentRepo::update_status(&self.pool, ctx.scope(), payment_id, from, to)
            .await
            .map_err(storage)?;
        Ok(updated.is_some())
    }
}
