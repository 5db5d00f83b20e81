//! Repository for the `payments` table.

use sqlx::PgPool;

use courtbook_core::tenant::{Scope, SystemTask};
use courtbook_core::types::DbId;

use crate::models::payment::{CreatePayment, Payment};
use crate::scoping::{Assignment, Filter, ListOptions, ScopedRepo};

pub struct PaymentRepo;

impl PaymentRepo {
    pub async fn create(
        pool: &PgPool,
        scope: Scope,
        input: &CreatePayment,
    ) -> Result<Payment, sqlx::Error> {
        ScopedRepo::<Payment>::create(pool, scope, input).await
    }

    pub async fn find_by_id(
        pool: &PgPool,
        scope: Scope,
        id: DbId,
    ) -> Result<Option<Payment>, sqlx::Error> {
        ScopedRepo::<Payment>::find_by_id(pool, scope, id).await
    }

    /// Find a payment by its provider reference across all tenants.
    ///
    /// Inbound notifications carry no tenant; this lookup is how the worker
    /// learns which tenant to act in.
    pub async fn find_by_external_id(
        pool: &PgPool,
        provider: &str,
        external_id: &str,
    ) -> Result<Option<Payment>, sqlx::Error> {
        let rows = ScopedRepo::<Payment>::find_many(
            pool,
            Scope::System(SystemTask::WebhookTenantResolution),
            &[
                Filter::eq("provider", provider),
                Filter::eq("external_id", external_id),
            ],
            ListOptions::default().page(1, 0),
        )
        .await?;
        Ok(rows.into_iter().next())
    }

    /// Move a payment from status `from` to `to` in the caller's scope.
    ///
    /// Returns `None` when the payment is not visible in `scope` or its
    /// status is no longer `from`.
    pub async fn update_status(
        pool: &PgPool,
        scope: Scope,
        id: DbId,
        from: &str,
        to: &str,
    ) -> Result<Option<Payment>, sqlx::Error> {
        ScopedRepo::<Payment>::update(
            pool,
            scope,
            id,
            &[Filter::eq("status", from)],
            &[Assignment::set("status", to), Assignment::Now("updated_at")],
        )
        .await
    }
}
