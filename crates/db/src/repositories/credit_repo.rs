//! Postgres-backed [`CreditStore`].
//!
//! All access goes through the scoping engine. The allocation decrement is
//! one conditional UPDATE so concurrent allocations can never overdraw a
//! credit.

use sqlx::PgPool;

use courtbook_core::credits::{Credit, CreditStore, NewCredit};
use courtbook_core::error::CoreError;
use courtbook_core::tenant::Scope;
use courtbook_core::types::{Amount, DbId, Timestamp};

use crate::models::credit::CreditRow;
use crate::models::customer::Customer;
use crate::scoping::{Assignment, Filter, ListOptions, ScopedRepo};

const FIFO_ORDER: &str = "created_at ASC, id ASC";
const NEWEST_FIRST: &str = "created_at DESC, id DESC";

#[derive(Clone)]
pub struct PgCreditStore {
    pool: PgPool,
}

impl PgCreditStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn db_error(e: sqlx::Error) -> CoreError {
    CoreError::Internal(format!("database error: {e}"))
}

fn to_credits(rows: Vec<CreditRow>) -> Result<Vec<Credit>, CoreError> {
    rows.into_iter().map(Credit::try_from).collect()
}

/// Conditions under which a credit can still be drawn from.
fn available_filters(now: Timestamp) -> Vec<Filter> {
    vec![
        Filter::eq("is_active", true),
        Filter::eq("is_expired", false),
        Filter::gt("remaining_amount", 0i64),
        Filter::null_or_gt("expires_at", now),
    ]
}

impl CreditStore for PgCreditStore {
    async fn customer_in_scope(&self, scope: Scope, customer_id: DbId) -> Result<bool, CoreError> {
        let count =
            ScopedRepo::<Customer>::count(&self.pool, scope, &[Filter::eq("id", customer_id)])
                .await
                .map_err(db_error)?;
        Ok(count > 0)
    }

    async fn insert(&self, scope: Scope, credit: NewCredit) -> Result<Credit, CoreError> {
        let row = ScopedRepo::<CreditRow>::create(&self.pool, scope, &credit)
            .await
            .map_err(db_error)?;
        Credit::try_from(row)
    }

    async fn find(&self, scope: Scope, credit_id: DbId) -> Result<Option<Credit>, CoreError> {
        ScopedRepo::<CreditRow>::find_by_id(&self.pool, scope, credit_id)
            .await
            .map_err(db_error)?
            .map(Credit::try_from)
            .transpose()
    }

    async fn list_available(
        &self,
        scope: Scope,
        customer_id: DbId,
        only: Option<Vec<DbId>>,
        now: Timestamp,
    ) -> Result<Vec<Credit>, CoreError> {
        let mut filters = vec![Filter::eq("customer_id", customer_id)];
        filters.extend(available_filters(now));
        if let Some(ids) = only {
            filters.push(Filter::any_of("id", ids));
        }
        let rows = ScopedRepo::<CreditRow>::find_many(
            &self.pool,
            scope,
            &filters,
            ListOptions::ordered(FIFO_ORDER),
        )
        .await
        .map_err(db_error)?;
        to_credits(rows)
    }

    async fn list_for_customer(
        &self,
        scope: Scope,
        customer_id: DbId,
    ) -> Result<Vec<Credit>, CoreError> {
        let rows = ScopedRepo::<CreditRow>::find_many(
            &self.pool,
            scope,
            &[Filter::eq("customer_id", customer_id)],
            ListOptions::ordered(NEWEST_FIRST),
        )
        .await
        .map_err(db_error)?;
        to_credits(rows)
    }

    async fn consume(
        &self,
        scope: Scope,
        credit_id: DbId,
        take: Amount,
        booking_id: DbId,
        now: Timestamp,
    ) -> Result<Option<Amount>, CoreError> {
        let mut guard = available_filters(now);
        guard.push(Filter::gte("remaining_amount", take));

        let updated = ScopedRepo::<CreditRow>::update(
            &self.pool,
            scope,
            credit_id,
            &guard,
            &[
                Assignment::Decrement("remaining_amount", take.into()),
                Assignment::Increment("used_amount", take.into()),
                Assignment::Append("used_in_booking_ids", booking_id.into()),
                Assignment::Now("updated_at"),
            ],
        )
        .await
        .map_err(db_error)?;

        Ok(updated.map(|row| row.remaining_amount))
    }

    async fn deactivate(
        &self,
        scope: Scope,
        credit_id: DbId,
        reason: Option<String>,
    ) -> Result<Option<Credit>, CoreError> {
        ScopedRepo::<CreditRow>::update(
            &self.pool,
            scope,
            credit_id,
            &[],
            &[
                Assignment::set("is_active", false),
                Assignment::set("deactivation_reason", reason),
                Assignment::Now("updated_at"),
            ],
        )
        .await
        .map_err(db_error)?
        .map(Credit::try_from)
        .transpose()
    }

    async fn expire_due(&self, scope: Scope, now: Timestamp) -> Result<Vec<Credit>, CoreError> {
        ScopedRepo::<CreditRow>::update_many_returning(
            &self.pool,
            scope,
            &[
                Filter::eq("is_expired", false),
                Filter::lte("expires_at", now),
                Filter::gt("remaining_amount", 0i64),
            ],
            &[Assignment::set("is_expired", true), Assignment::Now("updated_at")],
        )
        .await
        .map_err(db_error)?
        .into_iter()
        .map(Credit::try_from)
        .collect()
    }
}
