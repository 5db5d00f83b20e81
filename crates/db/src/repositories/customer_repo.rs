//! Repository for the `customers` table.

use sqlx::PgPool;

use courtbook_core::tenant::Scope;
use courtbook_core::types::DbId;

use crate::models::customer::{CreateCustomer, Customer};
use crate::scoping::{Filter, ListOptions, ScopedRepo};

pub struct CustomerRepo;

impl CustomerRepo {
    pub async fn create(
        pool: &PgPool,
        scope: Scope,
        input: &CreateCustomer,
    ) -> Result<Customer, sqlx::Error> {
        ScopedRepo::<Customer>::create(pool, scope, input).await
    }

    pub async fn find_by_id(
        pool: &PgPool,
        scope: Scope,
        id: DbId,
    ) -> Result<Option<Customer>, sqlx::Error> {
        ScopedRepo::<Customer>::find_by_id(pool, scope, id).await
    }

    pub async fn list(
        pool: &PgPool,
        scope: Scope,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Customer>, sqlx::Error> {
        ScopedRepo::<Customer>::find_many(
            pool,
            scope,
            &[],
            ListOptions::ordered("name ASC, id ASC").page(limit, offset),
        )
        .await
    }

    /// Whether the customer exists and is visible under `scope`.
    pub async fn exists(pool: &PgPool, scope: Scope, id: DbId) -> Result<bool, sqlx::Error> {
        let count = ScopedRepo::<Customer>::count(pool, scope, &[Filter::eq("id", id)]).await?;
        Ok(count > 0)
    }
}
