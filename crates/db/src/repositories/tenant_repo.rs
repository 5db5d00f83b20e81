//! Repository for the tenant-free `tenants` table.

use sqlx::PgPool;

use courtbook_core::tenant::Scope;
use courtbook_core::types::DbId;

use crate::models::tenant::{CreateTenant, Tenant};
use crate::scoping::{ListOptions, ScopedRepo};

pub struct TenantRepo;

impl TenantRepo {
    pub async fn create(
        pool: &PgPool,
        scope: Scope,
        input: &CreateTenant,
    ) -> Result<Tenant, sqlx::Error> {
        ScopedRepo::<Tenant>::create(pool, scope, input).await
    }

    pub async fn find_by_id(
        pool: &PgPool,
        scope: Scope,
        id: DbId,
    ) -> Result<Option<Tenant>, sqlx::Error> {
        ScopedRepo::<Tenant>::find_by_id(pool, scope, id).await
    }

    /// List tenants ordered by name.
    pub async fn list(pool: &PgPool, scope: Scope) -> Result<Vec<Tenant>, sqlx::Error> {
        ScopedRepo::<Tenant>::find_many(pool, scope, &[], ListOptions::ordered("name ASC, id ASC"))
            .await
    }
}
