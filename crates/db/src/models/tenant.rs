//! Tenant entity. The tenants table is tenant-free.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use courtbook_core::types::{DbId, Timestamp};

use crate::scoping::{BindValue, InsertRow, ScopedEntity};

#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tenant {
    pub id: DbId,
    pub name: String,
    pub slug: String,
    pub is_active: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for creating a tenant.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateTenant {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(min = 1, max = 64))]
    pub slug: String,
}

impl ScopedEntity for Tenant {
    const TABLE: &'static str = "tenants";
    const ENTITY: &'static str = "Tenant";
    const COLUMNS: &'static str = "id, name, slug, is_active, created_at, updated_at";

    type New = CreateTenant;
}

impl InsertRow for CreateTenant {
    fn values(&self) -> Vec<(&'static str, BindValue)> {
        vec![
            ("name", self.name.clone().into()),
            ("slug", self.slug.clone().into()),
        ]
    }
}
