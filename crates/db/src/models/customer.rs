//! Customer entity model and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use courtbook_core::types::{DbId, Timestamp};

use crate::scoping::{BindValue, InsertRow, ScopedEntity, TENANT_COLUMN};

/// A customer row from the `customers` table.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: DbId,
    pub tenant_id: DbId,
    pub name: String,
    pub email: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for creating a customer. `tenant_id` is only honored for
/// cross-tenant callers; tenant callers always create in their own tenant.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCustomer {
    pub tenant_id: Option<DbId>,
    pub name: String,
    pub email: Option<String>,
}

impl ScopedEntity for Customer {
    const TABLE: &'static str = "customers";
    const ENTITY: &'static str = "Customer";
    const COLUMNS: &'static str = "id, tenant_id, name, email, created_at, updated_at";

    type New = CreateCustomer;
}

impl InsertRow for CreateCustomer {
    fn tenant_id(&self) -> Option<DbId> {
        self.tenant_id
    }

    fn values(&self) -> Vec<(&'static str, BindValue)> {
        vec![
            (TENANT_COLUMN, self.tenant_id.into()),
            ("name", self.name.clone().into()),
            ("email", self.email.clone().into()),
        ]
    }
}
