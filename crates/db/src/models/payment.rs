//! Payment entity model and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use courtbook_core::types::{Amount, DbId, Timestamp};

use crate::scoping::{BindValue, InsertRow, ScopedEntity, TENANT_COLUMN};

/// A payment row. `(provider, external_id)` identifies it at the provider.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: DbId,
    pub tenant_id: DbId,
    pub customer_id: Option<DbId>,
    pub booking_id: Option<DbId>,
    pub provider: String,
    pub external_id: String,
    pub amount: Amount,
    pub currency: String,
    pub status: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePayment {
    pub tenant_id: Option<DbId>,
    pub customer_id: Option<DbId>,
    pub booking_id: Option<DbId>,
    pub provider: String,
    pub external_id: String,
    pub amount: Amount,
    pub currency: String,
    pub status: String,
}

impl ScopedEntity for Payment {
    const TABLE: &'static str = "payments";
    const ENTITY: &'static str = "Payment";
    const COLUMNS: &'static str = "\
        id, tenant_id, customer_id, booking_id, provider, external_id, \
        amount, currency, status, created_at, updated_at";

    type New = CreatePayment;
}

impl InsertRow for CreatePayment {
    fn tenant_id(&self) -> Option<DbId> {
        self.tenant_id
    }

    fn values(&self) -> Vec<(&'static str, BindValue)> {
        vec![
            (TENANT_COLUMN, self.tenant_id.into()),
            ("customer_id", self.customer_id.into()),
            ("booking_id", self.booking_id.into()),
            ("provider", self.provider.clone().into()),
            ("external_id", self.external_id.clone().into()),
            ("amount", self.amount.into()),
            ("currency", self.currency.clone().into()),
            ("status", self.status.clone().into()),
        ]
    }
}
