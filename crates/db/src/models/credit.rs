//! Credit row mapping.
//!
//! The domain record lives in core ([`Credit`]); this module maps it to the
//! `credits` table.

use sqlx::FromRow;

use courtbook_core::credits::{Credit, CreditReason, NewCredit};
use courtbook_core::error::CoreError;
use courtbook_core::types::{Amount, DbId, Timestamp};

use crate::scoping::{BindValue, InsertRow, ScopedEntity, TENANT_COLUMN};

/// A row from the `credits` table.
#[derive(Debug, Clone, FromRow)]
pub struct CreditRow {
    pub id: DbId,
    pub tenant_id: DbId,
    pub customer_id: DbId,
    pub original_amount: Amount,
    pub remaining_amount: Amount,
    pub used_amount: Amount,
    pub currency: String,
    pub reason: String,
    pub source_booking_id: Option<DbId>,
    pub expires_at: Option<Timestamp>,
    pub is_expired: bool,
    pub is_active: bool,
    pub used_in_booking_ids: Vec<DbId>,
    pub notes: Option<String>,
    pub deactivation_reason: Option<String>,
    pub created_by: Option<DbId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl TryFrom<CreditRow> for Credit {
    type Error = CoreError;

    fn try_from(row: CreditRow) -> Result<Self, Self::Error> {
        let reason = CreditReason::parse(&row.reason).ok_or_else(|| {
            CoreError::Internal(format!("credit {} has unknown reason '{}'", row.id, row.reason))
        })?;
        Ok(Credit {
            id: row.id,
            tenant_id: row.tenant_id,
            customer_id: row.customer_id,
            original_amount: row.original_amount,
            remaining_amount: row.remaining_amount,
            used_amount: row.used_amount,
            currency: row.currency,
            reason,
            source_booking_id: row.source_booking_id,
            expires_at: row.expires_at,
            is_expired: row.is_expired,
            is_active: row.is_active,
            used_in_booking_ids: row.used_in_booking_ids,
            notes: row.notes,
            deactivation_reason: row.deactivation_reason,
            created_by: row.created_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl ScopedEntity for CreditRow {
    const TABLE: &'static str = "credits";
    const ENTITY: &'static str = "Credit";
    const COLUMNS: &'static str = "\
        id, tenant_id, customer_id, original_amount, remaining_amount, used_amount, \
        currency, reason, source_booking_id, expires_at, is_expired, is_active, \
        used_in_booking_ids, notes, deactivation_reason, created_by, created_at, updated_at";

    type New = NewCredit;
}

impl InsertRow for NewCredit {
    fn tenant_id(&self) -> Option<DbId> {
        self.tenant_id
    }

    fn values(&self) -> Vec<(&'static str, BindValue)> {
        vec![
            (TENANT_COLUMN, self.tenant_id.into()),
            ("customer_id", self.customer_id.into()),
            ("original_amount", self.amount.into()),
            ("remaining_amount", self.amount.into()),
            ("used_amount", BindValue::BigInt(0)),
            ("currency", self.currency.clone().into()),
            ("reason", self.reason.as_str().into()),
            ("source_booking_id", self.source_booking_id.into()),
            ("expires_at", self.expires_at.into()),
            ("notes", self.notes.clone().into()),
            ("created_by", self.created_by.into()),
        ]
    }
}
