//! Customer credit domain: records, request DTOs, and allocation results.
//!
//! A credit is a tenant-owned balance that can be applied to bookings. The
//! invariant `remaining_amount + used_amount == original_amount` holds for
//! every credit at all times; allocation moves value from `remaining` to
//! `used` and never the other way.

pub mod ledger;
pub mod memory;
pub mod store;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::CoreError;
use crate::types::{Amount, DbId, Timestamp};

pub use ledger::CreditLedger;
pub use memory::MemoryCreditStore;
pub use store::CreditStore;

// ---------------------------------------------------------------------------
// Reason
// ---------------------------------------------------------------------------

/// Why a credit was granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreditReason {
    Manual,
    EarlyCancellation,
    Refund,
    Promotion,
    Compensation,
}

impl CreditReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            CreditReason::Manual => "manual",
            CreditReason::EarlyCancellation => "early_cancellation",
            CreditReason::Refund => "refund",
            CreditReason::Promotion => "promotion",
            CreditReason::Compensation => "compensation",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "manual" => Some(CreditReason::Manual),
            "early_cancellation" => Some(CreditReason::EarlyCancellation),
            "refund" => Some(CreditReason::Refund),
            "promotion" => Some(CreditReason::Promotion),
            "compensation" => Some(CreditReason::Compensation),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Credit record
// ---------------------------------------------------------------------------

/// A credit as stored. Never physically deleted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Credit {
    pub id: DbId,
    pub tenant_id: DbId,
    pub customer_id: DbId,
    pub original_amount: Amount,
    pub remaining_amount: Amount,
    pub used_amount: Amount,
    pub currency: String,
    pub reason: CreditReason,
    pub source_booking_id: Option<DbId>,
    pub expires_at: Option<Timestamp>,
    pub is_expired: bool,
    pub is_active: bool,
    /// Bookings this credit paid into, in allocation order.
    pub used_in_booking_ids: Vec<DbId>,
    pub notes: Option<String>,
    pub deactivation_reason: Option<String>,
    pub created_by: Option<DbId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Credit {
    /// Whether the credit can be drawn from at `now`.
    pub fn is_available_at(&self, now: Timestamp) -> bool {
        self.is_active
            && !self.is_expired
            && self.remaining_amount > 0
            && self.expires_at.map_or(true, |at| at > now)
    }

    /// Whether the record satisfies the ledger's balance invariants.
    pub fn is_conserved(&self) -> bool {
        self.remaining_amount >= 0
            && self.used_amount >= 0
            && self.remaining_amount + self.used_amount == self.original_amount
    }
}

/// Insert payload handed to a [`CreditStore`].
///
/// `tenant_id` is advisory: tenant-scoped stores overwrite it with the
/// caller's tenant.
#[derive(Debug, Clone)]
pub struct NewCredit {
    pub tenant_id: Option<DbId>,
    pub customer_id: DbId,
    pub amount: Amount,
    pub currency: String,
    pub reason: CreditReason,
    pub source_booking_id: Option<DbId>,
    pub expires_at: Option<Timestamp>,
    pub notes: Option<String>,
    pub created_by: Option<DbId>,
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Grant a new credit to a customer of the caller's tenant.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GrantCredit {
    pub customer_id: DbId,
    #[validate(range(min = 1))]
    pub amount: Amount,
    pub reason: CreditReason,
    #[validate(length(equal = 3))]
    pub currency: Option<String>,
    pub source_booking_id: Option<DbId>,
    pub expires_at: Option<Timestamp>,
    #[validate(length(max = 500))]
    pub notes: Option<String>,
}

/// Apply credits to an amount owed on a booking.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AllocationRequest {
    pub customer_id: DbId,
    pub booking_id: DbId,
    #[validate(range(min = 1))]
    pub amount: Amount,
    /// Restrict allocation to these credits. Still subject to eligibility.
    #[validate(length(min = 1, max = 100))]
    pub credit_ids: Option<Vec<DbId>>,
}

/// Convert `validator` errors into the domain validation error.
pub fn validation_error(errors: validator::ValidationErrors) -> CoreError {
    CoreError::Validation(errors.to_string())
}

/// Check that a currency code is three ASCII letters and upper-case it.
pub fn normalize_currency(code: &str) -> Result<String, CoreError> {
    if code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic()) {
        Ok(code.to_ascii_uppercase())
    } else {
        Err(CoreError::Validation(format!(
            "currency must be a 3-letter code, got '{code}'"
        )))
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Available balance of one customer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditBalance {
    pub customer_id: DbId,
    pub total_available: Amount,
    /// Available credits, oldest first.
    pub credits: Vec<Credit>,
}

/// How much one credit contributed to an allocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditUsage {
    pub credit_id: DbId,
    pub amount_used: Amount,
    pub remaining_after: Amount,
}

/// Outcome of an allocation. Partial coverage is a successful outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationResult {
    pub success: bool,
    pub amount_applied: Amount,
    pub remaining_to_pay: Amount,
    pub credits_used: Vec<CreditUsage>,
    pub message: String,
}

impl AllocationResult {
    /// Build the result from what was requested and what was consumed.
    pub fn from_usage(requested: Amount, credits_used: Vec<CreditUsage>) -> Self {
        let amount_applied: Amount = credits_used.iter().map(|u| u.amount_used).sum();
        let remaining_to_pay = requested - amount_applied;
        let message = if amount_applied == 0 {
            "No credits available for this customer".to_string()
        } else if remaining_to_pay == 0 {
            format!("Credits covered the full amount of {amount_applied}")
        } else {
            format!("Applied {amount_applied} in credits; {remaining_to_pay} remains to be paid")
        };
        Self {
            success: amount_applied > 0,
            amount_applied,
            remaining_to_pay,
            credits_used,
            message,
        }
    }
}

/// Order candidates first-in-first-out: creation time, then id.
pub fn sort_fifo(credits: &mut [Credit]) {
    credits.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
}
