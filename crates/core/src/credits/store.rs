//! Storage interface the credit ledger runs against.
//!
//! Every method takes the caller's [`Scope`]; implementations must confine
//! reads and writes to it exactly as the scoping engine does (a foreign id
//! behaves like a missing one).

use std::future::Future;

use crate::credits::{Credit, NewCredit};
use crate::error::CoreError;
use crate::tenant::Scope;
use crate::types::{Amount, DbId, Timestamp};

/// Persistence operations needed by [`CreditLedger`](super::CreditLedger).
pub trait CreditStore: Send + Sync {
    /// Whether `customer_id` exists and is visible under `scope`.
    fn customer_in_scope(
        &self,
        scope: Scope,
        customer_id: DbId,
    ) -> impl Future<Output = Result<bool, CoreError>> + Send;

    /// Insert a credit with `remaining = original = amount` and `used = 0`.
    fn insert(
        &self,
        scope: Scope,
        credit: NewCredit,
    ) -> impl Future<Output = Result<Credit, CoreError>> + Send;

    /// Fetch one credit regardless of its state.
    fn find(
        &self,
        scope: Scope,
        credit_id: DbId,
    ) -> impl Future<Output = Result<Option<Credit>, CoreError>> + Send;

    /// Credits of a customer that can be drawn from at `now`, oldest first.
    ///
    /// When `only` is given the result is restricted to those ids.
    fn list_available(
        &self,
        scope: Scope,
        customer_id: DbId,
        only: Option<Vec<DbId>>,
        now: Timestamp,
    ) -> impl Future<Output = Result<Vec<Credit>, CoreError>> + Send;

    /// Every credit of a customer in any state, newest first.
    fn list_for_customer(
        &self,
        scope: Scope,
        customer_id: DbId,
    ) -> impl Future<Output = Result<Vec<Credit>, CoreError>> + Send;

    /// Atomically move `take` from remaining to used and record `booking_id`.
    ///
    /// Must be a single conditional update that only succeeds while the
    /// credit is still available and `remaining_amount >= take`. Returns the
    /// remaining amount after the update, or `None` if the condition failed.
    fn consume(
        &self,
        scope: Scope,
        credit_id: DbId,
        take: Amount,
        booking_id: DbId,
        now: Timestamp,
    ) -> impl Future<Output = Result<Option<Amount>, CoreError>> + Send;

    /// Mark a credit inactive. Balances are left untouched.
    fn deactivate(
        &self,
        scope: Scope,
        credit_id: DbId,
        reason: Option<String>,
    ) -> impl Future<Output = Result<Option<Credit>, CoreError>> + Send;

    /// Flag credits whose expiry has passed and that still hold a balance.
    ///
    /// Returns the credits flagged by this call, as written.
    fn expire_due(
        &self,
        scope: Scope,
        now: Timestamp,
    ) -> impl Future<Output = Result<Vec<Credit>, CoreError>> + Send;
}
