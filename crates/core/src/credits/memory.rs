//! In-process [`CreditStore`] used by unit tests and local tooling.
//!
//! Each operation yields to the runtime before taking the lock so that
//! concurrent allocations interleave the way they would against a database.

use std::sync::{Mutex, MutexGuard};

use chrono::Utc;

use crate::credits::store::CreditStore;
use crate::credits::{Credit, CreditReason, NewCredit};
use crate::error::CoreError;
use crate::tenant::Scope;
use crate::types::{Amount, DbId, Timestamp};

#[derive(Debug, Default)]
struct State {
    credits: Vec<Credit>,
    /// (tenant_id, customer_id)
    customers: Vec<(DbId, DbId)>,
    next_id: DbId,
}

#[derive(Debug, Default)]
pub struct MemoryCreditStore {
    state: Mutex<State>,
}

impl MemoryCreditStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, CoreError> {
        self.state
            .lock()
            .map_err(|_| CoreError::Internal("credit store lock poisoned".into()))
    }

    /// Register a customer as belonging to `tenant_id`.
    pub fn add_customer(&self, tenant_id: DbId, customer_id: DbId) {
        if let Ok(mut state) = self.state.lock() {
            state.customers.push((tenant_id, customer_id));
        }
    }

    /// Insert an active credit directly, bypassing scope checks.
    ///
    /// Returns the new credit id, or `0` if the store lock is poisoned.
    pub fn seed(
        &self,
        tenant_id: DbId,
        customer_id: DbId,
        amount: Amount,
        created_at: Timestamp,
        expires_at: Option<Timestamp>,
    ) -> DbId {
        let Ok(mut state) = self.state.lock() else {
            return 0;
        };
        state.next_id += 1;
        let id = state.next_id;
        state.credits.push(Credit {
            id,
            tenant_id,
            customer_id,
            original_amount: amount,
            remaining_amount: amount,
            used_amount: 0,
            currency: "USD".into(),
            reason: CreditReason::Manual,
            source_booking_id: None,
            expires_at,
            is_expired: false,
            is_active: true,
            used_in_booking_ids: Vec::new(),
            notes: None,
            deactivation_reason: None,
            created_by: None,
            created_at,
            updated_at: created_at,
        });
        id
    }

    /// Unscoped read of one credit.
    pub fn get(&self, id: DbId) -> Option<Credit> {
        self.state
            .lock()
            .ok()?
            .credits
            .iter()
            .find(|c| c.id == id)
            .cloned()
    }
}

impl CreditStore for MemoryCreditStore {
    async fn customer_in_scope(&self, scope: Scope, customer_id: DbId) -> Result<bool, CoreError> {
        tokio::task::yield_now().await;
        let state = self.lock()?;
        Ok(state
            .customers
            .iter()
            .any(|(tenant, id)| *id == customer_id && scope.admits(Some(*tenant))))
    }

    async fn insert(&self, scope: Scope, credit: NewCredit) -> Result<Credit, CoreError> {
        tokio::task::yield_now().await;
        let tenant_id = scope
            .tenant_for_insert(credit.tenant_id)
            .ok_or_else(|| CoreError::Validation("credit requires a tenant".into()))?;

        let mut state = self.lock()?;
        state.next_id += 1;
        let now = Utc::now();
        let record = Credit {
            id: state.next_id,
            tenant_id,
            customer_id: credit.customer_id,
            original_amount: credit.amount,
            remaining_amount: credit.amount,
            used_amount: 0,
            currency: credit.currency,
            reason: credit.reason,
            source_booking_id: credit.source_booking_id,
            expires_at: credit.expires_at,
            is_expired: false,
            is_active: true,
            used_in_booking_ids: Vec::new(),
            notes: credit.notes,
            deactivation_reason: None,
            created_by: credit.created_by,
            created_at: now,
            updated_at: now,
        };
        state.credits.push(record.clone());
        Ok(record)
    }

    async fn find(&self, scope: Scope, credit_id: DbId) -> Result<Option<Credit>, CoreError> {
        tokio::task::yield_now().await;
        let state = self.lock()?;
        Ok(state
            .credits
            .iter()
            .find(|c| c.id == credit_id && scope.admits(Some(c.tenant_id)))
            .cloned())
    }

    async fn list_available(
        &self,
        scope: Scope,
        customer_id: DbId,
        only: Option<Vec<DbId>>,
        now: Timestamp,
    ) -> Result<Vec<Credit>, CoreError> {
        tokio::task::yield_now().await;
        let state = self.lock()?;
        let mut credits: Vec<Credit> = state
            .credits
            .iter()
            .filter(|c| c.customer_id == customer_id && scope.admits(Some(c.tenant_id)))
            .filter(|c| only.as_ref().map_or(true, |ids| ids.contains(&c.id)))
            .filter(|c| c.is_available_at(now))
            .cloned()
            .collect();
        super::sort_fifo(&mut credits);
        Ok(credits)
    }

    async fn list_for_customer(
        &self,
        scope: Scope,
        customer_id: DbId,
    ) -> Result<Vec<Credit>, CoreError> {
        tokio::task::yield_now().await;
        let state = self.lock()?;
        let mut credits: Vec<Credit> = state
            .credits
            .iter()
            .filter(|c| c.customer_id == customer_id && scope.admits(Some(c.tenant_id)))
            .cloned()
            .collect();
        credits.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(credits)
    }

    async fn consume(
        &self,
        scope: Scope,
        credit_id: DbId,
        take: Amount,
        booking_id: DbId,
        now: Timestamp,
    ) -> Result<Option<Amount>, CoreError> {
        tokio::task::yield_now().await;
        let mut state = self.lock()?;
        let Some(credit) = state.credits.iter_mut().find(|c| {
            c.id == credit_id
                && scope.admits(Some(c.tenant_id))
                && c.is_available_at(now)
                && c.remaining_amount >= take
        }) else {
            return Ok(None);
        };

        credit.remaining_amount -= take;
        credit.used_amount += take;
        credit.used_in_booking_ids.push(booking_id);
        credit.updated_at = now;
        Ok(Some(credit.remaining_amount))
    }

    async fn deactivate(
        &self,
        scope: Scope,
        credit_id: DbId,
        reason: Option<String>,
    ) -> Result<Option<Credit>, CoreError> {
        tokio::task::yield_now().await;
        let mut state = self.lock()?;
        let Some(credit) = state
            .credits
            .iter_mut()
            .find(|c| c.id == credit_id && scope.admits(Some(c.tenant_id)))
        else {
            return Ok(None);
        };

        credit.is_active = false;
        credit.deactivation_reason = reason;
        credit.updated_at = Utc::now();
        Ok(Some(credit.clone()))
    }

    async fn expire_due(&self, scope: Scope, now: Timestamp) -> Result<Vec<Credit>, CoreError> {
        tokio::task::yield_now().await;
        let mut state = self.lock()?;
        let mut expired = Vec::new();
        for credit in state.credits.iter_mut() {
            let due = credit.expires_at.is_some_and(|at| at <= now);
            if scope.admits(Some(credit.tenant_id))
                && due
                && !credit.is_expired
                && credit.remaining_amount > 0
            {
                credit.is_expired = true;
                credit.updated_at = now;
                expired.push(credit.clone());
            }
        }
        Ok(expired)
    }
}
