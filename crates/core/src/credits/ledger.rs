//! The credit ledger service: grant, balance, FIFO allocation, deactivation
//! and expiry.
//!
//! All tenant-facing operations reject a context without a tenant before
//! touching storage; the scoping layer would otherwise run them unscoped.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use validator::Validate;

use crate::audit::{self, event_types, Actor, AuditEvent, AuditSink};
use crate::credits::store::CreditStore;
use crate::credits::{
    normalize_currency, sort_fifo, validation_error, AllocationRequest, AllocationResult, Credit,
    CreditBalance, CreditUsage, GrantCredit, NewCredit,
};
use crate::error::CoreError;
use crate::tenant::{Scope, TenantContext};
use crate::types::{Amount, DbId};

/// How many times one credit is re-read after a lost conditional update
/// before the allocation moves on to the next candidate.
const MAX_CONSUME_RETRIES: u32 = 5;

/// Ledger of customer credits over a [`CreditStore`].
pub struct CreditLedger<S> {
    store: S,
    audit: Arc<dyn AuditSink>,
    default_currency: String,
}

impl<S: CreditStore> CreditLedger<S> {
    pub fn new(store: S, audit: Arc<dyn AuditSink>, default_currency: impl Into<String>) -> Self {
        Self {
            store,
            audit,
            default_currency: default_currency.into(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Grant a credit to a customer of the caller's tenant.
    ///
    /// Fails with [`CoreError::TenantViolation`] when the customer is not
    /// visible in the caller's tenant.
    pub async fn grant(&self, ctx: &TenantContext, input: GrantCredit) -> Result<Credit, CoreError> {
        let tenant_id = ctx.require_tenant()?;
        input.validate().map_err(validation_error)?;

        if let Some(expires_at) = input.expires_at {
            if expires_at <= Utc::now() {
                return Err(CoreError::Validation(
                    "expiresAt must be in the future".into(),
                ));
            }
        }
        let currency = match input.currency.as_deref() {
            Some(code) => normalize_currency(code)?,
            None => self.default_currency.clone(),
        };

        let scope = ctx.scope();
        self.ensure_customer(scope, input.customer_id).await?;

        let credit = self
            .store
            .insert(
                scope,
                NewCredit {
                    tenant_id: Some(tenant_id),
                    customer_id: input.customer_id,
                    amount: input.amount,
                    currency,
                    reason: input.reason,
                    source_booking_id: input.source_booking_id,
                    expires_at: input.expires_at,
                    notes: input.notes,
                    created_by: ctx.user_id(),
                },
            )
            .await?;

        tracing::info!(
            tenant_id,
            customer_id = credit.customer_id,
            credit_id = credit.id,
            amount = credit.original_amount,
            reason = credit.reason.as_str(),
            "Credit granted",
        );

        audit::emit(
            self.audit.as_ref(),
            AuditEvent::from_context(event_types::CREDIT_GRANTED, ctx)
                .with_entity("credit", credit.id)
                .with_metadata(json!({
                    "customerId": credit.customer_id,
                    "amount": credit.original_amount,
                    "currency": credit.currency,
                    "reason": credit.reason.as_str(),
                    "sourceBookingId": credit.source_booking_id,
                }))
                .with_change(None, Some(snapshot(&credit))),
        )
        .await;

        Ok(credit)
    }

    /// Sum of available balance for a customer, with the credits oldest first.
    pub async fn balance(
        &self,
        ctx: &TenantContext,
        customer_id: DbId,
    ) -> Result<CreditBalance, CoreError> {
        ctx.require_tenant()?;
        let scope = ctx.scope();
        self.ensure_customer(scope, customer_id).await?;

        let now = Utc::now();
        let mut credits: Vec<Credit> = self
            .store
            .list_available(scope, customer_id, None, now)
            .await?
            .into_iter()
            .filter(|c| c.is_available_at(now))
            .collect();
        sort_fifo(&mut credits);

        let total_available = credits.iter().map(|c| c.remaining_amount).sum();
        Ok(CreditBalance {
            customer_id,
            total_available,
            credits,
        })
    }

    /// Every credit of a customer in any state, newest first.
    pub async fn history(
        &self,
        ctx: &TenantContext,
        customer_id: DbId,
    ) -> Result<Vec<Credit>, CoreError> {
        ctx.require_tenant()?;
        let scope = ctx.scope();
        self.ensure_customer(scope, customer_id).await?;
        self.store.list_for_customer(scope, customer_id).await
    }

    /// Apply available credits to `request.amount`, oldest credit first.
    ///
    /// Running out of credit is not an error: the result reports how much was
    /// applied and how much remains to be paid.
    pub async fn allocate(
        &self,
        ctx: &TenantContext,
        request: AllocationRequest,
    ) -> Result<AllocationResult, CoreError> {
        ctx.require_tenant()?;
        request.validate().map_err(validation_error)?;

        let scope = ctx.scope();
        self.ensure_customer(scope, request.customer_id).await?;

        let now = Utc::now();
        let only = request.credit_ids.clone().map(|mut ids| {
            ids.sort_unstable();
            ids.dedup();
            ids
        });

        let mut candidates: Vec<Credit> = self
            .store
            .list_available(scope, request.customer_id, only.clone(), now)
            .await?
            .into_iter()
            .filter(|c| c.is_available_at(now))
            .filter(|c| only.as_ref().map_or(true, |ids| ids.binary_search(&c.id).is_ok()))
            .collect();
        sort_fifo(&mut candidates);

        if candidates.is_empty() {
            tracing::debug!(
                customer_id = request.customer_id,
                booking_id = request.booking_id,
                "No credits available for allocation",
            );
            return Ok(AllocationResult::from_usage(request.amount, Vec::new()));
        }

        let mut owed = request.amount;
        let mut used: Vec<CreditUsage> = Vec::new();

        for candidate in candidates {
            if owed <= 0 {
                break;
            }
            if let Some(usage) = self
                .draw(scope, candidate, owed, request.booking_id)
                .await?
            {
                owed -= usage.amount_used;
                used.push(usage);
            }
        }

        let result = AllocationResult::from_usage(request.amount, used);

        tracing::info!(
            tenant_id = ?scope.tenant_id(),
            customer_id = request.customer_id,
            booking_id = request.booking_id,
            requested = request.amount,
            applied = result.amount_applied,
            remaining = result.remaining_to_pay,
            credits = result.credits_used.len(),
            "Credits allocated",
        );

        for usage in &result.credits_used {
            audit::emit(
                self.audit.as_ref(),
                AuditEvent::from_context(event_types::CREDIT_ALLOCATED, ctx)
                    .with_entity("credit", usage.credit_id)
                    .with_metadata(json!({
                        "customerId": request.customer_id,
                        "bookingId": request.booking_id,
                        "amountUsed": usage.amount_used,
                    }))
                    .with_change(
                        Some(json!({ "remainingAmount": usage.remaining_after + usage.amount_used })),
                        Some(json!({ "remainingAmount": usage.remaining_after })),
                    ),
            )
            .await;
        }

        Ok(result)
    }

    /// Take up to `owed` from one credit with the conditional update,
    /// re-reading the credit after each lost race.
    async fn draw(
        &self,
        scope: Scope,
        mut current: Credit,
        owed: Amount,
        booking_id: DbId,
    ) -> Result<Option<CreditUsage>, CoreError> {
        let mut misses = 0;
        loop {
            let take = current.remaining_amount.min(owed);
            if take <= 0 {
                return Ok(None);
            }

            let now = Utc::now();
            if let Some(remaining_after) = self
                .store
                .consume(scope, current.id, take, booking_id, now)
                .await?
            {
                return Ok(Some(CreditUsage {
                    credit_id: current.id,
                    amount_used: take,
                    remaining_after,
                }));
            }

            misses += 1;
            if misses >= MAX_CONSUME_RETRIES {
                tracing::warn!(
                    credit_id = current.id,
                    misses,
                    "Credit kept changing during allocation, skipping it",
                );
                return Ok(None);
            }

            match self.store.find(scope, current.id).await? {
                Some(fresh) if fresh.is_available_at(now) => {
                    tracing::debug!(
                        credit_id = fresh.id,
                        remaining = fresh.remaining_amount,
                        "Credit balance changed concurrently, retrying with fresh balance",
                    );
                    current = fresh;
                }
                _ => return Ok(None),
            }
        }
    }

    /// Deactivate a credit. The historical balance is preserved.
    pub async fn deactivate(
        &self,
        ctx: &TenantContext,
        credit_id: DbId,
        reason: Option<String>,
    ) -> Result<Credit, CoreError> {
        ctx.require_tenant()?;
        let scope = ctx.scope();

        let before = self
            .store
            .find(scope, credit_id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "Credit",
                id: credit_id,
            })?;

        let credit = self
            .store
            .deactivate(scope, credit_id, reason.clone())
            .await?
            .ok_or(CoreError::NotFound {
                entity: "Credit",
                id: credit_id,
            })?;

        tracing::info!(
            credit_id,
            customer_id = credit.customer_id,
            remaining = credit.remaining_amount,
            "Credit deactivated",
        );

        audit::emit(
            self.audit.as_ref(),
            AuditEvent::from_context(event_types::CREDIT_DEACTIVATED, ctx)
                .with_entity("credit", credit_id)
                .with_metadata(json!({ "reason": reason }))
                .with_change(Some(snapshot(&before)), Some(snapshot(&credit))),
        )
        .await;

        Ok(credit)
    }

    /// Flag every due credit visible under `scope` as expired.
    ///
    /// Each expired credit is audited in its own tenant. Idempotent: a
    /// second run over the same data flags nothing.
    pub async fn expire_sweep(&self, scope: Scope) -> Result<u64, CoreError> {
        let expired = self.store.expire_due(scope, Utc::now()).await?;

        if expired.is_empty() {
            tracing::debug!(scope = scope.label(), "No credits due for expiry");
            return Ok(0);
        }
        tracing::info!(expired = expired.len(), scope = scope.label(), "Credits expired");

        let actor = match scope {
            Scope::System(task) => Actor::system(task.as_str()),
            Scope::Bypass { user_id } => Actor::user(user_id),
            _ => Actor::system("expiry_sweep"),
        };
        for credit in &expired {
            let before = Credit {
                is_expired: false,
                ..credit.clone()
            };
            audit::emit(
                self.audit.as_ref(),
                AuditEvent::new(event_types::CREDIT_EXPIRED, Some(credit.tenant_id), actor.clone())
                    .with_entity("credit", credit.id)
                    .with_metadata(json!({
                        "customerId": credit.customer_id,
                        "expiredAmount": credit.remaining_amount,
                        "expiresAt": credit.expires_at,
                    }))
                    .with_change(Some(snapshot(&before)), Some(snapshot(credit))),
            )
            .await;
        }

        Ok(expired.len() as u64)
    }

    async fn ensure_customer(&self, scope: Scope, customer_id: DbId) -> Result<(), CoreError> {
        if self.store.customer_in_scope(scope, customer_id).await? {
            Ok(())
        } else {
            Err(CoreError::TenantViolation {
                entity: "Customer",
                id: customer_id,
            })
        }
    }
}

fn snapshot(credit: &Credit) -> serde_json::Value {
    json!({
        "remainingAmount": credit.remaining_amount,
        "usedAmount": credit.used_amount,
        "isActive": credit.is_active,
        "isExpired": credit.is_expired,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::MemoryAuditSink;
    use crate::credits::{CreditReason, MemoryCreditStore};
    use crate::tenant::SystemTask;
    use assert_matches::assert_matches;
    use chrono::Duration;

    const TENANT_A: DbId = 1;
    const TENANT_B: DbId = 2;
    const CUSTOMER_A: DbId = 10;
    const CUSTOMER_B: DbId = 20;

    fn setup() -> (CreditLedger<MemoryCreditStore>, Arc<MemoryAuditSink>) {
        let store = MemoryCreditStore::new();
        store.add_customer(TENANT_A, CUSTOMER_A);
        store.add_customer(TENANT_B, CUSTOMER_B);
        let sink = Arc::new(MemoryAuditSink::new());
        (CreditLedger::new(store, sink.clone(), "USD"), sink)
    }

    fn ctx_a() -> TenantContext {
        TenantContext::for_tenant(TENANT_A, Some(100))
    }

    fn grant_input(customer_id: DbId, amount: Amount) -> GrantCredit {
        GrantCredit {
            customer_id,
            amount,
            reason: CreditReason::Manual,
            currency: None,
            source_booking_id: None,
            expires_at: None,
            notes: None,
        }
    }

    fn allocation(amount: Amount, credit_ids: Option<Vec<DbId>>) -> AllocationRequest {
        AllocationRequest {
            customer_id: CUSTOMER_A,
            booking_id: 500,
            amount,
            credit_ids,
        }
    }

    /// Seed credits with strictly increasing creation times.
    fn seed_fifo(ledger: &CreditLedger<MemoryCreditStore>, amounts: &[Amount]) -> Vec<DbId> {
        let base = Utc::now() - Duration::hours(1);
        amounts
            .iter()
            .enumerate()
            .map(|(i, amount)| {
                ledger.store().seed(TENANT_A, CUSTOMER_A, *amount, base + Duration::minutes(i as i64), None)
            })
            .collect()
    }

    // -- grant ---------------------------------------------------------------

    #[tokio::test]
    async fn grant_sets_remaining_to_original() {
        let (ledger, sink) = setup();
        let credit = ledger.grant(&ctx_a(), grant_input(CUSTOMER_A, 250)).await.unwrap();

        assert_eq!(credit.tenant_id, TENANT_A);
        assert_eq!(credit.original_amount, 250);
        assert_eq!(credit.remaining_amount, 250);
        assert_eq!(credit.used_amount, 0);
        assert_eq!(credit.currency, "USD");
        assert_eq!(credit.created_by, Some(100));
        assert_eq!(sink.events()[0].event_type, event_types::CREDIT_GRANTED);
        assert_eq!(sink.events()[0].tenant_id, Some(TENANT_A));
    }

    #[tokio::test]
    async fn grant_to_foreign_customer_is_a_tenant_violation() {
        let (ledger, sink) = setup();
        let err = ledger
            .grant(&ctx_a(), grant_input(CUSTOMER_B, 50))
            .await
            .unwrap_err();
        assert_matches!(err, CoreError::TenantViolation { entity: "Customer", id: CUSTOMER_B });
        assert!(sink.events().is_empty());
    }

    #[tokio::test]
    async fn grant_without_tenant_is_rejected() {
        let (ledger, _) = setup();
        let err = ledger
            .grant(&TenantContext::anonymous(Some(1)), grant_input(CUSTOMER_A, 50))
            .await
            .unwrap_err();
        assert_matches!(err, CoreError::MissingTenantContext);

        let err = ledger
            .grant(&TenantContext::super_admin(1), grant_input(CUSTOMER_A, 50))
            .await
            .unwrap_err();
        assert_matches!(err, CoreError::MissingTenantContext);
    }

    #[tokio::test]
    async fn grant_rejects_past_expiry_and_bad_currency() {
        let (ledger, _) = setup();
        let mut input = grant_input(CUSTOMER_A, 50);
        input.expires_at = Some(Utc::now() - Duration::days(1));
        assert_matches!(
            ledger.grant(&ctx_a(), input).await,
            Err(CoreError::Validation(_))
        );

        let mut input = grant_input(CUSTOMER_A, 50);
        input.currency = Some("12$".into());
        assert_matches!(
            ledger.grant(&ctx_a(), input).await,
            Err(CoreError::Validation(_))
        );
    }

    // -- balance -------------------------------------------------------------

    #[tokio::test]
    async fn balance_excludes_inactive_and_expired_credits() {
        let (ledger, _) = setup();
        let ids = seed_fifo(&ledger, &[100, 50, 30]);
        ledger.store().seed(
            TENANT_A,
            CUSTOMER_A,
            999,
            Utc::now() - Duration::hours(2),
            Some(Utc::now() - Duration::minutes(1)),
        );
        ledger.deactivate(&ctx_a(), ids[1], None).await.unwrap();

        let balance = ledger.balance(&ctx_a(), CUSTOMER_A).await.unwrap();
        assert_eq!(balance.total_available, 130);
        let listed: Vec<DbId> = balance.credits.iter().map(|c| c.id).collect();
        assert_eq!(listed, vec![ids[0], ids[2]]);
    }

    #[tokio::test]
    async fn balance_of_foreign_customer_is_hidden() {
        let (ledger, _) = setup();
        ledger.store().seed(TENANT_B, CUSTOMER_B, 70, Utc::now(), None);
        assert_matches!(
            ledger.balance(&ctx_a(), CUSTOMER_B).await,
            Err(CoreError::TenantViolation { .. })
        );
    }

    // -- allocate ------------------------------------------------------------

    #[tokio::test]
    async fn allocation_consumes_oldest_credits_first() {
        let (ledger, _) = setup();
        let ids = seed_fifo(&ledger, &[100, 50, 30]);

        let result = ledger.allocate(&ctx_a(), allocation(120, None)).await.unwrap();

        assert!(result.success);
        assert_eq!(result.amount_applied, 120);
        assert_eq!(result.remaining_to_pay, 0);
        assert_eq!(
            result.credits_used,
            vec![
                CreditUsage { credit_id: ids[0], amount_used: 100, remaining_after: 0 },
                CreditUsage { credit_id: ids[1], amount_used: 20, remaining_after: 30 },
            ]
        );

        let store = ledger.store();
        let first = store.get(ids[0]).unwrap();
        let second = store.get(ids[1]).unwrap();
        let third = store.get(ids[2]).unwrap();
        assert_eq!(first.remaining_amount, 0);
        assert_eq!(second.remaining_amount, 30);
        assert_eq!(third.remaining_amount, 30);
        assert_eq!(third.used_amount, 0);
        assert_eq!(first.used_in_booking_ids, vec![500]);
        assert!(third.used_in_booking_ids.is_empty());
        assert!(first.is_conserved() && second.is_conserved() && third.is_conserved());
    }

    #[tokio::test]
    async fn allocation_beyond_available_is_partial() {
        let (ledger, _) = setup();
        let ids = seed_fifo(&ledger, &[100, 50, 30]);

        let result = ledger.allocate(&ctx_a(), allocation(500, None)).await.unwrap();

        assert!(result.success);
        assert_eq!(result.amount_applied, 180);
        assert_eq!(result.remaining_to_pay, 320);
        for id in ids {
            let credit = ledger.store().get(id).unwrap();
            assert_eq!(credit.remaining_amount, 0);
            assert!(credit.is_conserved());
        }
    }

    #[tokio::test]
    async fn allocation_without_credits_is_a_normal_failure_result() {
        let (ledger, sink) = setup();
        let result = ledger.allocate(&ctx_a(), allocation(75, None)).await.unwrap();
        assert!(!result.success);
        assert_eq!(result.amount_applied, 0);
        assert_eq!(result.remaining_to_pay, 75);
        assert!(result.credits_used.is_empty());
        assert!(sink.events().is_empty());
    }

    #[tokio::test]
    async fn allocation_restricted_to_specific_credits() {
        let (ledger, _) = setup();
        let ids = seed_fifo(&ledger, &[100, 50, 30]);

        let result = ledger
            .allocate(&ctx_a(), allocation(60, Some(vec![ids[2], ids[1], ids[2]])))
            .await
            .unwrap();

        assert_eq!(result.amount_applied, 60);
        let used: Vec<DbId> = result.credits_used.iter().map(|u| u.credit_id).collect();
        assert_eq!(used, vec![ids[1], ids[2]]);
        assert_eq!(ledger.store().get(ids[0]).unwrap().remaining_amount, 100);
        assert_eq!(ledger.store().get(ids[1]).unwrap().remaining_amount, 0);
        assert_eq!(ledger.store().get(ids[2]).unwrap().remaining_amount, 20);
    }

    #[tokio::test]
    async fn allocation_never_touches_foreign_credits() {
        let (ledger, _) = setup();
        let foreign = ledger.store().seed(TENANT_B, CUSTOMER_B, 500, Utc::now(), None);
        seed_fifo(&ledger, &[40]);

        let result = ledger
            .allocate(&ctx_a(), allocation(100, Some(vec![foreign])))
            .await
            .unwrap();
        assert_eq!(result.amount_applied, 0);
        assert_eq!(ledger.store().get(foreign).unwrap().remaining_amount, 500);
    }

    #[tokio::test]
    async fn concurrent_allocations_never_overdraw() {
        let (ledger, _) = setup();
        let ids = seed_fifo(&ledger, &[100]);
        let (first, second) = (ctx_a(), ctx_a());

        let (a, b) = tokio::join!(
            ledger.allocate(&first, allocation(60, None)),
            ledger.allocate(&second, allocation(60, None)),
        );
        let total = a.unwrap().amount_applied + b.unwrap().amount_applied;

        assert!(total <= 100, "allocated {total} from a balance of 100");
        let credit = ledger.store().get(ids[0]).unwrap();
        assert!(credit.remaining_amount >= 0);
        assert!(credit.is_conserved());
        assert_eq!(credit.used_amount, total);
    }

    #[tokio::test]
    async fn conservation_holds_across_repeated_allocations() {
        let (ledger, _) = setup();
        let ids = seed_fifo(&ledger, &[35, 20, 45]);
        for amount in [10, 30, 7, 100] {
            ledger.allocate(&ctx_a(), allocation(amount, None)).await.unwrap();
            for id in &ids {
                assert!(ledger.store().get(*id).unwrap().is_conserved());
            }
        }
    }

    // -- deactivate ----------------------------------------------------------

    #[tokio::test]
    async fn deactivate_preserves_balance() {
        let (ledger, sink) = setup();
        let ids = seed_fifo(&ledger, &[80]);
        let credit = ledger
            .deactivate(&ctx_a(), ids[0], Some("customer left".into()))
            .await
            .unwrap();
        assert!(!credit.is_active);
        assert_eq!(credit.remaining_amount, 80);
        assert_eq!(credit.deactivation_reason.as_deref(), Some("customer left"));
        assert_eq!(sink.events()[0].event_type, event_types::CREDIT_DEACTIVATED);
    }

    #[tokio::test]
    async fn deactivate_foreign_credit_reports_not_found() {
        let (ledger, _) = setup();
        let foreign = ledger.store().seed(TENANT_B, CUSTOMER_B, 10, Utc::now(), None);
        assert_matches!(
            ledger.deactivate(&ctx_a(), foreign, None).await,
            Err(CoreError::NotFound { .. })
        );
        assert!(ledger.store().get(foreign).unwrap().is_active);
    }

    // -- expiry --------------------------------------------------------------

    #[tokio::test]
    async fn expire_sweep_is_idempotent() {
        let (ledger, _) = setup();
        let past = Some(Utc::now() - Duration::minutes(5));
        ledger.store().seed(TENANT_A, CUSTOMER_A, 10, Utc::now(), past);
        ledger.store().seed(TENANT_B, CUSTOMER_B, 10, Utc::now(), past);
        let fresh = ledger.store().seed(TENANT_A, CUSTOMER_A, 10, Utc::now(), None);

        let scope = Scope::System(SystemTask::CreditExpirySweep);
        assert_eq!(ledger.expire_sweep(scope).await.unwrap(), 2);
        assert_eq!(ledger.expire_sweep(scope).await.unwrap(), 0);
        assert!(!ledger.store().get(fresh).unwrap().is_expired);
    }

    #[tokio::test]
    async fn system_sweep_audits_each_credit_in_its_own_tenant() {
        let (ledger, sink) = setup();
        let past = Some(Utc::now() - Duration::minutes(5));
        let in_a = ledger.store().seed(TENANT_A, CUSTOMER_A, 15, Utc::now(), past);
        let in_b = ledger.store().seed(TENANT_B, CUSTOMER_B, 25, Utc::now(), past);

        let scope = Scope::System(SystemTask::CreditExpirySweep);
        assert_eq!(ledger.expire_sweep(scope).await.unwrap(), 2);

        let mut audited: Vec<(Option<DbId>, Option<String>)> = sink
            .events()
            .iter()
            .filter(|e| e.event_type == event_types::CREDIT_EXPIRED)
            .map(|e| (e.tenant_id, e.entity.id.clone()))
            .collect();
        audited.sort();
        assert_eq!(
            audited,
            vec![
                (Some(TENANT_A), Some(in_a.to_string())),
                (Some(TENANT_B), Some(in_b.to_string())),
            ]
        );

        let event = sink
            .events()
            .into_iter()
            .find(|e| e.tenant_id == Some(TENANT_B))
            .unwrap();
        assert_eq!(event.entity.entity_type, "credit");
        assert_eq!(event.metadata["expiredAmount"], 25);
        assert_eq!(event.before.as_ref().unwrap()["isExpired"], false);
        assert_eq!(event.after.as_ref().unwrap()["isExpired"], true);
    }

    #[tokio::test]
    async fn empty_sweep_emits_nothing() {
        let (ledger, sink) = setup();
        let scope = Scope::System(SystemTask::CreditExpirySweep);
        assert_eq!(ledger.expire_sweep(scope).await.unwrap(), 0);
        assert!(sink.events().is_empty());
    }

    #[tokio::test]
    async fn tenant_scoped_sweep_only_expires_own_credits() {
        let (ledger, _) = setup();
        let past = Some(Utc::now() - Duration::minutes(5));
        let own = ledger.store().seed(TENANT_A, CUSTOMER_A, 10, Utc::now(), past);
        let foreign = ledger.store().seed(TENANT_B, CUSTOMER_B, 10, Utc::now(), past);

        assert_eq!(ledger.expire_sweep(Scope::Tenant(TENANT_A)).await.unwrap(), 1);
        assert!(ledger.store().get(own).unwrap().is_expired);
        assert!(!ledger.store().get(foreign).unwrap().is_expired);
    }

    #[tokio::test]
    async fn exhausted_credits_are_not_flagged_expired() {
        let (ledger, _) = setup();
        let id = ledger.store().seed(
            TENANT_A,
            CUSTOMER_A,
            0,
            Utc::now(),
            Some(Utc::now() - Duration::minutes(5)),
        );
        let scope = Scope::System(SystemTask::CreditExpirySweep);
        assert_eq!(ledger.expire_sweep(scope).await.unwrap(), 0);
        assert!(!ledger.store().get(id).unwrap().is_expired);
    }
}
