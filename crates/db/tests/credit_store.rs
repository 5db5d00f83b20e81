//! Credit ledger running against Postgres through the scoping engine.

use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::{Duration, Utc};
use courtbook_core::audit::MemoryAuditSink;
use courtbook_core::credits::{
    AllocationRequest, CreditLedger, CreditReason, CreditStore, GrantCredit,
};
use courtbook_core::error::CoreError;
use courtbook_core::tenant::{Scope, SystemTask, TenantContext};
use courtbook_core::types::DbId;
use courtbook_db::models::customer::CreateCustomer;
use courtbook_db::models::tenant::CreateTenant;
use courtbook_db::repositories::{CustomerRepo, PgCreditStore, ProcessedEventRepo, TenantRepo};
use sqlx::PgPool;

async fn setup(pool: &PgPool) -> (CreditLedger<PgCreditStore>, DbId, DbId) {
    let tenant = TenantRepo::create(
        pool,
        Scope::System(SystemTask::Migrations),
        &CreateTenant {
            name: "Alpha".into(),
            slug: "alpha".into(),
        },
    )
    .await
    .unwrap();
    let customer = CustomerRepo::create(
        pool,
        Scope::Tenant(tenant.id),
        &CreateCustomer {
            tenant_id: None,
            name: "Ana".into(),
            email: None,
        },
    )
    .await
    .unwrap();
    let ledger = CreditLedger::new(
        PgCreditStore::new(pool.clone()),
        Arc::new(MemoryAuditSink::new()),
        "USD",
    );
    (ledger, tenant.id, customer.id)
}

fn grant(customer_id: DbId, amount: i64) -> GrantCredit {
    GrantCredit {
        customer_id,
        amount,
        reason: CreditReason::Refund,
        currency: None,
        source_booking_id: None,
        expires_at: None,
        notes: None,
    }
}

fn allocation(customer_id: DbId, amount: i64) -> AllocationRequest {
    AllocationRequest {
        customer_id,
        booking_id: 900,
        amount,
        credit_ids: None,
    }
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn fifo_allocation_persists(pool: PgPool) {
    let (ledger, tenant, customer) = setup(&pool).await;
    let ctx = TenantContext::for_tenant(tenant, Some(1));

    let mut ids = Vec::new();
    for amount in [100, 50, 30] {
        ids.push(ledger.grant(&ctx, grant(customer, amount)).await.unwrap().id);
    }

    let result = ledger.allocate(&ctx, allocation(customer, 120)).await.unwrap();
    assert_eq!(result.amount_applied, 120);
    assert_eq!(result.remaining_to_pay, 0);

    let history = ledger.history(&ctx, customer).await.unwrap();
    let by_id = |id: DbId| history.iter().find(|c| c.id == id).unwrap().clone();
    assert_eq!(by_id(ids[0]).remaining_amount, 0);
    assert_eq!(by_id(ids[1]).remaining_amount, 30);
    assert_eq!(by_id(ids[2]).remaining_amount, 30);
    assert_eq!(by_id(ids[0]).used_in_booking_ids, vec![900]);
    assert!(history.iter().all(|c| c.is_conserved()));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn concurrent_allocations_do_not_overdraw(pool: PgPool) {
    let (ledger, tenant, customer) = setup(&pool).await;
    let ctx_a = TenantContext::for_tenant(tenant, Some(1));
    let ctx_b = TenantContext::for_tenant(tenant, Some(2));
    ledger.grant(&ctx_a, grant(customer, 100)).await.unwrap();

    let (a, b) = tokio::join!(
        ledger.allocate(&ctx_a, allocation(customer, 60)),
        ledger.allocate(&ctx_b, allocation(customer, 60)),
    );
    let total = a.unwrap().amount_applied + b.unwrap().amount_applied;
    assert!(total <= 100);

    let balance = ledger.balance(&ctx_a, customer).await.unwrap();
    assert_eq!(balance.total_available, 100 - total);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn foreign_tenant_cannot_grant(pool: PgPool) {
    let (ledger, tenant, customer) = setup(&pool).await;
    let other = TenantContext::for_tenant(tenant + 1000, Some(1));
    assert_matches!(
        ledger.grant(&other, grant(customer, 10)).await,
        Err(CoreError::TenantViolation { .. })
    );
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn expiry_sweep_runs_once(pool: PgPool) {
    let (ledger, tenant, customer) = setup(&pool).await;
    let ctx = TenantContext::for_tenant(tenant, None);
    let mut input = grant(customer, 40);
    input.expires_at = Some(Utc::now() + Duration::milliseconds(200));
    ledger.grant(&ctx, input).await.unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(400)).await;

    let sweep = Scope::System(SystemTask::CreditExpirySweep);
    assert_eq!(ledger.expire_sweep(sweep).await.unwrap(), 1);
    assert_eq!(ledger.expire_sweep(sweep).await.unwrap(), 0);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn expire_due_returns_flagged_credits_with_their_tenant(pool: PgPool) {
    let (ledger, tenant, customer) = setup(&pool).await;
    let ctx = TenantContext::for_tenant(tenant, None);
    let mut input = grant(customer, 30);
    input.expires_at = Some(Utc::now() + Duration::milliseconds(200));
    let credit = ledger.grant(&ctx, input).await.unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(400)).await;

    let store = PgCreditStore::new(pool.clone());
    let expired = store
        .expire_due(Scope::System(SystemTask::CreditExpirySweep), Utc::now())
        .await
        .unwrap();
    assert_eq!(expired.len(), 1);
    assert_eq!(expired[0].id, credit.id);
    assert_eq!(expired[0].tenant_id, tenant);
    assert!(expired[0].is_expired);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn processed_event_claim_is_single_use(pool: PgPool) {
    assert!(ProcessedEventRepo::claim(&pool, "mp", "evt-1", None).await.unwrap());
    assert!(!ProcessedEventRepo::claim(&pool, "mp", "evt-1", None).await.unwrap());
    assert!(ProcessedEventRepo::claim(&pool, "other", "evt-1", None).await.unwrap());

    ProcessedEventRepo::release(&pool, "mp", "evt-1").await.unwrap();
    assert!(ProcessedEventRepo::claim(&pool, "mp", "evt-1", None).await.unwrap());
}
