//! Integration tests for the scoping engine against a real database.

use assert_matches::assert_matches;
use courtbook_core::tenant::{Scope, SystemTask};
use courtbook_core::types::DbId;
use courtbook_db::models::customer::{CreateCustomer, Customer};
use courtbook_db::models::payment::{CreatePayment, Payment};
use courtbook_db::models::tenant::CreateTenant;
use courtbook_db::repositories::{CustomerRepo, PaymentRepo, TenantRepo};
use courtbook_db::scoping::{Assignment, Filter, ListOptions, ScopedRepo};
use sqlx::PgPool;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const SEED: Scope = Scope::System(SystemTask::Migrations);

async fn seed_tenant(pool: &PgPool, slug: &str) -> DbId {
    TenantRepo::create(
        pool,
        SEED,
        &CreateTenant {
            name: slug.to_uppercase(),
            slug: slug.to_string(),
        },
    )
    .await
    .unwrap()
    .id
}

async fn seed_customer(pool: &PgPool, tenant_id: DbId, name: &str) -> Customer {
    CustomerRepo::create(
        pool,
        Scope::Tenant(tenant_id),
        &CreateCustomer {
            tenant_id: None,
            name: name.to_string(),
            email: None,
        },
    )
    .await
    .unwrap()
}

fn payment(external_id: &str, amount: i64) -> CreatePayment {
    CreatePayment {
        tenant_id: None,
        customer_id: None,
        booking_id: None,
        provider: "mercadopago".into(),
        external_id: external_id.into(),
        amount,
        currency: "USD".into(),
        status: "pending".into(),
    }
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn foreign_rows_are_invisible(pool: PgPool) {
    let a = seed_tenant(&pool, "alpha").await;
    let b = seed_tenant(&pool, "beta").await;
    seed_customer(&pool, a, "Ana").await;
    let foreign = seed_customer(&pool, b, "Bruno").await;

    let found = CustomerRepo::find_by_id(&pool, Scope::Tenant(a), foreign.id).await.unwrap();
    assert!(found.is_none());

    let listed = CustomerRepo::list(&pool, Scope::Tenant(a), 100, 0).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert!(listed.iter().all(|c| c.tenant_id == a));

    let count = ScopedRepo::<Customer>::count(&pool, Scope::Tenant(a), &[]).await.unwrap();
    assert_eq!(count, 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn bypass_sees_every_tenant(pool: PgPool) {
    let a = seed_tenant(&pool, "alpha").await;
    let b = seed_tenant(&pool, "beta").await;
    seed_customer(&pool, a, "Ana").await;
    seed_customer(&pool, b, "Bruno").await;

    let all = ScopedRepo::<Customer>::find_many(
        &pool,
        Scope::Bypass { user_id: Some(1) },
        &[],
        ListOptions::default(),
    )
    .await
    .unwrap();
    assert_eq!(all.len(), 2);
}

// ---------------------------------------------------------------------------
// Writes
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn create_forces_callers_tenant(pool: PgPool) {
    let a = seed_tenant(&pool, "alpha").await;
    let b = seed_tenant(&pool, "beta").await;

    let created = CustomerRepo::create(
        &pool,
        Scope::Tenant(a),
        &CreateCustomer {
            tenant_id: Some(b),
            name: "Smuggled".into(),
            email: None,
        },
    )
    .await
    .unwrap();
    assert_eq!(created.tenant_id, a);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn create_without_tenant_context_is_rejected_by_schema(pool: PgPool) {
    let b = seed_tenant(&pool, "beta").await;
    let result = CustomerRepo::create(
        &pool,
        Scope::Missing,
        &CreateCustomer {
            tenant_id: Some(b),
            name: "Orphan".into(),
            email: None,
        },
    )
    .await;
    assert_matches!(result, Err(sqlx::Error::Database(_)));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn update_and_delete_of_foreign_id_touch_nothing(pool: PgPool) {
    let a = seed_tenant(&pool, "alpha").await;
    let b = seed_tenant(&pool, "beta").await;
    let foreign = seed_customer(&pool, b, "Bruno").await;

    let updated = ScopedRepo::<Customer>::update(
        &pool,
        Scope::Tenant(a),
        foreign.id,
        &[],
        &[Assignment::set("name", "Hijacked"), Assignment::set("tenant_id", a)],
    )
    .await
    .unwrap();
    assert!(updated.is_none());

    let deleted = ScopedRepo::<Customer>::delete(&pool, Scope::Tenant(a), foreign.id)
        .await
        .unwrap();
    assert!(!deleted);

    let still_there = CustomerRepo::find_by_id(&pool, Scope::Tenant(b), foreign.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(still_there.name, "Bruno");
    assert_eq!(still_there.tenant_id, b);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn update_cannot_move_row_to_another_tenant(pool: PgPool) {
    let a = seed_tenant(&pool, "alpha").await;
    let b = seed_tenant(&pool, "beta").await;
    let own = seed_customer(&pool, a, "Ana").await;

    let updated = ScopedRepo::<Customer>::update(
        &pool,
        Scope::Tenant(a),
        own.id,
        &[],
        &[Assignment::set("tenant_id", b), Assignment::set("name", "Ana Maria")],
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(updated.tenant_id, a);
    assert_eq!(updated.name, "Ana Maria");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn bulk_delete_matching_own_rows_spares_other_tenants(pool: PgPool) {
    let a = seed_tenant(&pool, "alpha").await;
    let b = seed_tenant(&pool, "beta").await;
    seed_customer(&pool, a, "Duplicate").await;
    seed_customer(&pool, a, "Duplicate").await;
    seed_customer(&pool, b, "Duplicate").await;

    let removed = ScopedRepo::<Customer>::delete_many(
        &pool,
        Scope::Tenant(a),
        &[Filter::eq("name", "Duplicate")],
    )
    .await
    .unwrap();
    assert_eq!(removed, 2);

    let remaining = ScopedRepo::<Customer>::count(&pool, Scope::Tenant(b), &[]).await.unwrap();
    assert_eq!(remaining, 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn bulk_update_is_confined_to_tenant(pool: PgPool) {
    let a = seed_tenant(&pool, "alpha").await;
    let b = seed_tenant(&pool, "beta").await;
    seed_customer(&pool, a, "Ana").await;
    let foreign = seed_customer(&pool, b, "Bruno").await;

    let changed = ScopedRepo::<Customer>::update_many(
        &pool,
        Scope::Tenant(a),
        &[],
        &[Assignment::set("email", Some("x@example.com".to_string()))],
    )
    .await
    .unwrap();
    assert_eq!(changed, 1);

    let untouched = CustomerRepo::find_by_id(&pool, Scope::Tenant(b), foreign.id)
        .await
        .unwrap()
        .unwrap();
    assert!(untouched.email.is_none());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn upsert_does_not_overwrite_foreign_row(pool: PgPool) {
    let a = seed_tenant(&pool, "alpha").await;
    let b = seed_tenant(&pool, "beta").await;
    PaymentRepo::create(&pool, Scope::Tenant(b), &payment("EXT-1", 1000))
        .await
        .unwrap();

    let result = ScopedRepo::<Payment>::upsert(
        &pool,
        Scope::Tenant(a),
        &payment("EXT-1", 1),
        &["provider", "external_id"],
        &["amount", "status"],
    )
    .await
    .unwrap();
    assert!(result.is_none());

    let original = PaymentRepo::find_by_external_id(&pool, "mercadopago", "EXT-1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(original.tenant_id, b);
    assert_eq!(original.amount, 1000);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn upsert_updates_own_row(pool: PgPool) {
    let a = seed_tenant(&pool, "alpha").await;
    PaymentRepo::create(&pool, Scope::Tenant(a), &payment("EXT-2", 1000))
        .await
        .unwrap();

    let mut changed = payment("EXT-2", 1500);
    changed.status = "approved".into();
    let row = ScopedRepo::<Payment>::upsert(
        &pool,
        Scope::Tenant(a),
        &changed,
        &["provider", "external_id"],
        &["amount", "status"],
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(row.amount, 1500);
    assert_eq!(row.status, "approved");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn tenant_resolution_finds_payment_across_tenants(pool: PgPool) {
    let b = seed_tenant(&pool, "beta").await;
    let created = PaymentRepo::create(&pool, Scope::Tenant(b), &payment("EXT-3", 10))
        .await
        .unwrap();

    let found = PaymentRepo::find_by_external_id(&pool, "mercadopago", "EXT-3")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, created.id);
    assert_eq!(found.tenant_id, b);

    let foreign_update =
        PaymentRepo::update_status(&pool, Scope::Tenant(b + 1), created.id, "pending", "approved")
            .await
            .unwrap();
    assert!(foreign_update.is_none());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn status_update_requires_the_expected_status(pool: PgPool) {
    let b = seed_tenant(&pool, "beta").await;
    let scope = Scope::Tenant(b);
    let created = PaymentRepo::create(&pool, scope, &payment("EXT-4", 10))
        .await
        .unwrap();

    let approved = PaymentRepo::update_status(&pool, scope, created.id, "pending", "approved")
        .await
        .unwrap();
    assert_eq!(approved.unwrap().status, "approved");

    // A second writer still expecting `pending` loses.
    let stale = PaymentRepo::update_status(&pool, scope, created.id, "pending", "rejected")
        .await
        .unwrap();
    assert!(stale.is_none());

    let stored = PaymentRepo::find_by_id(&pool, scope, created.id).await.unwrap().unwrap();
    assert_eq!(stored.status, "approved");
}
