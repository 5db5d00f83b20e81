//! End-to-end webhook processing against Postgres.

use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Value};
use sqlx::PgPool;

use courtbook_core::audit::{event_types, MemoryAuditSink};
use courtbook_core::tenant::{Scope, SystemTask};
use courtbook_core::types::DbId;
use courtbook_core::webhooks::{job_status, NewWebhookJob, WebhookJobPayload, WebhookQueue};
use courtbook_db::models::payment::{CreatePayment, Payment};
use courtbook_db::models::tenant::CreateTenant;
use courtbook_db::repositories::{PaymentRepo, PgWebhookQueue, TenantRepo, WebhookJobRepo};
use courtbook_worker::config::WorkerConfig;
use courtbook_worker::effects::PgWebhookEffects;
use courtbook_worker::processor::WebhookProcessor;
use courtbook_worker::runner::WebhookWorker;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn seed_payment(pool: &PgPool, slug: &str, external_id: &str) -> Payment {
    let tenant = TenantRepo::create(
        pool,
        Scope::System(SystemTask::Migrations),
        &CreateTenant {
            name: slug.to_uppercase(),
            slug: slug.to_string(),
        },
    )
    .await
    .unwrap();

    PaymentRepo::create(
        pool,
        Scope::Tenant(tenant.id),
        &CreatePayment {
            tenant_id: None,
            customer_id: None,
            booking_id: None,
            provider: "mercadopago".into(),
            external_id: external_id.into(),
            amount: 5_000,
            currency: "USD".into(),
            status: "pending".into(),
        },
    )
    .await
    .unwrap()
}

async fn enqueue(pool: &PgPool, raw_payload: Value, max_attempts: i32) -> DbId {
    PgWebhookQueue::new(pool.clone())
        .enqueue(NewWebhookJob {
            payload: WebhookJobPayload {
                provider: "mercadopago".into(),
                raw_payload,
                request_id: "req-1".into(),
                received_at: Utc::now(),
            },
            max_attempts,
        })
        .await
        .unwrap()
}

fn worker(pool: &PgPool, audit: Arc<MemoryAuditSink>) -> WebhookWorker<PgWebhookEffects> {
    let config = WorkerConfig {
        retry_base_secs: 0,
        ..WorkerConfig::default()
    };
    WebhookWorker::new(
        pool.clone(),
        WebhookProcessor::new(PgWebhookEffects::new(pool.clone()), audit),
        config,
    )
}

async fn payment_status(pool: &PgPool, payment: &Payment) -> String {
    PaymentRepo::find_by_id(pool, Scope::Tenant(payment.tenant_id), payment.id)
        .await
        .unwrap()
        .unwrap()
        .status
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn approved_notification_updates_payment_in_its_tenant(pool: PgPool) {
    let payment = seed_payment(&pool, "alpha", "PAY-1").await;
    let job_id = enqueue(
        &pool,
        json!({ "type": "payment", "data": { "id": "PAY-1", "status": "approved" } }),
        3,
    )
    .await;

    let audit = Arc::new(MemoryAuditSink::new());
    let attempted = worker(&pool, audit.clone()).run_once().await.unwrap();

    assert_eq!(attempted, 1);
    assert_eq!(payment_status(&pool, &payment).await, "approved");

    let job = WebhookJobRepo::find_by_id(&pool, job_id).await.unwrap().unwrap();
    assert_eq!(job.status, job_status::COMPLETED);

    let events = audit.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, event_types::PAYMENT_STATUS_CHANGED);
    assert_eq!(events[0].tenant_id, Some(payment.tenant_id));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn duplicate_delivery_is_a_no_op(pool: PgPool) {
    let payment = seed_payment(&pool, "alpha", "PAY-1").await;
    let body = json!({
        "id": "evt-77",
        "type": "payment",
        "data": { "id": "PAY-1", "status": "approved" }
    });
    let first = enqueue(&pool, body.clone(), 3).await;
    let second = enqueue(&pool, body, 3).await;

    let audit = Arc::new(MemoryAuditSink::new());
    worker(&pool, audit.clone()).run_once().await.unwrap();

    assert_eq!(payment_status(&pool, &payment).await, "approved");
    for id in [first, second] {
        let job = WebhookJobRepo::find_by_id(&pool, id).await.unwrap().unwrap();
        assert_eq!(job.status, job_status::COMPLETED);
    }
    assert_eq!(audit.events().len(), 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn unknown_payment_is_retried_then_parked(pool: PgPool) {
    let job_id = enqueue(
        &pool,
        json!({ "type": "payment", "data": { "id": "PAY-404", "status": "approved" } }),
        2,
    )
    .await;
    let worker = worker(&pool, Arc::new(MemoryAuditSink::new()));

    worker.run_once().await.unwrap();
    let job = WebhookJobRepo::find_by_id(&pool, job_id).await.unwrap().unwrap();
    assert_eq!(job.status, job_status::PENDING);
    assert_eq!(job.attempts, 1);
    assert!(job.last_error.is_some());

    worker.run_once().await.unwrap();
    let job = WebhookJobRepo::find_by_id(&pool, job_id).await.unwrap().unwrap();
    assert_eq!(job.status, job_status::FAILED);
    assert_eq!(job.attempts, 2);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn malformed_job_fails_on_first_attempt(pool: PgPool) {
    let job_id = enqueue(
        &pool,
        json!({ "type": "payment", "data": { "id": "PAY-1", "status": "teleported" } }),
        3,
    )
    .await;

    worker(&pool, Arc::new(MemoryAuditSink::new()))
        .run_once()
        .await
        .unwrap();

    let job = WebhookJobRepo::find_by_id(&pool, job_id).await.unwrap().unwrap();
    assert_eq!(job.status, job_status::FAILED);
    assert_eq!(job.attempts, 1);
}
