use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use courtbook_core::credits::CreditLedger;
use courtbook_db::repositories::PgCreditStore;
use courtbook_events::{AuditPublisher, EventBus};
use courtbook_worker::config::WorkerConfig;
use courtbook_worker::effects::PgWebhookEffects;
use courtbook_worker::expiry;
use courtbook_worker::processor::WebhookProcessor;
use courtbook_worker::runner::WebhookWorker;

/// How long in-flight work gets to finish after a shutdown signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "courtbook_worker=debug,courtbook_db=info,courtbook=info".into());
    let registry = tracing_subscriber::registry().with(filter);
    if std::env::var("LOG_FORMAT").as_deref() == Ok("json") {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    // --- Configuration ---
    let config = WorkerConfig::from_env();
    let default_currency =
        std::env::var("CREDIT_DEFAULT_CURRENCY").unwrap_or_else(|_| "USD".into());
    tracing::info!(?config, "Loaded worker configuration");

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = courtbook_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    courtbook_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database connection pool created");

    // --- Services ---
    let event_bus = Arc::new(EventBus::default());
    let audit = Arc::new(AuditPublisher::new(pool.clone(), event_bus));

    let processor = WebhookProcessor::new(PgWebhookEffects::new(pool.clone()), audit.clone());
    let worker = WebhookWorker::new(pool.clone(), processor, config.clone());

    let ledger = Arc::new(CreditLedger::new(
        PgCreditStore::new(pool),
        audit,
        default_currency,
    ));

    // --- Background tasks ---
    let cancel = CancellationToken::new();

    let worker_cancel = cancel.clone();
    let worker_handle = tokio::spawn(async move {
        worker.run(worker_cancel).await;
    });

    let expiry_handle = tokio::spawn(expiry::run(
        ledger,
        config.expiry_interval,
        cancel.clone(),
    ));

    shutdown_signal().await;
    cancel.cancel();

    let joined = tokio::time::timeout(SHUTDOWN_GRACE, async {
        let _ = worker_handle.await;
        let _ = expiry_handle.await;
    })
    .await;
    if joined.is_err() {
        tracing::warn!(
            grace_secs = SHUTDOWN_GRACE.as_secs(),
            "Background tasks did not stop in time"
        );
    }

    tracing::info!("Graceful shutdown complete");
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
