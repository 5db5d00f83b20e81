use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use courtbook_api::config::ServerConfig;
use courtbook_api::router::build_app_router;
use courtbook_api::state::AppState;
use courtbook_core::credits::CreditLedger;
use courtbook_db::repositories::{PgCreditStore, PgWebhookQueue};
use courtbook_events::{AuditPublisher, EventBus, RejectionMonitor};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "courtbook_api=debug,courtbook_db=info,courtbook=info,tower_http=debug".into()
    });
    let registry = tracing_subscriber::registry().with(filter);
    if std::env::var("LOG_FORMAT").as_deref() == Ok("json") {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = courtbook_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    courtbook_db::health_check(&pool)
        .await
        .expect("Database health check failed");

    courtbook_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    // --- Event bus and audit ---
    let event_bus = Arc::new(EventBus::default());
    let audit = Arc::new(AuditPublisher::new(pool.clone(), Arc::clone(&event_bus)));

    let monitor = RejectionMonitor::new(
        chrono::Duration::seconds(config.webhooks.rejection_window_secs),
        config.webhooks.rejection_alert_threshold,
    );
    tokio::spawn(monitor.run(event_bus.subscribe()));
    tracing::info!("Webhook rejection monitor started");

    // --- Domain services ---
    let credit_ledger = Arc::new(CreditLedger::new(
        PgCreditStore::new(pool.clone()),
        audit.clone(),
        config.default_currency.clone(),
    ));

    let state = AppState {
        pool: pool.clone(),
        config: Arc::new(config.clone()),
        event_bus: Arc::clone(&event_bus),
        audit,
        webhook_queue: Arc::new(PgWebhookQueue::new(pool)),
        credit_ledger,
    };

    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

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
