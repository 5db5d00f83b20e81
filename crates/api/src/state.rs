use std::sync::Arc;

use courtbook_core::audit::AuditSink;
use courtbook_core::credits::CreditLedger;
use courtbook_core::webhooks::WebhookQueue;
use courtbook_db::repositories::PgCreditStore;
use courtbook_events::EventBus;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable: every field is a pool handle or an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub pool: courtbook_db::DbPool,
    pub config: Arc<ServerConfig>,
    pub event_bus: Arc<EventBus>,
    pub audit: Arc<dyn AuditSink>,
    /// Durable queue the webhook gateway acknowledges into.
    pub webhook_queue: Arc<dyn WebhookQueue>,
    pub credit_ledger: Arc<CreditLedger<PgCreditStore>>,
}
