use axum::extract::DefaultBodyLimit;
use axum::routing::post;
use axum::Router;

use crate::handlers::webhooks;
use crate::state::AppState;

/// Provider notifications are small; anything larger is not a notification.
const WEBHOOK_BODY_LIMIT: usize = 64 * 1024;

/// Public provider callbacks, mounted at the root (not under `/api/v1`).
///
/// ```text
/// POST /webhooks/{provider}   -> receive_webhook
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/webhooks/{provider}", post(webhooks::receive_webhook))
        .layer(DefaultBodyLimit::max(WEBHOOK_BODY_LIMIT))
}
