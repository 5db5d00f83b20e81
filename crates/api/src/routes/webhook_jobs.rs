use axum::routing::{get, post};
use axum::Router;

use crate::handlers::webhook_jobs;
use crate::state::AppState;

/// Webhook queue administration mounted at `/admin/webhook-jobs`.
///
/// ```text
/// GET  /              -> list_jobs
/// POST /{id}/replay   -> replay_job
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(webhook_jobs::list_jobs))
        .route("/{id}/replay", post(webhook_jobs::replay_job))
}
