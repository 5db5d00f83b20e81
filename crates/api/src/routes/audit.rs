use axum::routing::get;
use axum::Router;

use crate::handlers::audit;
use crate::state::AppState;

/// Audit routes mounted at `/admin/audit-logs`.
///
/// ```text
/// GET  /                  -> query_audit_logs
/// GET  /integrity-check   -> check_integrity (super-admin)
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(audit::query_audit_logs))
        .route("/integrity-check", get(audit::check_integrity))
}
