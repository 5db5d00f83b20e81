pub mod audit;
pub mod credits;
pub mod health;
pub mod tenants;
pub mod webhook_jobs;
pub mod webhooks;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /credits                                         grant (POST, admin)
/// /credits/allocate                                allocate FIFO (POST, staff)
/// /credits/expire                                  run expiry sweep (POST, admin)
/// /credits/{id}/deactivate                         deactivate (POST, admin)
/// /credits/customers/{customer_id}/balance         available balance (GET)
/// /credits/customers/{customer_id}/history         all credits (GET)
///
/// /admin/audit-logs                                query audit log (GET, admin)
/// /admin/audit-logs/integrity-check                verify hash chain (GET, super-admin)
///
/// /admin/tenants                                   list, create (super-admin)
///
/// /admin/webhook-jobs                              list by status (GET, super-admin)
/// /admin/webhook-jobs/{id}/replay                  replay failed job (POST)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/credits", credits::router())
        .nest("/admin/audit-logs", audit::router())
        .nest("/admin/tenants", tenants::router())
        .nest("/admin/webhook-jobs", webhook_jobs::router())
}
