use axum::routing::get;
use axum::Router;

use crate::handlers::tenants;
use crate::state::AppState;

/// Tenant administration mounted at `/admin/tenants`.
///
/// ```text
/// GET  /   -> list_tenants
/// POST /   -> create_tenant
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/", get(tenants::list_tenants).post(tenants::create_tenant))
}
