use axum::routing::{get, post};
use axum::Router;

use crate::handlers::credits;
use crate::state::AppState;

/// Credit ledger routes mounted at `/credits`.
///
/// ```text
/// POST /                                    -> grant_credit
/// POST /allocate                            -> allocate_credits
/// POST /expire                              -> run_expiry_sweep
/// POST /{id}/deactivate                     -> deactivate_credit
/// GET  /customers/{customer_id}/balance     -> get_balance
/// GET  /customers/{customer_id}/history     -> get_history
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(credits::grant_credit))
        .route("/allocate", post(credits::allocate_credits))
        .route("/expire", post(credits::run_expiry_sweep))
        .route("/{id}/deactivate", post(credits::deactivate_credit))
        .route("/customers/{customer_id}/balance", get(credits::get_balance))
        .route("/customers/{customer_id}/history", get(credits::get_history))
}
