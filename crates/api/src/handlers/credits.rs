//! Handlers for the customer credit ledger.
//!
//! Every handler builds the caller's tenant context from the token and hands
//! it to [`CreditLedger`](courtbook_core::credits::CreditLedger); the ledger
//! rejects calls without a tenant.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use courtbook_core::credits::{AllocationRequest, AllocationResult, GrantCredit};
use courtbook_core::types::DbId;

use crate::error::AppResult;
use crate::handlers::admin_scope;
use crate::middleware::rbac::{RequireAdmin, RequireStaff};
use crate::middleware::tenant::RequestTenant;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct DeactivateCreditRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpirySweepResponse {
    pub expired_count: u64,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /credits
pub async fn grant_credit(
    State(state): State<AppState>,
    RequireAdmin(user): RequireAdmin,
    Json(input): Json<GrantCredit>,
) -> AppResult<impl IntoResponse> {
    let ctx = user.tenant_context();
    let credit = state.credit_ledger.grant(&ctx, input).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: credit })))
}

/// GET /credits/customers/{customer_id}/balance
pub async fn get_balance(
    State(state): State<AppState>,
    RequestTenant(ctx): RequestTenant,
    Path(customer_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let balance = state.credit_ledger.balance(&ctx, customer_id).await?;
    Ok(Json(DataResponse { data: balance }))
}

/// GET /credits/customers/{customer_id}/history
pub async fn get_history(
    State(state): State<AppState>,
    RequestTenant(ctx): RequestTenant,
    Path(customer_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let credits = state.credit_ledger.history(&ctx, customer_id).await?;
    Ok(Json(DataResponse { data: credits }))
}

/// POST /credits/allocate
///
/// Responds with the bare allocation outcome. Partial coverage is a `200`.
pub async fn allocate_credits(
    State(state): State<AppState>,
    RequireStaff(user): RequireStaff,
    Json(input): Json<AllocationRequest>,
) -> AppResult<Json<AllocationResult>> {
    let ctx = user.tenant_context();
    let result = state.credit_ledger.allocate(&ctx, input).await?;
    Ok(Json(result))
}

/// POST /credits/{id}/deactivate
pub async fn deactivate_credit(
    State(state): State<AppState>,
    RequireAdmin(user): RequireAdmin,
    Path(id): Path<DbId>,
    body: Option<Json<DeactivateCreditRequest>>,
) -> AppResult<impl IntoResponse> {
    let ctx = user.tenant_context();
    let reason = body.and_then(|Json(b)| b.reason);
    let credit = state.credit_ledger.deactivate(&ctx, id, reason).await?;
    Ok(Json(DataResponse { data: credit }))
}

/// POST /credits/expire
///
/// Runs the expiry sweep now for the caller's tenant, or for every tenant
/// when called by a super-admin without a tenant.
pub async fn run_expiry_sweep(
    State(state): State<AppState>,
    RequireAdmin(user): RequireAdmin,
) -> AppResult<impl IntoResponse> {
    let scope = admin_scope(&user.tenant_context())?;
    let expired_count = state.credit_ledger.expire_sweep(scope).await?;
    Ok(Json(DataResponse {
        data: ExpirySweepResponse { expired_count },
    }))
}
