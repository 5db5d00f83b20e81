//! Audit log query and chain verification endpoints.
//!
//! Tenant admins see their own tenant's records; a super-admin without a
//! tenant sees every tenant. The hash chain spans all tenants, so only a
//! super-admin can verify it.

use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use courtbook_core::types::DbId;

use courtbook_db::models::audit::{AuditLogPage, AuditQuery};
use courtbook_db::repositories::AuditLogRepo;

use crate::error::AppResult;
use crate::handlers::admin_scope;
use crate::middleware::rbac::{RequireAdmin, RequireSuperAdmin};
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /admin/audit-logs
pub async fn query_audit_logs(
    State(state): State<AppState>,
    RequireAdmin(user): RequireAdmin,
    Query(params): Query<AuditQuery>,
) -> AppResult<impl IntoResponse> {
    let scope = admin_scope(&user.tenant_context())?;

    let items = AuditLogRepo::query(&state.pool, scope, &params).await?;
    let total = AuditLogRepo::count(&state.pool, scope, &params).await?;

    Ok(Json(DataResponse {
        data: AuditLogPage { items, total },
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrityCheckResult {
    pub chain_valid: bool,
    /// First entry whose stored hash does not match the recomputed one.
    pub first_break: Option<DbId>,
}

/// GET /admin/audit-logs/integrity-check
pub async fn check_integrity(
    State(state): State<AppState>,
    RequireSuperAdmin(_admin): RequireSuperAdmin,
) -> AppResult<impl IntoResponse> {
    let first_break = AuditLogRepo::verify_chain(&state.pool).await?;
    if let Some(id) = first_break {
        tracing::error!(escalate = true, security = true, audit_id = id, "Audit hash chain broken");
    }

    Ok(Json(DataResponse {
        data: IntegrityCheckResult {
            chain_valid: first_break.is_none(),
            first_break,
        },
    }))
}
