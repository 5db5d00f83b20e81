//! Tenant administration. Super-admin only.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use validator::Validate;

use courtbook_core::audit::{self, event_types, Actor, AuditEvent};
use courtbook_core::credits::validation_error;
use courtbook_db::models::tenant::CreateTenant;
use courtbook_db::repositories::TenantRepo;

use crate::error::AppResult;
use crate::middleware::rbac::RequireSuperAdmin;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /admin/tenants
pub async fn list_tenants(
    State(state): State<AppState>,
    RequireSuperAdmin(admin): RequireSuperAdmin,
) -> AppResult<impl IntoResponse> {
    let tenants = TenantRepo::list(&state.pool, admin.tenant_context().scope()).await?;
    Ok(Json(DataResponse { data: tenants }))
}

/// POST /admin/tenants
pub async fn create_tenant(
    State(state): State<AppState>,
    RequireSuperAdmin(admin): RequireSuperAdmin,
    Json(input): Json<CreateTenant>,
) -> AppResult<impl IntoResponse> {
    input.validate().map_err(validation_error)?;

    let ctx = admin.tenant_context();
    let tenant = TenantRepo::create(&state.pool, ctx.scope(), &input).await?;
    tracing::info!(tenant_id = tenant.id, slug = %tenant.slug, "Tenant created");

    audit::emit(
        state.audit.as_ref(),
        AuditEvent::new(event_types::TENANT_CREATED, None, Actor::user(ctx.user_id()))
            .with_entity("tenant", tenant.id)
            .with_metadata(serde_json::json!({ "slug": tenant.slug })),
    )
    .await;

    Ok((StatusCode::CREATED, Json(DataResponse { data: tenant })))
}
