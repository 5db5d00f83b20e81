//! Inspection and manual replay of webhook queue jobs. Super-admin only.

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use courtbook_core::audit::{self, event_types, Actor, AuditEvent};
use courtbook_core::error::CoreError;
use courtbook_core::types::DbId;
use courtbook_core::webhooks::job_status;
use courtbook_db::repositories::WebhookJobRepo;

use crate::error::{AppError, AppResult};
use crate::middleware::rbac::RequireSuperAdmin;
use crate::response::DataResponse;
use crate::state::AppState;

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 200;

#[derive(Debug, Deserialize)]
pub struct JobListParams {
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// GET /admin/webhook-jobs?status=failed
///
/// Defaults to failed jobs, the ones awaiting manual inspection.
pub async fn list_jobs(
    State(state): State<AppState>,
    RequireSuperAdmin(_admin): RequireSuperAdmin,
    Query(params): Query<JobListParams>,
) -> AppResult<impl IntoResponse> {
    let status = params.status.as_deref().unwrap_or(job_status::FAILED);
    if ![
        job_status::PENDING,
        job_status::PROCESSING,
        job_status::COMPLETED,
        job_status::FAILED,
    ]
    .contains(&status)
    {
        return Err(AppError::BadRequest(format!("Unknown job status '{status}'")));
    }

    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = params.offset.unwrap_or(0).max(0);
    let jobs = WebhookJobRepo::list_by_status(&state.pool, status, limit, offset).await?;
    Ok(Json(DataResponse { data: jobs }))
}

/// POST /admin/webhook-jobs/{id}/replay
pub async fn replay_job(
    State(state): State<AppState>,
    RequireSuperAdmin(admin): RequireSuperAdmin,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let job = WebhookJobRepo::replay(&state.pool, id)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "WebhookJob",
            id,
        })?;
    tracing::info!(job_id = id, user_id = admin.user_id, "Failed webhook job replayed");

    audit::emit(
        state.audit.as_ref(),
        AuditEvent::new(event_types::WEBHOOK_JOB_REPLAYED, None, Actor::user(Some(admin.user_id)))
            .with_entity("webhook_job", id),
    )
    .await;

    Ok(Json(DataResponse { data: job }))
}
