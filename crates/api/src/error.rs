use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use courtbook_core::error::CoreError;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for domain errors and adds HTTP-specific variants.
/// Implements [`IntoResponse`] to produce consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Bad request: {0}")]
    BadRequest(String),

    /// An inbound webhook failed authentication. Never retried by us.
    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Core(core) => core_parts(core),
            AppError::Database(err) => classify_sqlx_error(err),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::InvalidSignature(msg) => {
                (StatusCode::BAD_REQUEST, "INVALID_SIGNATURE", msg.clone())
            }
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                internal()
            }
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

type ErrorParts = (StatusCode, &'static str, String);

fn internal() -> ErrorParts {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "An internal error occurred".to_string(),
    )
}

fn not_found(entity: &str, id: impl std::fmt::Display) -> ErrorParts {
    (
        StatusCode::NOT_FOUND,
        "NOT_FOUND",
        format!("{entity} with id {id} not found"),
    )
}

fn core_parts(err: &CoreError) -> ErrorParts {
    match err {
        CoreError::NotFound { entity, id } => not_found(entity, id),
        // Same wire shape as a missing row so tenants cannot probe each other.
        CoreError::TenantViolation { entity, id } => {
            tracing::warn!(security = true, entity, id, "Cross-tenant access rejected");
            not_found(entity, id)
        }
        CoreError::MissingTenantContext => {
            tracing::warn!(security = true, "Request without tenant context rejected");
            (
                StatusCode::FORBIDDEN,
                "TENANT_REQUIRED",
                "This operation requires a tenant".to_string(),
            )
        }
        CoreError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
        CoreError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
        CoreError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone()),
        CoreError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg.clone()),
        CoreError::Internal(msg) => {
            tracing::error!(error = %msg, "Internal core error");
            internal()
        }
    }
}

/// Classify a sqlx error.
///
/// `RowNotFound` is a 404 and unique violations on `uq_*` constraints are a
/// 409. Anything else is logged and hidden behind a 500.
fn classify_sqlx_error(err: &sqlx::Error) -> ErrorParts {
    match err {
        sqlx::Error::RowNotFound => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            "Resource not found".to_string(),
        ),
        sqlx::Error::Database(db_err)
            if db_err.code().as_deref() == Some("23505")
                && db_err.constraint().is_some_and(|c| c.starts_with("uq_")) =>
        {
            let constraint = db_err.constraint().unwrap_or_default();
            (
                StatusCode::CONFLICT,
                "CONFLICT",
                format!("Duplicate value violates unique constraint: {constraint}"),
            )
        }
        other => {
            tracing::error!(error = %other, "Database error");
            internal()
        }
    }
}
