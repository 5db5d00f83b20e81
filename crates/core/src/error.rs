use crate::types::DbId;

/// Domain-level error shared by every crate in the workspace.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    /// The caller's tenant does not own the target entity.
    ///
    /// Rendered to clients exactly like [`CoreError::NotFound`] so a foreign
    /// row is indistinguishable from a missing one.
    #[error("Tenant violation: {entity} with id {id} is outside the caller's tenant")]
    TenantViolation { entity: &'static str, id: DbId },

    /// The operation needs a tenant but the request context carries none.
    #[error("Tenant context required")]
    MissingTenantContext,

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
