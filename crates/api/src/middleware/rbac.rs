//! Role-based access control (RBAC) extractors.
//!
//! Each extractor wraps [`AuthUser`] and rejects requests whose role does not
//! meet the minimum requirement.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use courtbook_core::error::CoreError;
use courtbook_core::roles::{ROLE_ADMIN, ROLE_STAFF, ROLE_SUPER_ADMIN};

use super::auth::AuthUser;
use crate::error::AppError;
use crate::state::AppState;

fn require_role(user: &AuthUser, allowed: &[&str], message: &str) -> Result<(), AppError> {
    if allowed.contains(&user.role.as_str()) {
        Ok(())
    } else {
        Err(AppError::Core(CoreError::Forbidden(message.into())))
    }
}

/// Requires the `super_admin` role. Rejects with 403 Forbidden otherwise.
pub struct RequireSuperAdmin(pub AuthUser);

impl FromRequestParts<AppState> for RequireSuperAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        require_role(&user, &[ROLE_SUPER_ADMIN], "Super-admin role required")?;
        Ok(RequireSuperAdmin(user))
    }
}

/// Requires `admin` or `super_admin`.
pub struct RequireAdmin(pub AuthUser);

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        require_role(&user, &[ROLE_ADMIN, ROLE_SUPER_ADMIN], "Admin role required")?;
        Ok(RequireAdmin(user))
    }
}

/// Requires `staff`, `admin`, or `super_admin`.
pub struct RequireStaff(pub AuthUser);

impl FromRequestParts<AppState> for RequireStaff {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        require_role(
            &user,
            &[ROLE_STAFF, ROLE_ADMIN, ROLE_SUPER_ADMIN],
            "Staff role required",
        )?;
        Ok(RequireStaff(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn user(role: &str) -> AuthUser {
        AuthUser {
            user_id: 1,
            tenant_id: Some(1),
            role: role.into(),
        }
    }

    #[test]
    fn staff_cannot_pass_admin_check() {
        assert_matches!(
            require_role(&user(ROLE_STAFF), &[ROLE_ADMIN, ROLE_SUPER_ADMIN], "Admin role required"),
            Err(AppError::Core(CoreError::Forbidden(_)))
        );
    }

    #[test]
    fn admin_passes_staff_check() {
        assert!(require_role(&user(ROLE_ADMIN), &[ROLE_STAFF, ROLE_ADMIN], "x").is_ok());
    }
}
