//! Per-request tenant context.
//!
//! The context is derived from the token claims on every request and handed
//! to handlers by value. Nothing caches it between requests.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use courtbook_core::roles::ROLE_SUPER_ADMIN;
use courtbook_core::tenant::TenantContext;

use super::auth::AuthUser;
use crate::error::AppError;
use crate::state::AppState;

impl AuthUser {
    /// Build the tenant context this user acts under.
    ///
    /// A user without a tenant claim only bypasses tenant filtering when
    /// they are a super-admin. Anyone else gets a context without a tenant,
    /// which tenant-bound operations reject.
    pub fn tenant_context(&self) -> TenantContext {
        match self.tenant_id {
            Some(tenant_id) => TenantContext::for_tenant(tenant_id, Some(self.user_id)),
            None if self.role == ROLE_SUPER_ADMIN => TenantContext::super_admin(self.user_id),
            None => {
                tracing::warn!(
                    security = true,
                    user_id = self.user_id,
                    role = %self.role,
                    "Authenticated user has no tenant",
                );
                TenantContext::anonymous(Some(self.user_id))
            }
        }
    }
}

/// The tenant context of an authenticated request.
pub struct RequestTenant(pub TenantContext);

impl FromRequestParts<AppState> for RequestTenant {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        Ok(RequestTenant(user.tenant_context()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courtbook_core::roles::{ROLE_ADMIN, ROLE_STAFF};
    use courtbook_core::tenant::Scope;

    fn user(tenant_id: Option<i64>, role: &str) -> AuthUser {
        AuthUser {
            user_id: 9,
            tenant_id,
            role: role.into(),
        }
    }

    #[test]
    fn tenant_user_is_scoped_to_tenant() {
        let ctx = user(Some(3), ROLE_STAFF).tenant_context();
        assert_eq!(ctx.scope(), Scope::Tenant(3));
        assert!(!ctx.is_bypassing());
    }

    #[test]
    fn super_admin_without_tenant_bypasses() {
        let ctx = user(None, ROLE_SUPER_ADMIN).tenant_context();
        assert!(ctx.is_bypassing());
        assert_eq!(ctx.scope(), Scope::Bypass { user_id: Some(9) });
    }

    #[test]
    fn super_admin_with_tenant_acts_inside_it() {
        let ctx = user(Some(4), ROLE_SUPER_ADMIN).tenant_context();
        assert_eq!(ctx.scope(), Scope::Tenant(4));
    }

    #[test]
    fn admin_without_tenant_does_not_bypass() {
        let ctx = user(None, ROLE_ADMIN).tenant_context();
        assert!(!ctx.is_bypassing());
        assert_eq!(ctx.scope(), Scope::Missing);
    }
}
