//! Authentication, authorization, and tenant-context extractors.
//!
//! - [`auth::AuthUser`] -- Extracts the authenticated user from a JWT Bearer token.
//! - [`rbac::RequireSuperAdmin`] -- Requires the platform operator role.
//! - [`rbac::RequireAdmin`] -- Requires a tenant admin (or super-admin).
//! - [`rbac::RequireStaff`] -- Requires any staff role.
//! - [`tenant::RequestTenant`] -- Builds the request's [`TenantContext`](courtbook_core::tenant::TenantContext).

pub mod auth;
pub mod rbac;
pub mod tenant;
