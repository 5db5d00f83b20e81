//! Well-known role name constants.
//!
//! These must match the role names issued in access-token claims.

/// Platform operator. Carries no tenant and is the only role that may
/// operate across tenant boundaries.
pub const ROLE_SUPER_ADMIN: &str = "super_admin";
/// Tenant administrator.
pub const ROLE_ADMIN: &str = "admin";
/// Front-desk staff of a tenant.
pub const ROLE_STAFF: &str = "staff";
