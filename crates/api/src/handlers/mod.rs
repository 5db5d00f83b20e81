pub mod audit;
pub mod credits;
pub mod tenants;
pub mod webhook_jobs;
pub mod webhooks;

use courtbook_core::error::CoreError;
use courtbook_core::tenant::{Scope, TenantContext};

/// Scope for administrative reads: the caller's tenant, or every tenant for
/// a bypassing super-admin. A context without either is rejected.
pub(crate) fn admin_scope(ctx: &TenantContext) -> Result<Scope, CoreError> {
    if ctx.is_bypassing() {
        Ok(ctx.scope())
    } else {
        ctx.require_tenant().map(Scope::Tenant)
    }
}
