//! Request-scoped tenant context.
//!
//! A [`TenantContext`] is built once per request by the authentication layer
//! and threaded explicitly to every data operation. It is never cached or
//! shared between requests. The data layer consumes it through [`Scope`], the
//! resolved view that decides how a query is rewritten.
//!
//! Fields are private: the only way to obtain a bypassing context is
//! [`TenantContext::super_admin`], which by construction carries no tenant.

use std::fmt;

use crate::error::CoreError;
use crate::types::DbId;

// ---------------------------------------------------------------------------
// TenantContext
// ---------------------------------------------------------------------------

/// Identity of the caller for the lifetime of one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantContext {
    tenant_id: Option<DbId>,
    user_id: Option<DbId>,
    bypass_tenant_filter: bool,
}

impl TenantContext {
    /// Context for a user acting inside `tenant_id`.
    pub fn for_tenant(tenant_id: DbId, user_id: Option<DbId>) -> Self {
        Self {
            tenant_id: Some(tenant_id),
            user_id,
            bypass_tenant_filter: false,
        }
    }

    /// Platform operator context. Has no tenant and bypasses tenant filtering.
    pub fn super_admin(user_id: DbId) -> Self {
        Self {
            tenant_id: None,
            user_id: Some(user_id),
            bypass_tenant_filter: true,
        }
    }

    /// Authenticated caller without a tenant assignment.
    ///
    /// Data access under this context is a security anomaly: the scoping
    /// engine still runs it but logs a warning, and tenant-bound operations
    /// must reject it through [`TenantContext::require_tenant`].
    pub fn anonymous(user_id: Option<DbId>) -> Self {
        Self {
            tenant_id: None,
            user_id,
            bypass_tenant_filter: false,
        }
    }

    pub fn tenant_id(&self) -> Option<DbId> {
        self.tenant_id
    }

    pub fn user_id(&self) -> Option<DbId> {
        self.user_id
    }

    pub fn is_bypassing(&self) -> bool {
        self.bypass_tenant_filter
    }

    /// Return the tenant id or fail with [`CoreError::MissingTenantContext`].
    pub fn require_tenant(&self) -> Result<DbId, CoreError> {
        self.tenant_id.ok_or(CoreError::MissingTenantContext)
    }

    /// Resolve how data access under this context must be scoped.
    pub fn scope(&self) -> Scope {
        match (self.tenant_id, self.bypass_tenant_filter) {
            (Some(tenant_id), _) => Scope::Tenant(tenant_id),
            (None, true) => Scope::Bypass {
                user_id: self.user_id,
            },
            (None, false) => Scope::Missing,
        }
    }
}

// ---------------------------------------------------------------------------
// Scope
// ---------------------------------------------------------------------------

/// Background jobs that are allowed to run without a tenant.
///
/// This is the closed list of unscoped call sites; anything not named here
/// must run under a tenant or an explicit super-admin bypass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemTask {
    /// Schema migrations and bootstrap seeding.
    Migrations,
    /// Periodic expiry of credits across all tenants.
    CreditExpirySweep,
    /// Looking up which tenant owns an externally referenced record.
    WebhookTenantResolution,
    /// Audit trail writes of system-originated events.
    SystemAudit,
}

impl SystemTask {
    pub fn as_str(&self) -> &'static str {
        match self {
            SystemTask::Migrations => "migrations",
            SystemTask::CreditExpirySweep => "credit_expiry_sweep",
            SystemTask::WebhookTenantResolution => "webhook_tenant_resolution",
            SystemTask::SystemAudit => "system_audit",
        }
    }
}

impl fmt::Display for SystemTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The resolved scoping decision for a data operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Every read and write is confined to this tenant.
    Tenant(DbId),
    /// Super-admin bypass: no tenant predicate, audited in logs.
    Bypass { user_id: Option<DbId> },
    /// No tenant and no bypass. Runs unscoped with a security warning.
    Missing,
    /// Typed exception for cross-tenant background work.
    System(SystemTask),
}

impl Scope {
    /// Tenant id that confines this scope, if any.
    pub fn tenant_id(&self) -> Option<DbId> {
        match self {
            Scope::Tenant(id) => Some(*id),
            _ => None,
        }
    }

    /// Whether rows of any tenant are visible under this scope.
    pub fn is_unrestricted(&self) -> bool {
        !matches!(self, Scope::Tenant(_))
    }

    /// Whether a row owned by `owner` is visible under this scope.
    ///
    /// Used by in-memory stores; the SQL engine expresses the same rule as a
    /// predicate.
    pub fn admits(&self, owner: Option<DbId>) -> bool {
        match self {
            Scope::Tenant(id) => owner == Some(*id),
            _ => true,
        }
    }

    /// Tenant id to stamp on a newly created row.
    ///
    /// Tenant scopes force their own id and discard `supplied`. Bypass and
    /// system scopes keep the caller's value. A missing context forces `None`
    /// so the schema's `NOT NULL` constraint rejects the insert.
    pub fn tenant_for_insert(&self, supplied: Option<DbId>) -> Option<DbId> {
        match self {
            Scope::Tenant(id) => Some(*id),
            Scope::Bypass { .. } | Scope::System(_) => supplied,
            Scope::Missing => None,
        }
    }

    /// Short label used in structured logs.
    pub fn label(&self) -> &'static str {
        match self {
            Scope::Tenant(_) => "tenant",
            Scope::Bypass { .. } => "bypass",
            Scope::Missing => "missing",
            Scope::System(_) => "system",
        }
    }
}
