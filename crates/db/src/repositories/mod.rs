//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&PgPool` as the first argument. Tenant-owned tables are only
//! reached through [`ScopedRepo`](crate::scoping::ScopedRepo); tenant-free
//! tables use plain queries.

pub mod audit_repo;
pub mod credit_repo;
pub mod customer_repo;
pub mod payment_repo;
pub mod processed_event_repo;
pub mod tenant_repo;
pub mod webhook_job_repo;

pub use audit_repo::AuditLogRepo;
pub use credit_repo::PgCreditStore;
pub use customer_repo::CustomerRepo;
pub use payment_repo::PaymentRepo;
pub use processed_event_repo::ProcessedEventRepo;
pub use tenant_repo::TenantRepo;
pub use webhook_job_repo::{PgWebhookQueue, WebhookJobRepo};
