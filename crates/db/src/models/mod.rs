//! Row structs and DTOs.
//!
//! Each submodule contains a `FromRow` entity struct matching the database
//! row, its insert DTO, and the [`ScopedEntity`](crate::scoping::ScopedEntity)
//! wiring for tenant-owned tables.

pub mod audit;
pub mod credit;
pub mod customer;
pub mod payment;
pub mod processed_event;
pub mod tenant;
pub mod webhook_job;
