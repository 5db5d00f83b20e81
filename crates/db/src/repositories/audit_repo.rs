//! Repository for the append-only `audit_logs` table.

use sqlx::{PgExecutor, PgPool};

use courtbook_core::audit::compute_integrity_hash;
use courtbook_core::tenant::{Scope, SystemTask};
use courtbook_core::types::DbId;

use crate::models::audit::{AuditLog, AuditQuery, CreateAuditLog};
use crate::scoping::{Filter, ListOptions, ScopedRepo};

/// Page size used when a query does not specify one.
const DEFAULT_LIMIT: i64 = 50;

/// Upper bound on a single page.
const MAX_LIMIT: i64 = 500;

/// Advisory lock key serializing appends to the hash chain.
const CHAIN_LOCK_KEY: i64 = 0x6175_6469_745f_6c6f;

pub struct AuditLogRepo;

impl AuditLogRepo {
    /// Append an entry, chaining its integrity hash to the latest record.
    ///
    /// The chain spans every tenant, so the previous hash is read under the
    /// system audit scope; the insert itself runs in `scope`. Reading the
    /// previous hash and inserting happen in one transaction holding
    /// [`CHAIN_LOCK_KEY`], so concurrent writers cannot fork the chain.
    pub async fn insert(
        pool: &PgPool,
        scope: Scope,
        mut entry: CreateAuditLog,
    ) -> Result<AuditLog, sqlx::Error> {
        let mut tx = pool.begin().await?;
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(CHAIN_LOCK_KEY)
            .execute(&mut *tx)
            .await?;

        let prev = Self::find_last_hash(&mut *tx).await?;
        entry.integrity_hash = Some(compute_integrity_hash(
            prev.as_deref(),
            &entry.canonical_json(),
        ));
        let row = ScopedRepo::<AuditLog>::create(&mut *tx, scope, &entry).await?;

        tx.commit().await?;
        Ok(row)
    }

    /// Integrity hash of the most recent entry of any tenant.
    async fn find_last_hash<'c, E: PgExecutor<'c>>(
        executor: E,
    ) -> Result<Option<String>, sqlx::Error> {
        let latest = ScopedRepo::<AuditLog>::find_many(
            executor,
            Scope::System(SystemTask::SystemAudit),
            &[],
            ListOptions::ordered("id DESC").page(1, 0),
        )
        .await?;
        Ok(latest.into_iter().next().and_then(|log| log.integrity_hash))
    }

    /// Walk the whole chain in insertion order and recompute every hash.
    ///
    /// Returns the id of the first entry whose stored hash does not match,
    /// or `None` when the chain is intact.
    pub async fn verify_chain(pool: &PgPool) -> Result<Option<DbId>, sqlx::Error> {
        let entries = ScopedRepo::<AuditLog>::find_many(
            pool,
            Scope::System(SystemTask::SystemAudit),
            &[],
            ListOptions::ordered("id ASC"),
        )
        .await?;

        let mut prev: Option<String> = None;
        for entry in entries {
            let expected =
                compute_integrity_hash(prev.as_deref(), &CreateAuditLog::from(&entry).canonical_json());
            if entry.integrity_hash.as_deref() != Some(expected.as_str()) {
                return Ok(Some(entry.id));
            }
            prev = entry.integrity_hash;
        }
        Ok(None)
    }

    /// Query audit logs with filtering and pagination, newest first.
    pub async fn query(
        pool: &PgPool,
        scope: Scope,
        params: &AuditQuery,
    ) -> Result<Vec<AuditLog>, sqlx::Error> {
        let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
        let offset = params.offset.unwrap_or(0).max(0);
        ScopedRepo::<AuditLog>::find_many(
            pool,
            scope,
            &build_audit_filter(params),
            ListOptions::ordered("created_at DESC, id DESC").page(limit, offset),
        )
        .await
    }

    /// Count audit logs matching the filter (for pagination metadata).
    pub async fn count(
        pool: &PgPool,
        scope: Scope,
        params: &AuditQuery,
    ) -> Result<i64, sqlx::Error> {
        ScopedRepo::<AuditLog>::count(pool, scope, &build_audit_filter(params)).await
    }
}

fn build_audit_filter(params: &AuditQuery) -> Vec<Filter> {
    let mut filters = Vec::new();
    if let Some(ref category) = params.category {
        filters.push(Filter::eq("category", category.as_str()));
    }
    if let Some(ref event_type) = params.event_type {
        filters.push(Filter::eq("event_type", event_type.as_str()));
    }
    if let Some(ref entity_type) = params.entity_type {
        filters.push(Filter::eq("entity_type", entity_type.as_str()));
    }
    if let Some(ref entity_id) = params.entity_id {
        filters.push(Filter::eq("entity_id", entity_id.as_str()));
    }
    if let Some(from) = params.from {
        filters.push(Filter::gte("created_at", from));
    }
    if let Some(to) = params.to {
        filters.push(Filter::lte("created_at", to));
    }
    filters
}
