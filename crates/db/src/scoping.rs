//! Tenant scoping engine.
//!
//! Every read and write against a tenant-owned table goes through
//! [`ScopedRepo`], which rewrites the statement for the caller's [`Scope`]:
//!
//! - reads, counts, updates and deletes get `tenant_id = $n` merged into
//!   their WHERE clause, so a foreign id matches zero rows;
//! - inserts have `tenant_id` forced to the caller's tenant, discarding
//!   whatever the caller supplied;
//! - SET clauses never assign `tenant_id`;
//! - upserts only update a conflicting row that belongs to the same tenant.
//!
//! Tables in [`TENANT_FREE_TABLES`] are exempt. Statements are rendered by
//! pure functions (see [`Statement`]) and then bound and executed with sqlx.

use std::marker::PhantomData;

use sqlx::postgres::PgRow;
use sqlx::{FromRow, PgExecutor, PgPool};

use courtbook_core::tenant::Scope;
use courtbook_core::types::{DbId, Timestamp};

/// Column carrying row ownership on every tenant-owned table.
pub const TENANT_COLUMN: &str = "tenant_id";

/// Tables that are not tenant-owned and are never scoped.
pub const TENANT_FREE_TABLES: &[&str] = &["tenants", "webhook_jobs", "processed_webhook_events"];

/// Log target for every scoping decision.
pub const LOG_TARGET: &str = "courtbook::scope";

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// The intercepted data operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    FindById,
    FindMany,
    Count,
    Create,
    CreateMany,
    Update,
    UpdateMany,
    Delete,
    DeleteMany,
    Upsert,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::FindById => "find_by_id",
            Operation::FindMany => "find_many",
            Operation::Count => "count",
            Operation::Create => "create",
            Operation::CreateMany => "create_many",
            Operation::Update => "update",
            Operation::UpdateMany => "update_many",
            Operation::Delete => "delete",
            Operation::DeleteMany => "delete_many",
            Operation::Upsert => "upsert",
        }
    }
}

// ---------------------------------------------------------------------------
// Bind values
// ---------------------------------------------------------------------------

/// Typed bind value for dynamically-built statements.
#[derive(Debug, Clone, PartialEq)]
pub enum BindValue {
    BigInt(i64),
    Int(i32),
    Text(String),
    Bool(bool),
    Timestamp(Timestamp),
    Json(serde_json::Value),
    BigIntArray(Vec<i64>),
    OptBigInt(Option<i64>),
    OptText(Option<String>),
    OptTimestamp(Option<Timestamp>),
    OptJson(Option<serde_json::Value>),
}

impl From<i64> for BindValue {
    fn from(v: i64) -> Self {
        BindValue::BigInt(v)
    }
}

impl From<i32> for BindValue {
    fn from(v: i32) -> Self {
        BindValue::Int(v)
    }
}

impl From<bool> for BindValue {
    fn from(v: bool) -> Self {
        BindValue::Bool(v)
    }
}

impl From<String> for BindValue {
    fn from(v: String) -> Self {
        BindValue::Text(v)
    }
}

impl From<&str> for BindValue {
    fn from(v: &str) -> Self {
        BindValue::Text(v.to_string())
    }
}

impl From<Timestamp> for BindValue {
    fn from(v: Timestamp) -> Self {
        BindValue::Timestamp(v)
    }
}

impl From<serde_json::Value> for BindValue {
    fn from(v: serde_json::Value) -> Self {
        BindValue::Json(v)
    }
}

impl From<Vec<i64>> for BindValue {
    fn from(v: Vec<i64>) -> Self {
        BindValue::BigIntArray(v)
    }
}

impl From<Option<i64>> for BindValue {
    fn from(v: Option<i64>) -> Self {
        BindValue::OptBigInt(v)
    }
}

impl From<Option<String>> for BindValue {
    fn from(v: Option<String>) -> Self {
        BindValue::OptText(v)
    }
}

impl From<Option<Timestamp>> for BindValue {
    fn from(v: Option<Timestamp>) -> Self {
        BindValue::OptTimestamp(v)
    }
}

impl From<Option<serde_json::Value>> for BindValue {
    fn from(v: Option<serde_json::Value>) -> Self {
        BindValue::OptJson(v)
    }
}

/// Bind every value of a slice onto a sqlx query, in order.
macro_rules! bind_all {
    ($query:expr, $binds:expr) => {{
        let mut q = $query;
        for value in $binds {
            q = match value {
                BindValue::BigInt(v) => q.bind(*v),
                BindValue::Int(v) => q.bind(*v),
                BindValue::Text(v) => q.bind(v.as_str()),
                BindValue::Bool(v) => q.bind(*v),
                BindValue::Timestamp(v) => q.bind(*v),
                BindValue::Json(v) => q.bind(v),
                BindValue::BigIntArray(v) => q.bind(v.as_slice()),
                BindValue::OptBigInt(v) => q.bind(*v),
                BindValue::OptText(v) => q.bind(v.as_deref()),
                BindValue::OptTimestamp(v) => q.bind(*v),
                BindValue::OptJson(v) => q.bind(v.as_ref()),
            };
        }
        q
    }};
}

// ---------------------------------------------------------------------------
// Filters and assignments
// ---------------------------------------------------------------------------

/// A single predicate on a column. Predicates are AND-ed together.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq(&'static str, BindValue),
    AnyOf(&'static str, Vec<i64>),
    Lt(&'static str, BindValue),
    Lte(&'static str, BindValue),
    Gt(&'static str, BindValue),
    Gte(&'static str, BindValue),
    IsNull(&'static str),
    /// `column IS NULL OR column > value`
    NullOrGt(&'static str, BindValue),
}

impl Filter {
    pub fn eq(column: &'static str, value: impl Into<BindValue>) -> Self {
        Filter::Eq(column, value.into())
    }

    pub fn any_of(column: &'static str, ids: Vec<i64>) -> Self {
        Filter::AnyOf(column, ids)
    }

    pub fn lt(column: &'static str, value: impl Into<BindValue>) -> Self {
        Filter::Lt(column, value.into())
    }

    pub fn lte(column: &'static str, value: impl Into<BindValue>) -> Self {
        Filter::Lte(column, value.into())
    }

    pub fn gt(column: &'static str, value: impl Into<BindValue>) -> Self {
        Filter::Gt(column, value.into())
    }

    pub fn gte(column: &'static str, value: impl Into<BindValue>) -> Self {
        Filter::Gte(column, value.into())
    }

    pub fn is_null(column: &'static str) -> Self {
        Filter::IsNull(column)
    }

    pub fn null_or_gt(column: &'static str, value: impl Into<BindValue>) -> Self {
        Filter::NullOrGt(column, value.into())
    }

    fn render(&self, builder: &mut Builder) -> String {
        match self {
            Filter::Eq(c, v) => format!("{c} = {}", builder.bind(v.clone())),
            Filter::AnyOf(c, ids) => {
                format!("{c} = ANY({})", builder.bind(BindValue::BigIntArray(ids.clone())))
            }
            Filter::Lt(c, v) => format!("{c} < {}", builder.bind(v.clone())),
            Filter::Lte(c, v) => format!("{c} <= {}", builder.bind(v.clone())),
            Filter::Gt(c, v) => format!("{c} > {}", builder.bind(v.clone())),
            Filter::Gte(c, v) => format!("{c} >= {}", builder.bind(v.clone())),
            Filter::IsNull(c) => format!("{c} IS NULL"),
            Filter::NullOrGt(c, v) => {
                format!("({c} IS NULL OR {c} > {})", builder.bind(v.clone()))
            }
        }
    }
}

/// One SET clause of an update.
#[derive(Debug, Clone, PartialEq)]
pub enum Assignment {
    Set(&'static str, BindValue),
    Increment(&'static str, BindValue),
    Decrement(&'static str, BindValue),
    /// `column = array_append(column, value)`
    Append(&'static str, BindValue),
    /// `column = NOW()`
    Now(&'static str),
}

impl Assignment {
    pub fn set(column: &'static str, value: impl Into<BindValue>) -> Self {
        Assignment::Set(column, value.into())
    }

    fn column(&self) -> &'static str {
        match self {
            Assignment::Set(c, _)
            | Assignment::Increment(c, _)
            | Assignment::Decrement(c, _)
            | Assignment::Append(c, _)
            | Assignment::Now(c) => c,
        }
    }

    fn render(&self, builder: &mut Builder) -> String {
        match self {
            Assignment::Set(c, v) => format!("{c} = {}", builder.bind(v.clone())),
            Assignment::Increment(c, v) => format!("{c} = {c} + {}", builder.bind(v.clone())),
            Assignment::Decrement(c, v) => format!("{c} = {c} - {}", builder.bind(v.clone())),
            Assignment::Append(c, v) => {
                format!("{c} = array_append({c}, {})", builder.bind(v.clone()))
            }
            Assignment::Now(c) => format!("{c} = NOW()"),
        }
    }
}

/// Ordering and paging for list reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListOptions {
    /// Trusted ORDER BY fragment, e.g. `"created_at ASC, id ASC"`.
    pub order_by: &'static str,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            order_by: "id ASC",
            limit: None,
            offset: None,
        }
    }
}

impl ListOptions {
    pub fn ordered(order_by: &'static str) -> Self {
        Self {
            order_by,
            ..Self::default()
        }
    }

    pub fn page(mut self, limit: i64, offset: i64) -> Self {
        self.limit = Some(limit);
        self.offset = Some(offset);
        self
    }
}

// ---------------------------------------------------------------------------
// Statement rendering
// ---------------------------------------------------------------------------

/// A rendered SQL statement and its bind values, in placeholder order.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub binds: Vec<BindValue>,
}

#[derive(Default)]
struct Builder {
    binds: Vec<BindValue>,
}

impl Builder {
    fn bind(&mut self, value: BindValue) -> String {
        self.binds.push(value);
        format!("${}", self.binds.len())
    }

    fn where_clause(&mut self, table: &str, scope: Scope, filters: &[Filter]) -> String {
        let mut conditions: Vec<String> = filters.iter().map(|f| f.render(self)).collect();
        if let Some(tenant_id) = scoped_tenant(table, scope) {
            conditions.push(format!("{TENANT_COLUMN} = {}", self.bind(tenant_id.into())));
        }
        if conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", conditions.join(" AND "))
        }
    }

    fn finish(self, sql: String) -> Statement {
        Statement {
            sql,
            binds: self.binds,
        }
    }
}

pub fn is_tenant_free(table: &str) -> bool {
    TENANT_FREE_TABLES.contains(&table)
}

/// Tenant id to merge into the WHERE clause, if any.
fn scoped_tenant(table: &str, scope: Scope) -> Option<DbId> {
    if is_tenant_free(table) {
        None
    } else {
        scope.tenant_id()
    }
}

pub fn render_select(
    table: &str,
    columns: &str,
    scope: Scope,
    filters: &[Filter],
    options: ListOptions,
) -> Statement {
    let mut b = Builder::default();
    let mut sql = format!(
        "SELECT {columns} FROM {table}{} ORDER BY {}",
        b.where_clause(table, scope, filters),
        options.order_by
    );
    if let Some(limit) = options.limit {
        sql.push_str(&format!(" LIMIT {}", b.bind(limit.into())));
    }
    if let Some(offset) = options.offset {
        sql.push_str(&format!(" OFFSET {}", b.bind(offset.into())));
    }
    b.finish(sql)
}

pub fn render_count(table: &str, scope: Scope, filters: &[Filter]) -> Statement {
    let mut b = Builder::default();
    let sql = format!(
        "SELECT COUNT(*)::BIGINT FROM {table}{}",
        b.where_clause(table, scope, filters)
    );
    b.finish(sql)
}

/// Render a (multi-row) INSERT.
///
/// For tenant-owned tables the tenant column is prepended to every row with
/// the value [`Scope::tenant_for_insert`] decides; any `tenant_id` the row
/// itself carries is dropped.
pub fn render_insert<R: InsertRow>(
    table: &str,
    columns: &str,
    scope: Scope,
    rows: &[R],
) -> Statement {
    let mut b = Builder::default();
    let scoped = !is_tenant_free(table);

    let mut names: Vec<&'static str> = Vec::new();
    let mut tuples: Vec<String> = Vec::with_capacity(rows.len());

    for (i, row) in rows.iter().enumerate() {
        let mut values: Vec<(&'static str, BindValue)> = row
            .values()
            .into_iter()
            .filter(|(c, _)| !scoped || *c != TENANT_COLUMN)
            .collect();
        if scoped {
            let tenant = scope.tenant_for_insert(row.tenant_id());
            values.insert(0, (TENANT_COLUMN, BindValue::OptBigInt(tenant)));
        }
        if i == 0 {
            names = values.iter().map(|(c, _)| *c).collect();
        }
        let placeholders: Vec<String> = values.into_iter().map(|(_, v)| b.bind(v)).collect();
        tuples.push(format!("({})", placeholders.join(", ")));
    }

    let sql = format!(
        "INSERT INTO {table} ({}) VALUES {} RETURNING {columns}",
        names.join(", "),
        tuples.join(", ")
    );
    b.finish(sql)
}

/// Render an UPDATE. Assignments to the tenant column are discarded.
///
/// Returns `None` when no assignment survives, since there is nothing to
/// SET.
pub fn render_update(
    table: &str,
    columns: &str,
    scope: Scope,
    filters: &[Filter],
    assignments: &[Assignment],
    returning: bool,
) -> Option<Statement> {
    let mut b = Builder::default();
    let sets: Vec<String> = permitted_assignments(table, assignments)
        .map(|a| a.render(&mut b))
        .collect();
    if sets.is_empty() {
        return None;
    }
    let mut sql = format!(
        "UPDATE {table} SET {}{}",
        sets.join(", "),
        b.where_clause(table, scope, filters)
    );
    if returning {
        sql.push_str(&format!(" RETURNING {columns}"));
    }
    Some(b.finish(sql))
}

pub fn render_delete(table: &str, scope: Scope, filters: &[Filter]) -> Statement {
    let mut b = Builder::default();
    let sql = format!(
        "DELETE FROM {table}{}",
        b.where_clause(table, scope, filters)
    );
    b.finish(sql)
}

/// Render `INSERT .. ON CONFLICT (..) DO UPDATE`.
///
/// On tenant-owned tables the conflict update is guarded so a conflicting
/// row owned by another tenant is left untouched (and nothing is returned).
pub fn render_upsert<R: InsertRow>(
    table: &str,
    columns: &str,
    scope: Scope,
    row: &R,
    conflict_columns: &[&str],
    update_columns: &[&str],
) -> Statement {
    let insert = render_insert(table, columns, scope, std::slice::from_ref(row));
    let returning = format!(" RETURNING {columns}");
    let head = insert
        .sql
        .strip_suffix(&returning)
        .unwrap_or(&insert.sql)
        .to_string();

    let sets: Vec<String> = update_columns
        .iter()
        .filter(|c| is_tenant_free(table) || **c != TENANT_COLUMN)
        .map(|c| format!("{c} = EXCLUDED.{c}"))
        .collect();

    let mut sql = format!("{head} ON CONFLICT ({})", conflict_columns.join(", "));
    if sets.is_empty() {
        // DO NOTHING would return no row for an existing match.
        sql.push_str(&format!(
            " DO UPDATE SET {c} = {table}.{c}",
            c = conflict_columns.first().copied().unwrap_or("id")
        ));
    } else {
        sql.push_str(&format!(" DO UPDATE SET {}", sets.join(", ")));
    }
    if !is_tenant_free(table) {
        sql.push_str(&format!(
            " WHERE {table}.{TENANT_COLUMN} = EXCLUDED.{TENANT_COLUMN}"
        ));
    }
    sql.push_str(&returning);

    Statement {
        sql,
        binds: insert.binds,
    }
}

fn permitted_assignments<'a>(
    table: &'a str,
    assignments: &'a [Assignment],
) -> impl Iterator<Item = &'a Assignment> + 'a {
    assignments.iter().filter(move |a| {
        let allowed = is_tenant_free(table) || a.column() != TENANT_COLUMN;
        if !allowed {
            tracing::warn!(
                target: LOG_TARGET,
                table,
                security = true,
                "Discarded assignment to tenant column",
            );
        }
        allowed
    })
}

// ---------------------------------------------------------------------------
// Scope logging
// ---------------------------------------------------------------------------

/// Emit the structured log line for one intercepted operation.
pub fn log_scope(table: &str, entity: &str, operation: Operation, scope: Scope) {
    let op = operation.as_str();
    if is_tenant_free(table) {
        tracing::trace!(target: LOG_TARGET, table, entity, operation = op, "Tenant-free data access");
        return;
    }
    match scope {
        Scope::Tenant(tenant_id) => {
            tracing::trace!(
                target: LOG_TARGET,
                table,
                entity,
                operation = op,
                tenant_id,
                "Scoped data access",
            );
        }
        Scope::Bypass { user_id } => {
            tracing::info!(
                target: LOG_TARGET,
                table,
                entity,
                operation = op,
                ?user_id,
                bypass = true,
                "Tenant filter bypassed",
            );
        }
        Scope::System(task) => {
            tracing::debug!(
                target: LOG_TARGET,
                table,
                entity,
                operation = op,
                task = task.as_str(),
                "System data access",
            );
        }
        Scope::Missing => {
            tracing::warn!(
                target: LOG_TARGET,
                table,
                entity,
                operation = op,
                security = true,
                "Data access without tenant context",
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Entity traits
// ---------------------------------------------------------------------------

/// A table row type the engine can read and write.
pub trait ScopedEntity: for<'r> FromRow<'r, PgRow> + Send + Unpin {
    const TABLE: &'static str;
    /// Entity name used in errors and logs.
    const ENTITY: &'static str;
    /// SELECT / RETURNING column list.
    const COLUMNS: &'static str;

    type New: InsertRow + Sync;
}

/// Insert payload for a [`ScopedEntity`].
pub trait InsertRow {
    /// Tenant the caller asked for. Only honored under bypass or system
    /// scopes.
    fn tenant_id(&self) -> Option<DbId> {
        None
    }

    /// Column/value pairs in a fixed order. Every row of a batch must
    /// produce the same columns.
    fn values(&self) -> Vec<(&'static str, BindValue)>;
}

// ---------------------------------------------------------------------------
// ScopedRepo
// ---------------------------------------------------------------------------

/// The ten intercepted primitives for entity `T`.
pub struct ScopedRepo<T>(PhantomData<T>);

impl<T: ScopedEntity> ScopedRepo<T> {
    pub async fn find_by_id(pool: &PgPool, scope: Scope, id: DbId) -> Result<Option<T>, sqlx::Error> {
        log_scope(T::TABLE, T::ENTITY, Operation::FindById, scope);
        let stmt = render_select(
            T::TABLE,
            T::COLUMNS,
            scope,
            &[Filter::eq("id", id)],
            ListOptions::default(),
        );
        bind_all!(sqlx::query_as::<_, T>(&stmt.sql), &stmt.binds)
            .fetch_optional(pool)
            .await
    }

    /// Accepts a pool or an open transaction.
    pub async fn find_many<'c, E: PgExecutor<'c>>(
        executor: E,
        scope: Scope,
        filters: &[Filter],
        options: ListOptions,
    ) -> Result<Vec<T>, sqlx::Error> {
        log_scope(T::TABLE, T::ENTITY, Operation::FindMany, scope);
        let stmt = render_select(T::TABLE, T::COLUMNS, scope, filters, options);
        bind_all!(sqlx::query_as::<_, T>(&stmt.sql), &stmt.binds)
            .fetch_all(executor)
            .await
    }

    pub async fn count(pool: &PgPool, scope: Scope, filters: &[Filter]) -> Result<i64, sqlx::Error> {
        log_scope(T::TABLE, T::ENTITY, Operation::Count, scope);
        let stmt = render_count(T::TABLE, scope, filters);
        bind_all!(sqlx::query_scalar::<_, i64>(&stmt.sql), &stmt.binds)
            .fetch_one(pool)
            .await
    }

    pub async fn create<'c, E: PgExecutor<'c>>(
        executor: E,
        scope: Scope,
        row: &T::New,
    ) -> Result<T, sqlx::Error> {
        log_scope(T::TABLE, T::ENTITY, Operation::Create, scope);
        let stmt = render_insert(T::TABLE, T::COLUMNS, scope, std::slice::from_ref(row));
        bind_all!(sqlx::query_as::<_, T>(&stmt.sql), &stmt.binds)
            .fetch_one(executor)
            .await
    }

    pub async fn create_many(
        pool: &PgPool,
        scope: Scope,
        rows: &[T::New],
    ) -> Result<Vec<T>, sqlx::Error> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        log_scope(T::TABLE, T::ENTITY, Operation::CreateMany, scope);
        let stmt = render_insert(T::TABLE, T::COLUMNS, scope, rows);
        bind_all!(sqlx::query_as::<_, T>(&stmt.sql), &stmt.binds)
            .fetch_all(pool)
            .await
    }

    /// Update one row by id, optionally guarded by extra conditions.
    ///
    /// Returns `None` when no row matched (missing, foreign, or guard failed).
    pub async fn update(
        pool: &PgPool,
        scope: Scope,
        id: DbId,
        guard: &[Filter],
        assignments: &[Assignment],
    ) -> Result<Option<T>, sqlx::Error> {
        log_scope(T::TABLE, T::ENTITY, Operation::Update, scope);
        let mut filters = vec![Filter::eq("id", id)];
        filters.extend_from_slice(guard);
        let Some(stmt) = render_update(T::TABLE, T::COLUMNS, scope, &filters, assignments, true)
        else {
            // Nothing to write: report the row as it stands.
            let stmt = render_select(T::TABLE, T::COLUMNS, scope, &filters, ListOptions::default());
            return bind_all!(sqlx::query_as::<_, T>(&stmt.sql), &stmt.binds)
                .fetch_optional(pool)
                .await;
        };
        bind_all!(sqlx::query_as::<_, T>(&stmt.sql), &stmt.binds)
            .fetch_optional(pool)
            .await
    }

    /// Update every matching row. Returns the number of rows affected.
    pub async fn update_many(
        pool: &PgPool,
        scope: Scope,
        filters: &[Filter],
        assignments: &[Assignment],
    ) -> Result<u64, sqlx::Error> {
        log_scope(T::TABLE, T::ENTITY, Operation::UpdateMany, scope);
        let Some(stmt) = render_update(T::TABLE, T::COLUMNS, scope, filters, assignments, false)
        else {
            return Ok(0);
        };
        let result = bind_all!(sqlx::query(&stmt.sql), &stmt.binds)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Update every matching row and return the rows as written.
    pub async fn update_many_returning(
        pool: &PgPool,
        scope: Scope,
        filters: &[Filter],
        assignments: &[Assignment],
    ) -> Result<Vec<T>, sqlx::Error> {
        log_scope(T::TABLE, T::ENTITY, Operation::UpdateMany, scope);
        let Some(stmt) = render_update(T::TABLE, T::COLUMNS, scope, filters, assignments, true)
        else {
            return Ok(Vec::new());
        };
        bind_all!(sqlx::query_as::<_, T>(&stmt.sql), &stmt.binds)
            .fetch_all(pool)
            .await
    }

    /// Delete one row by id. Returns whether a row was removed.
    pub async fn delete(pool: &PgPool, scope: Scope, id: DbId) -> Result<bool, sqlx::Error> {
        log_scope(T::TABLE, T::ENTITY, Operation::Delete, scope);
        let stmt = render_delete(T::TABLE, scope, &[Filter::eq("id", id)]);
        let result = bind_all!(sqlx::query(&stmt.sql), &stmt.binds)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_many(
        pool: &PgPool,
        scope: Scope,
        filters: &[Filter],
    ) -> Result<u64, sqlx::Error> {
        log_scope(T::TABLE, T::ENTITY, Operation::DeleteMany, scope);
        let stmt = render_delete(T::TABLE, scope, filters);
        let result = bind_all!(sqlx::query(&stmt.sql), &stmt.binds)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Insert or update on conflict. Returns `None` when the conflicting row
    /// belongs to another tenant.
    pub async fn upsert(
        pool: &PgPool,
        scope: Scope,
        row: &T::New,
        conflict_columns: &[&str],
        update_columns: &[&str],
    ) -> Result<Option<T>, sqlx::Error> {
        log_scope(T::TABLE, T::ENTITY, Operation::Upsert, scope);
        let stmt = render_upsert(
            T::TABLE,
            T::COLUMNS,
            scope,
            row,
            conflict_columns,
            update_columns,
        );
        bind_all!(sqlx::query_as::<_, T>(&stmt.sql), &stmt.binds)
            .fetch_optional(pool)
            .await
    }
}
