//! fgr-db
//!
//! Postgres bindings: connection, bundled schema, status, lookup indexes, and
//! [`PgStore`], the store implementation the orchestrator runs against.

mod error;
mod store;

pub use error::StoreFault;
pub use sqlx::PgPool;
pub use store::{PgStore, PgWork};

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;

pub const ENV_DB_URL: &str = "FGR_DATABASE_URL";

/// Tables reconciliation reads or writes.
pub const RECONCILE_TABLES: &[&str] = &[
    "users",
    "friend_group",
    "friend_group_member",
    "friend",
    "sequence_counter",
];

/// Lookup indexes on the columns the snapshot and diff read. Performance only.
const LOOKUP_INDEXES: &[(&str, &str)] = &[
    (
        "idx_friend_group_uid_default",
        "create index if not exists idx_friend_group_uid_default on friend_group (uid, is_default)",
    ),
    (
        "idx_friend_group_id_deleted",
        "create index if not exists idx_friend_group_id_deleted on friend_group (id, is_deleted)",
    ),
    (
        "idx_fgm_uid_friend",
        "create index if not exists idx_fgm_uid_friend on friend_group_member (uid, friend_uid)",
    ),
    (
        "idx_fgm_group_deleted",
        "create index if not exists idx_fgm_group_deleted on friend_group_member (group_id, is_deleted)",
    ),
    (
        "idx_friend_uid_to_uid",
        "create index if not exists idx_friend_uid_to_uid on friend (uid, to_uid)",
    ),
    (
        "idx_friend_is_deleted",
        "create index if not exists idx_friend_is_deleted on friend (is_deleted)",
    ),
    (
        "idx_friend_group_id",
        "create index if not exists idx_friend_group_id on friend (friend_group_id)",
    ),
];

/// Connect to Postgres using FGR_DATABASE_URL.
pub async fn connect_from_env() -> Result<PgPool> {
    let url = std::env::var(ENV_DB_URL).with_context(|| format!("missing env var {ENV_DB_URL}"))?;
    connect(&url, 4).await
}

pub async fn connect(url: &str, max_connections: u32) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(url)
        .await
        .context("failed to connect to Postgres")?;
    Ok(pool)
}

/// Run embedded SQLx migrations.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("db migrate failed")?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct DbStatus {
    pub ok: bool,
    pub missing_tables: Vec<String>,
}

impl DbStatus {
    pub fn schema_ready(&self) -> bool {
        self.ok && self.missing_tables.is_empty()
    }
}

/// Connectivity plus presence of every table in [`RECONCILE_TABLES`].
pub async fn status(pool: &PgPool) -> Result<DbStatus> {
    let (one,): (i32,) = sqlx::query_as::<_, (i32,)>("select 1")
        .fetch_one(pool)
        .await
        .context("status connectivity query failed")?;

    let names: Vec<String> = RECONCILE_TABLES.iter().map(|s| s.to_string()).collect();
    let present: Vec<(String,)> = sqlx::query_as(
        r#"
        select table_name::text
        from information_schema.tables
        where table_schema = current_schema()
          and table_name = any($1)
        "#,
    )
    .bind(&names)
    .fetch_all(pool)
    .await
    .context("status table-exists query failed")?;

    let missing_tables = names
        .into_iter()
        .filter(|n| !present.iter().any(|(p,)| p == n))
        .collect();

    Ok(DbStatus {
        ok: one == 1,
        missing_tables,
    })
}

/// Create the lookup indexes that do not exist yet. Returns every index name
/// checked, in creation order.
pub async fn ensure_indexes(pool: &PgPool) -> Result<Vec<&'static str>> {
    let mut done = Vec::with_capacity(LOOKUP_INDEXES.len());
    for &(name, ddl) in LOOKUP_INDEXES {
        sqlx::query(ddl)
            .execute(pool)
            .await
            .with_context(|| format!("create index {name} failed"))?;
        tracing::debug!(index = name, "index ensured");
        done.push(name);
    }
    Ok(done)
}
