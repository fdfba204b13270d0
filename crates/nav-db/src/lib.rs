//! nav-db
//!
//! Ledger store: classified events, their correction trail, import
//! checkpoints, carry-over checkpoints and daily NAV records.
//!
//! [`LedgerStore`] is the seam; [`PgLedgerStore`] (sqlx/Postgres) is the
//! production implementation and [`MemoryLedgerStore`] serves tests and dry
//! runs. Both delegate every write decision to the pure [`plan_upsert`].

use anyhow::{Context, Result};
use sqlx::{postgres::PgPoolOptions, PgPool};

mod error;
mod memory;
mod pg;
mod plan;
mod store;

pub use error::StoreError;
pub use memory::MemoryLedgerStore;
pub use pg::PgLedgerStore;
pub use plan::{is_frozen, plan_upsert, retain_known_amounts, UpsertPlan};
pub use store::{LedgerStore, UpsertReport};

pub const ENV_DB_URL: &str = "NAV_DATABASE_URL";

/// Connect to Postgres using NAV_DATABASE_URL.
pub async fn connect_from_env() -> Result<PgPool> {
    let url = std::env::var(ENV_DB_URL).with_context(|| format!("missing env var {ENV_DB_URL}"))?;

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&url)
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
    pub has_ledger_table: bool,
}

/// Connectivity + schema presence.
pub async fn status(pool: &PgPool) -> Result<DbStatus> {
    let (one,): (i32,) = sqlx::query_as::<_, (i32,)>("select 1")
        .fetch_one(pool)
        .await
        .context("status connectivity query failed")?;

    let (exists,): (bool,) = sqlx::query_as::<_, (bool,)>(
        r#"
        select exists (
            select 1
            from information_schema.tables
            where table_schema='public' and table_name='ledger_events'
        )
        "#,
    )
    .fetch_one(pool)
    .await
    .context("status table-exists query failed")?;

    Ok(DbStatus {
        ok: one == 1,
        has_ledger_table: exists,
    })
}
