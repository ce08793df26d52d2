pub mod chat_logs;

pub use chat_logs::*;

use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};

use common::config::AppConfig;

/// Build the connection pool without dialing the database. Connections are
/// established on first acquire, so the server can start (and serve health
/// probes) before Postgres is reachable.
pub fn init_pool(config: &AppConfig) -> anyhow::Result<PgPool> {
    Ok(PgPoolOptions::new()
        .max_connections(config.pool_max_connections)
        .idle_timeout(config.pool_idle_timeout)
        .acquire_timeout(config.pool_acquire_timeout)
        .connect_lazy(&config.database_url)?)
}

pub async fn ensure_schema(pool: &PgPool) -> anyhow::Result<()> {
    for stmt in include_str!("../../migrations/001_init.sql").split(';') {
        let stmt = stmt.trim();
        if !stmt.is_empty() {
            sqlx::query(stmt).execute(pool).await?;
        }
    }
    Ok(())
}

/// Round-trip `SELECT NOW()`, used by the readiness probe.
pub async fn db_now(pool: &PgPool) -> anyhow::Result<DateTime<Utc>> {
    let row: (DateTime<Utc>,) = sqlx::query_as("SELECT NOW()").fetch_one(pool).await?;
    Ok(row.0)
}
