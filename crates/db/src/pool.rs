//! Connection setup for the Postgres resource store.

use std::time::Duration;

use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{debug, info};

use crate::DbError;

pub type DbPool = PgPool;

/// Schema for the `resources` table, embedded at build time.
pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// Open a pool against `database_url` holding at most `max_connections`.
pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<DbPool, DbError> {
    debug!(max_connections, "opening resource store pool");
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .connect(database_url)
        .await?;
    Ok(pool)
}

/// Bring the `resources` schema up to date.
pub async fn run_migrations(pool: &DbPool) -> Result<(), DbError> {
    MIGRATOR.run(pool).await?;
    info!("resource store schema is current ({} migrations known)", MIGRATOR.iter().count());
    Ok(())
}
