//! Connection pool setup.

use std::time::Duration;

use engine_core::{Error, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{debug, error, info};

use crate::config::PostgresConfig;

/// Opens a connection pool.
pub async fn connect(config: &PostgresConfig) -> Result<PgPool> {
    if config.url.trim().is_empty() {
        return Err(Error::config("postgres.url is required"));
    }

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .connect(&config.url)
        .await
        .map_err(|e| Error::database(format!("Postgres connect error: {}", e)))?;

    info!(max_connections = config.max_connections, "Postgres connection pool established");
    Ok(pool)
}

/// Applies the bundled migrations.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| Error::database(format!("Migration error: {}", e)))?;
    debug!("Postgres migrations applied");
    Ok(())
}

/// Check Postgres connection health.
pub async fn check_connection(pool: &PgPool) -> bool {
    match sqlx::query_scalar::<_, i32>("SELECT 1").fetch_one(pool).await {
        Ok(_) => {
            debug!("Postgres connection healthy");
            true
        }
        Err(e) => {
            error!("Postgres health check failed: {}", e);
            false
        }
    }
}
