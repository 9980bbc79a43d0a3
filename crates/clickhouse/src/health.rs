//! ClickHouse health checks.

use crate::client::ClickHouseClient;
use crate::schema::all_statements;
use engine_core::{Error, Result};
use tracing::{debug, error};

/// Check ClickHouse connection health.
pub async fn check_connection(client: &ClickHouseClient) -> bool {
    match client.server().query("SELECT 1").fetch_one::<u8>().await {
        Ok(_) => {
            debug!("ClickHouse connection healthy");
            true
        }
        Err(e) => {
            error!("ClickHouse health check failed: {}", e);
            false
        }
    }
}

/// Creates the database and events table if missing.
pub async fn init_schema(client: &ClickHouseClient) -> Result<()> {
    for ddl in all_statements(client.database()) {
        client
            .server()
            .query(&ddl)
            .execute()
            .await
            .map_err(|e| Error::database(format!("Failed to execute DDL: {}", e)))?;
    }

    debug!(database = %client.database(), "ClickHouse schema initialized");
    Ok(())
}
