//! ClickHouse client wrapper.

use crate::config::ClickHouseConfig;
use clickhouse::Client;
use engine_core::Result;
use std::time::Duration;
use tracing::info;

/// ClickHouse client bound to the configured database.
#[derive(Clone)]
pub struct ClickHouseClient {
    inner: Client,
    server: Client,
    config: ClickHouseConfig,
}

impl ClickHouseClient {
    /// Creates a new ClickHouse client.
    pub fn new(config: ClickHouseConfig) -> Result<Self> {
        if config.url.is_empty() {
            return Err(engine_core::Error::config("ClickHouse url is empty"));
        }

        let mut server = Client::default().with_url(&config.url);

        if let Some(ref user) = config.username {
            server = server.with_user(user);
        }

        if let Some(ref pass) = config.password {
            server = server.with_password(pass);
        }

        let inner = server.clone().with_database(&config.database);

        info!(
            url = %config.url,
            database = %config.database,
            "Created ClickHouse client"
        );

        Ok(Self {
            inner,
            server,
            config,
        })
    }

    /// Returns the client scoped to the configured database.
    pub fn inner(&self) -> &Client {
        &self.inner
    }

    /// Returns a client without a default database, for DDL that must run
    /// before the database exists.
    pub fn server(&self) -> &Client {
        &self.server
    }

    pub fn database(&self) -> &str {
        &self.config.database
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeout_secs)
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ClickHouseConfig {
        &self.config
    }
}
