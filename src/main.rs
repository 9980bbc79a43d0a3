//! Analytics Import Engine
//!
//! Runs the import pipeline workers:
//! - Parse stage: stream uploaded CSV exports, filter by date range and quota
//! - Insert stage: transform batches and bulk-load them into ClickHouse
//! - Daily cleanup of orphaned upload files

use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};

use clickhouse_client::{ClickHouseClient, ClickHouseConfig, ClickHouseEventStore};
use engine_core::{
    JobQueue, MeteringMode, OffsetStore, PlatformRegistry, INSERT_QUEUE, PARSE_QUEUE,
};
use import_storage::{ImportFiles, StorageConfig};
use postgres_store::{
    PgOffsetStore, PgSiteDirectory, PgStatusStore, PgSubscriptionSource, PostgresConfig,
};
use redpanda::{import_topic_configs, RedpandaConfig, RedpandaQueue};
use telemetry::{health, init_tracing_from_env};
use worker::memory_queue::DEFAULT_PARTITION_CAPACITY;
use worker::{CleanupConfig, MemoryQueue, PipelineContext, WorkerScheduler, WorkersConfig};

/// Job queue transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum QueueBackend {
    #[default]
    Redpanda,
    /// In-process channels; single-node deployments only.
    Memory,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct QueueConfig {
    #[serde(default)]
    backend: QueueBackend,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct MeteringConfig {
    /// Apply subscription quotas (cloud); off for self-hosted installs
    #[serde(default = "default_metered")]
    metered: bool,
}

fn default_metered() -> bool {
    true
}

impl Default for MeteringConfig {
    fn default() -> Self {
        Self {
            metered: default_metered(),
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Config {
    #[serde(default)]
    metering: MeteringConfig,

    #[serde(default)]
    queue: QueueConfig,

    #[serde(default)]
    redpanda: RedpandaConfig,

    #[serde(default)]
    clickhouse: ClickHouseConfig,

    /// Required; the process refuses to start without it
    #[serde(default)]
    postgres: Option<PostgresConfig>,

    #[serde(default)]
    storage: StorageConfig,

    #[serde(default)]
    workers: WorkersConfig,

    #[serde(default)]
    cleanup: CleanupConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    // rustls 0.23+ requires an explicit crypto provider before any TLS use
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("Failed to install rustls crypto provider"))?;

    dotenvy::dotenv().ok();

    init_tracing_from_env();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting Analytics Import Engine"
    );

    let config = load_config()?;
    let Some(postgres_config) = config.postgres.clone() else {
        bail!("postgres.url is required (set INGESTION_POSTGRES_URL)");
    };

    let metering = MeteringMode::from_flag(config.metering.metered);
    info!(
        metering = ?metering,
        queue = ?config.queue.backend,
        "Configuration loaded"
    );

    // Postgres: status, sites, subscriptions, queue offsets
    let pool = postgres_store::connect(&postgres_config)
        .await
        .context("Failed to connect to Postgres")?;
    if postgres_config.migrate {
        postgres_store::run_migrations(&pool)
            .await
            .context("Failed to apply Postgres migrations")?;
    }

    // ClickHouse: event store
    let clickhouse = ClickHouseClient::new(config.clickhouse.clone())
        .context("Failed to create ClickHouse client")?;
    if let Err(e) = clickhouse_client::health::init_schema(&clickhouse).await {
        error!("Failed to initialize ClickHouse schema: {}", e);
    }

    let queue = build_queue(&config, Arc::new(PgOffsetStore::new(pool.clone()))).await?;
    check_health(&config, &clickhouse, &pool).await;

    let files = ImportFiles::from_config(&config.storage).await;

    let ctx = PipelineContext {
        statuses: Arc::new(PgStatusStore::new(pool.clone())),
        sites: Arc::new(PgSiteDirectory::new(pool.clone())),
        subscriptions: Arc::new(PgSubscriptionSource::new(pool)),
        events: Arc::new(ClickHouseEventStore::new(clickhouse)),
        files,
        queue,
        platforms: Arc::new(PlatformRegistry::default()),
        metering,
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler = Arc::new(WorkerScheduler::new(
        ctx,
        config.workers.clone(),
        config.cleanup.clone(),
    ));
    let handles = scheduler.start(shutdown_rx);

    shutdown_signal().await;
    info!("Shutting down, finishing jobs in flight...");

    if shutdown_tx.send(true).is_err() {
        warn!("All workers already stopped");
    }
    for handle in handles {
        if let Err(e) = handle.await {
            error!("Worker task ended abnormally: {}", e);
        }
    }

    info!("Shutdown complete");
    Ok(())
}

async fn build_queue(config: &Config, offsets: Arc<dyn OffsetStore>) -> Result<Arc<dyn JobQueue>> {
    let parse = config.workers.parse_partitions;
    let insert = config.workers.insert_partitions;

    let queue: Arc<dyn JobQueue> = match config.queue.backend {
        QueueBackend::Redpanda => Arc::new(
            RedpandaQueue::connect(
                config.redpanda.clone(),
                import_topic_configs(parse, insert),
                offsets,
            )
            .await
            .context("Failed to connect to Redpanda")?,
        ),
        QueueBackend::Memory => Arc::new(MemoryQueue::new(
            &[(PARSE_QUEUE, parse), (INSERT_QUEUE, insert)],
            DEFAULT_PARTITION_CAPACITY,
        )),
    };
    Ok(queue)
}

/// Load configuration from files and environment.
fn load_config() -> Result<Config> {
    let config = config::Config::builder()
        // Start with defaults
        .add_source(config::Config::try_from(&Config::default())?)
        // Load from config file if exists
        .add_source(
            config::File::with_name("config/default")
                .required(false)
                .format(config::FileFormat::Toml),
        )
        // Override with environment variables
        .add_source(
            config::Environment::default()
                .separator("__")
                .prefix("INGESTION")
                .try_parsing(true),
        )
        .build()
        .context("Failed to build configuration")?;

    let mut config: Config = config
        .try_deserialize()
        .context("Failed to deserialize configuration")?;

    // The config crate's nested parsing doesn't work reliably with underscored field names
    if let Ok(brokers) = std::env::var("INGESTION_REDPANDA_BROKERS") {
        config.redpanda.brokers = brokers.split(',').map(|s| s.trim().to_string()).collect();
    }
    if let Ok(username) = std::env::var("INGESTION_REDPANDA_SASL_USERNAME") {
        config.redpanda.sasl_username = Some(username);
    }
    if let Ok(password) = std::env::var("INGESTION_REDPANDA_SASL_PASSWORD") {
        config.redpanda.sasl_password = Some(password);
    }
    if let Ok(prefix) = std::env::var("INGESTION_REDPANDA_TOPIC_PREFIX") {
        config.redpanda.topic_prefix = prefix;
    }

    if let Ok(url) = std::env::var("INGESTION_CLICKHOUSE_URL") {
        config.clickhouse.url = url;
    }
    if let Ok(database) = std::env::var("INGESTION_CLICKHOUSE_DATABASE") {
        config.clickhouse.database = database;
    }
    if let Ok(username) = std::env::var("INGESTION_CLICKHOUSE_USERNAME") {
        config.clickhouse.username = Some(username);
    }
    if let Ok(password) = std::env::var("INGESTION_CLICKHOUSE_PASSWORD") {
        config.clickhouse.password = Some(password);
    }

    if let Ok(url) = std::env::var("INGESTION_POSTGRES_URL") {
        match config.postgres {
            Some(ref mut postgres) => postgres.url = url,
            None => config.postgres = Some(PostgresConfig::new(url)),
        }
    }

    if let Ok(bucket) = std::env::var("INGESTION_STORAGE_S3_BUCKET") {
        match config.storage.s3 {
            Some(ref mut s3) => s3.bucket = bucket,
            None => config.storage.s3 = Some(import_storage::S3Config::new(bucket)),
        }
    }

    if let Ok(metered) = std::env::var("INGESTION_METERING_METERED") {
        config.metering.metered = metered == "1" || metered.eq_ignore_ascii_case("true");
    }

    Ok(config)
}

/// Check component health on startup.
async fn check_health(
    config: &Config,
    clickhouse: &ClickHouseClient,
    pool: &postgres_store::PgPool,
) {
    let queue_healthy = match config.queue.backend {
        QueueBackend::Redpanda => redpanda::health::check_connection(&config.redpanda).await,
        QueueBackend::Memory => true,
    };
    if queue_healthy {
        health().queue.set_healthy();
        info!("Job queue: healthy");
    } else {
        health().queue.set_unhealthy("Connection failed");
        error!("Job queue: unhealthy");
    }

    if clickhouse_client::health::check_connection(clickhouse).await {
        health().clickhouse.set_healthy();
        info!("ClickHouse connection: healthy");
    } else {
        health().clickhouse.set_unhealthy("Connection failed");
        error!("ClickHouse connection: unhealthy");
    }

    if postgres_store::check_connection(pool).await {
        health().postgres.set_healthy();
        info!("Postgres connection: healthy");
    } else {
        health().postgres.set_unhealthy("Connection failed");
        error!("Postgres connection: unhealthy");
    }
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received terminate signal");
        }
    }
}
