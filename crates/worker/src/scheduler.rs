//! Starts the partition workers and the periodic tasks.

use std::sync::Arc;
use std::time::Duration;

use engine_core::{INSERT_QUEUE, PARSE_QUEUE};
use serde::{Deserialize, Serialize};
use telemetry::metrics;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::info;

use crate::cleanup::OrphanSweep;
use crate::context::PipelineContext;
use crate::insert::InsertStage;
use crate::parse::ParseStage;
use crate::pool::PartitionWorker;

/// Worker pool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkersConfig {
    /// Partitions, and therefore workers, of the parse queue.
    pub parse_partitions: u32,
    /// Partitions, and therefore workers, of the insert queue.
    pub insert_partitions: u32,
    /// Metrics snapshot log interval; 0 disables it.
    pub metrics_interval_secs: u64,
}

impl Default for WorkersConfig {
    fn default() -> Self {
        Self {
            parse_partitions: 2,
            insert_partitions: 4,
            metrics_interval_secs: 60,
        }
    }
}

/// Orphan-file cleanup configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanupConfig {
    pub enabled: bool,
    pub max_age_hours: u64,
    /// Hour of day (UTC) of the daily sweep.
    pub run_hour_utc: u32,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_age_hours: 24,
            run_hour_utc: 2,
        }
    }
}

impl CleanupConfig {
    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_hours * 3600)
    }
}

/// Background worker scheduler.
pub struct WorkerScheduler {
    ctx: PipelineContext,
    workers: WorkersConfig,
    cleanup: CleanupConfig,
}

impl WorkerScheduler {
    pub fn new(ctx: PipelineContext, workers: WorkersConfig, cleanup: CleanupConfig) -> Self {
        Self {
            ctx,
            workers,
            cleanup,
        }
    }

    /// Starts one worker per queue partition plus the periodic tasks. All
    /// tasks return once `shutdown` flips to true.
    pub fn start(self: Arc<Self>, shutdown: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::new();

        let parse = Arc::new(ParseStage::new(self.ctx.clone()));
        let parse_partitions = self.ctx.queue.partitions(PARSE_QUEUE);
        for partition in 0..parse_partitions {
            let worker =
                PartitionWorker::new(self.ctx.queue.clone(), PARSE_QUEUE, partition, parse.clone());
            handles.push(tokio::spawn(worker.run(shutdown.clone())));
        }

        let insert = Arc::new(InsertStage::new(self.ctx.clone()));
        let insert_partitions = self.ctx.queue.partitions(INSERT_QUEUE);
        for partition in 0..insert_partitions {
            let worker = PartitionWorker::new(
                self.ctx.queue.clone(),
                INSERT_QUEUE,
                partition,
                insert.clone(),
            );
            handles.push(tokio::spawn(worker.run(shutdown.clone())));
        }

        if self.workers.metrics_interval_secs > 0 {
            let scheduler = self.clone();
            let shutdown = shutdown.clone();
            handles.push(tokio::spawn(async move {
                scheduler.run_metrics_log(shutdown).await;
            }));
        }

        if self.cleanup.enabled {
            for (kind, store) in self.ctx.files.all() {
                let sweep = OrphanSweep::new(store).with_max_age(self.cleanup.max_age());
                handles.push(tokio::spawn(
                    sweep.run_daily(self.cleanup.run_hour_utc, shutdown.clone()),
                ));
                info!(
                    storage = ?kind,
                    run_hour_utc = self.cleanup.run_hour_utc,
                    max_age_hours = self.cleanup.max_age_hours,
                    "Orphan file cleanup scheduled"
                );
            }
        }

        info!(
            parse_workers = parse_partitions,
            insert_workers = insert_partitions,
            "Background workers started"
        );
        handles
    }

    async fn run_metrics_log(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(Duration::from_secs(self.workers.metrics_interval_secs));
        // The first tick fires immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.changed() => return,
            }

            let snapshot = metrics().snapshot();
            info!(
                parse_jobs_started = snapshot.parse_jobs_started,
                parse_jobs_failed = snapshot.parse_jobs_failed,
                rows_accepted = snapshot.rows_accepted,
                rows_skipped_date = snapshot.rows_skipped_date,
                rows_skipped_quota = snapshot.rows_skipped_quota,
                batches_enqueued = snapshot.batches_enqueued,
                events_inserted = snapshot.events_inserted,
                insert_errors = snapshot.insert_errors,
                imports_completed = snapshot.imports_completed,
                imports_failed = snapshot.imports_failed,
                active_parse_jobs = snapshot.active_parse_jobs,
                parse_duration_mean_ms = snapshot.parse_duration_mean_ms,
                insert_latency_mean_ms = snapshot.insert_latency_mean_ms,
                "Pipeline metrics"
            );
        }
    }
}
