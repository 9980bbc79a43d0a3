//! Partition workers: poll a queue partition, run each job, commit.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use engine_core::{decode_job, InsertJob, JobQueue, ParseJob, QueueMessage};
use serde::de::DeserializeOwned;
use telemetry::metrics;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::insert::InsertStage;
use crate::parse::ParseStage;

/// Pause after a failed poll before trying again.
const POLL_ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// Runs jobs of one kind. Handlers report failures through the import
/// status and never return them.
#[async_trait]
pub trait JobHandler: Send + Sync + 'static {
    type Job: DeserializeOwned + Send + Sync;

    async fn run_job(&self, job: Self::Job);
}

#[async_trait]
impl JobHandler for ParseStage {
    type Job = ParseJob;

    async fn run_job(&self, job: ParseJob) {
        self.handle(&job).await;
    }
}

#[async_trait]
impl JobHandler for InsertStage {
    type Job = InsertJob;

    async fn run_job(&self, job: InsertJob) {
        self.handle(&job).await;
    }
}

/// The only consumer of one queue partition.
///
/// Jobs are handled one at a time in offset order and committed after the
/// handler returns (at-least-once).
pub struct PartitionWorker<H: JobHandler> {
    queue: Arc<dyn JobQueue>,
    queue_name: &'static str,
    partition: u32,
    handler: Arc<H>,
}

impl<H: JobHandler> PartitionWorker<H> {
    pub fn new(
        queue: Arc<dyn JobQueue>,
        queue_name: &'static str,
        partition: u32,
        handler: Arc<H>,
    ) -> Self {
        Self {
            queue,
            queue_name,
            partition,
            handler,
        }
    }

    /// Polls until `shutdown` flips to true. The job in flight is finished
    /// before returning.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            queue = self.queue_name,
            partition = self.partition,
            "Partition worker starting"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            let polled = tokio::select! {
                polled = self.queue.poll(self.queue_name, self.partition) => polled,
                _ = shutdown.changed() => break,
            };

            match polled {
                Ok(messages) => {
                    for message in messages {
                        self.process(&message).await;
                    }
                }
                Err(e) => {
                    error!(
                        queue = self.queue_name,
                        partition = self.partition,
                        "Queue poll failed: {}",
                        e
                    );
                    tokio::select! {
                        _ = tokio::time::sleep(POLL_ERROR_BACKOFF) => {}
                        _ = shutdown.changed() => break,
                    }
                }
            }
        }

        info!(
            queue = self.queue_name,
            partition = self.partition,
            "Partition worker stopped"
        );
    }

    /// Handles one message and commits its offset.
    pub async fn process(&self, message: &QueueMessage) {
        metrics().jobs_consumed.inc();

        match decode_job::<H::Job>(message) {
            Ok(job) => self.handler.run_job(job).await,
            Err(e) => {
                // Undecodable payloads can never succeed; commit past them.
                metrics().job_decode_errors.inc();
                warn!(
                    queue = self.queue_name,
                    partition = self.partition,
                    offset = message.offset,
                    "Dropping undecodable job: {}",
                    e
                );
            }
        }

        if let Err(e) = self
            .queue
            .commit(self.queue_name, self.partition, message.offset)
            .await
        {
            error!(
                queue = self.queue_name,
                partition = self.partition,
                offset = message.offset,
                "Offset commit failed: {}",
                e
            );
        } else {
            debug!(
                queue = self.queue_name,
                partition = self.partition,
                offset = message.offset,
                "Committed"
            );
        }
    }
}
