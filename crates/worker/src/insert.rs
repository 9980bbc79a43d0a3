//! Insert stage: transform one batch and load it into the event store.

use engine_core::limits::{COMPLETION_FAILURE, GENERIC_INSERT_FAILURE};
use engine_core::{ImportStatus, InsertJob};
use telemetry::metrics;
use tracing::{debug, error, info, warn};

use crate::context::PipelineContext;

/// What an insert job did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The batch was loaded; carries the number of events written.
    Inserted(usize),
    /// The terminal job marked the import completed.
    Completed,
    /// The import was marked failed with this reason.
    Failed(String),
    /// Malformed job, dropped without side effects.
    Ignored,
}

/// Consumes insert jobs.
pub struct InsertStage {
    ctx: PipelineContext,
}

impl InsertStage {
    pub fn new(ctx: PipelineContext) -> Self {
        Self { ctx }
    }

    /// Runs one insert job. Never fails.
    pub async fn handle(&self, job: &InsertJob) -> InsertOutcome {
        if !job.is_well_formed() {
            warn!(
                import_id = %job.import_id,
                sequence = job.sequence,
                "Ignoring insert job with an empty chunk"
            );
            return InsertOutcome::Ignored;
        }

        if job.is_terminal() {
            return self.complete(job).await;
        }

        self.insert_batch(job).await
    }

    async fn complete(&self, job: &InsertJob) -> InsertOutcome {
        match self
            .ctx
            .statuses
            .update_status(job.import_id, &ImportStatus::Completed)
            .await
        {
            Ok(()) => {
                metrics().imports_completed.inc();
                info!(
                    import_id = %job.import_id,
                    site_id = job.site,
                    batches = job.sequence,
                    "Import completed"
                );
                InsertOutcome::Completed
            }
            Err(e) => {
                error!(
                    import_id = %job.import_id,
                    "Failed to mark import completed: {}",
                    e
                );
                self.fail(job, COMPLETION_FAILURE).await
            }
        }
    }

    async fn insert_batch(&self, job: &InsertJob) -> InsertOutcome {
        let platform = match self.ctx.platforms.get(&job.platform) {
            Ok(platform) => platform,
            Err(e) => {
                error!(import_id = %job.import_id, "Insert job for unknown platform: {}", e);
                metrics().insert_errors.inc();
                return self.fail(job, GENERIC_INSERT_FAILURE).await;
            }
        };

        let records = platform.transform(&job.chunk, job.site, job.import_id);

        let inserted = match self.ctx.events.bulk_insert(records).await {
            Ok(n) => n,
            Err(e) => {
                error!(
                    import_id = %job.import_id,
                    sequence = job.sequence,
                    rows = job.chunk.len(),
                    code = e.code(),
                    "Bulk insert failed: {}",
                    e
                );
                metrics().insert_errors.inc();
                return self.fail(job, GENERIC_INSERT_FAILURE).await;
            }
        };

        metrics().batches_inserted.inc();
        metrics().events_inserted.inc_by(inserted as u64);

        // Rows are already committed; a lost progress update only skews the counter.
        if let Err(e) = self
            .ctx
            .statuses
            .update_progress(job.import_id, inserted as u64)
            .await
        {
            metrics().progress_update_errors.inc();
            warn!(
                import_id = %job.import_id,
                inserted = inserted,
                "Failed to update import progress: {}",
                e
            );
        }

        debug!(
            import_id = %job.import_id,
            sequence = job.sequence,
            inserted = inserted,
            "Inserted batch"
        );
        InsertOutcome::Inserted(inserted)
    }

    async fn fail(&self, job: &InsertJob, reason: &str) -> InsertOutcome {
        metrics().imports_failed.inc();
        if let Err(e) = self
            .ctx
            .statuses
            .update_status(job.import_id, &ImportStatus::failed(reason))
            .await
        {
            error!(
                import_id = %job.import_id,
                "Failed to mark import failed: {}",
                e
            );
        }
        InsertOutcome::Failed(reason.to_string())
    }
}
