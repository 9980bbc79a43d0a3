//! Parse stage: stream an import file, filter it, and batch accepted rows
//! onto the insert queue.

use std::time::{Duration, Instant};

use chrono::Utc;
use engine_core::limits::{GENERIC_PARSE_FAILURE, INSERT_BATCH_SIZE, PARSE_TIMEOUT};
use engine_core::platform::CREATED_AT;
use engine_core::{
    send_job, CanonicalRow, Error, ImportStatus, InsertJob, ParseJob, QuotaTracker, Result,
    INSERT_QUEUE,
};
use telemetry::metrics;
use tracing::{debug, error, info, warn};
use validator::Validate;

use crate::context::PipelineContext;
use crate::date_range::DateRange;
use crate::decoder::RowStream;

/// Counts and final state of one parse job.
///
/// `accepted + skipped_date + skipped_quota + dropped_missing_timestamp`
/// equals the number of decoded rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseOutcome {
    pub accepted: u64,
    pub skipped_date: u64,
    pub skipped_quota: u64,
    pub dropped_missing_timestamp: u64,
    /// Data batches sent, excluding the terminal job.
    pub batches_sent: u64,
    pub terminal_sent: bool,
    /// Last status this stage wrote.
    pub status: Option<ImportStatus>,
}

impl ParseOutcome {
    pub fn rows_seen(&self) -> u64 {
        self.accepted + self.skipped_date + self.skipped_quota + self.dropped_missing_timestamp
    }

    /// Nothing accepted and at least one row refused by quota or window.
    pub fn is_total_quota_rejection(&self) -> bool {
        self.accepted == 0 && self.skipped_quota > 0
    }
}

/// Consumes parse jobs.
pub struct ParseStage {
    ctx: PipelineContext,
    timeout: Duration,
    batch_size: usize,
}

impl ParseStage {
    pub fn new(ctx: PipelineContext) -> Self {
        Self {
            ctx,
            timeout: PARSE_TIMEOUT,
            batch_size: INSERT_BATCH_SIZE,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Runs one parse job to completion. Never fails: every error ends in a
    /// `failed` status, and the source file is always deleted.
    pub async fn handle(&self, job: &ParseJob) -> ParseOutcome {
        let start = Instant::now();
        metrics().parse_jobs_started.inc();
        metrics().active_parse_jobs.inc();

        let mut outcome = ParseOutcome::default();

        if let Err(e) = self.run(job, &mut outcome).await {
            let reason = if e.is_config() {
                e.to_string()
            } else {
                GENERIC_PARSE_FAILURE.to_string()
            };
            error!(
                import_id = %job.import_id,
                site_id = job.site,
                code = e.code(),
                error = %e,
                "Import failed during parsing, worker continuing"
            );
            metrics().parse_jobs_failed.inc();
            metrics().imports_failed.inc();
            self.mark(job, ImportStatus::failed(reason), &mut outcome).await;
        }

        self.delete_source(job).await;

        let m = metrics();
        m.rows_accepted.inc_by(outcome.accepted);
        m.rows_skipped_date.inc_by(outcome.skipped_date);
        m.rows_skipped_quota.inc_by(outcome.skipped_quota);
        m.rows_dropped_no_timestamp.inc_by(outcome.dropped_missing_timestamp);
        m.parse_duration_ms.observe(start.elapsed().as_millis() as u64);
        m.active_parse_jobs.dec();

        outcome
    }

    async fn run(&self, job: &ParseJob, outcome: &mut ParseOutcome) -> Result<()> {
        job.validate()
            .map_err(|e| Error::config(format!("Invalid import job: {}", e)))?;

        self.ctx
            .statuses
            .update_status(job.import_id, &ImportStatus::Processing)
            .await?;
        outcome.status = Some(ImportStatus::Processing);

        let platform = self.ctx.platforms.get(&job.platform)?;
        let range = DateRange::parse(job.start_date.as_deref(), job.end_date.as_deref())?;

        let mut tracker = QuotaTracker::load(
            &job.organization,
            self.ctx.metering,
            self.ctx.quota_sources(),
            Utc::now(),
        )
        .await?;

        let reader = self
            .ctx
            .files
            .store(job.storage_kind)?
            .open(&job.storage_location)
            .await?;
        let mut rows = RowStream::spawn(reader, platform.headers);

        debug!(
            import_id = %job.import_id,
            platform = platform.name,
            location = %job.storage_location,
            "Streaming import file"
        );

        let streamed = tokio::time::timeout(
            self.timeout,
            self.consume(job, &mut rows, &range, &mut tracker, outcome),
        )
        .await;

        // Stops the decoder thread at its next row
        drop(rows);

        let chunk = match streamed {
            Ok(result) => result?,
            Err(_) => return Err(Error::Timeout(self.timeout.as_secs())),
        };

        info!(
            import_id = %job.import_id,
            accepted = outcome.accepted,
            skipped_quota = outcome.skipped_quota,
            skipped_date = outcome.skipped_date,
            dropped_missing_timestamp = outcome.dropped_missing_timestamp,
            "Processed import file"
        );

        if outcome.is_total_quota_rejection() {
            let reason = tracker.rejection_message(outcome.skipped_quota);
            warn!(
                import_id = %job.import_id,
                organization_id = %job.organization,
                rejected = outcome.skipped_quota,
                "No events accepted within quota"
            );
            metrics().imports_failed.inc();
            self.mark(job, ImportStatus::failed(reason), outcome).await;
            return Ok(());
        }

        if !chunk.is_empty() {
            self.send_batch(job, chunk, outcome).await?;
        }

        send_job(
            self.ctx.queue.as_ref(),
            INSERT_QUEUE,
            &job.import_id.to_string(),
            &InsertJob::terminal(job, outcome.batches_sent),
        )
        .await?;
        outcome.terminal_sent = true;

        Ok(())
    }

    /// Filters rows into full batches; returns the trailing partial batch.
    async fn consume(
        &self,
        job: &ParseJob,
        rows: &mut RowStream,
        range: &DateRange,
        tracker: &mut QuotaTracker,
        outcome: &mut ParseOutcome,
    ) -> Result<Vec<CanonicalRow>> {
        let mut chunk = Vec::with_capacity(self.batch_size);

        while let Some(row) = rows.next().await {
            let row = row?;

            let created_at = match row.get(CREATED_AT).map(|v| v.trim()) {
                Some(value) if !value.is_empty() => value,
                _ => {
                    outcome.dropped_missing_timestamp += 1;
                    continue;
                }
            };

            if !range.contains(created_at) {
                outcome.skipped_date += 1;
                continue;
            }

            if !tracker.can_import_event(created_at) {
                outcome.skipped_quota += 1;
                continue;
            }

            chunk.push(row);
            outcome.accepted += 1;

            if chunk.len() >= self.batch_size {
                let full = std::mem::replace(&mut chunk, Vec::with_capacity(self.batch_size));
                self.send_batch(job, full, outcome).await?;
            }
        }

        Ok(chunk)
    }

    async fn send_batch(
        &self,
        job: &ParseJob,
        chunk: Vec<CanonicalRow>,
        outcome: &mut ParseOutcome,
    ) -> Result<()> {
        let rows = chunk.len();
        let insert = InsertJob::batch(job, outcome.batches_sent, chunk);
        send_job(
            self.ctx.queue.as_ref(),
            INSERT_QUEUE,
            &job.import_id.to_string(),
            &insert,
        )
        .await?;

        outcome.batches_sent += 1;
        metrics().batches_enqueued.inc();
        debug!(
            import_id = %job.import_id,
            sequence = insert.sequence,
            rows = rows,
            "Enqueued insert batch"
        );
        Ok(())
    }

    async fn mark(&self, job: &ParseJob, status: ImportStatus, outcome: &mut ParseOutcome) {
        if let Err(e) = self.ctx.statuses.update_status(job.import_id, &status).await {
            error!(
                import_id = %job.import_id,
                status = status.kind().as_str(),
                "Failed to update import status: {}",
                e
            );
            return;
        }
        outcome.status = Some(status);
    }

    async fn delete_source(&self, job: &ParseJob) {
        let deleted = match self.ctx.files.store(job.storage_kind) {
            Ok(store) => store.delete(&job.storage_location).await,
            Err(e) => Err(e),
        };

        match deleted {
            Ok(()) => {
                metrics().files_deleted.inc();
                debug!(import_id = %job.import_id, "Deleted import file");
            }
            Err(e) => {
                metrics().file_delete_errors.inc();
                warn!(
                    import_id = %job.import_id,
                    location = %job.storage_location,
                    "File cleanup failed, will remain in storage: {}",
                    e
                );
            }
        }
    }
}
