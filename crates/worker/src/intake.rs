//! Import intake: admission, the `pending` row, and the parse job.

use std::sync::Arc;

use engine_core::{
    send_job, Admission, Error, ImportJob, ImportLimiter, JobQueue, Result, StatusKind,
    StatusStore, PARSE_QUEUE,
};
use tracing::{debug, info};
use validator::Validate;

/// Entry point for a new upload.
pub struct ImportIntake {
    limiter: ImportLimiter,
    statuses: Arc<dyn StatusStore>,
    queue: Arc<dyn JobQueue>,
}

impl ImportIntake {
    pub fn new(
        limiter: ImportLimiter,
        statuses: Arc<dyn StatusStore>,
        queue: Arc<dyn JobQueue>,
    ) -> Self {
        Self {
            limiter,
            statuses,
            queue,
        }
    }

    /// Admits `job`, records it as `pending` and enqueues it for parsing.
    ///
    /// A denied import creates no status row and sends nothing. The job's
    /// organization is taken from the site directory.
    pub async fn submit(&self, mut job: ImportJob) -> Result<Admission> {
        let admission = self.limiter.check(job.site).await?;
        let Admission::Allowed { ref organization } = admission else {
            return Ok(admission);
        };

        job.organization = organization.clone();
        job.validate()
            .map_err(|e| Error::validation(e.to_string()))?;

        let created = match self.limiter.slot_limit() {
            Some(limit) => {
                self.statuses
                    .create_pending_within_limit(&job, StatusKind::ACTIVE, limit)
                    .await?
            }
            None => {
                self.statuses.create_pending(&job).await?;
                true
            }
        };
        if !created {
            debug!(
                import_id = %job.import_id,
                organization_id = %job.organization,
                "Import refused: concurrent limit reached at insert"
            );
            return Ok(self.limiter.concurrency_denial());
        }

        send_job(self.queue.as_ref(), PARSE_QUEUE, &job.organization, &job).await?;

        info!(
            import_id = %job.import_id,
            site_id = job.site,
            organization_id = %job.organization,
            platform = %job.platform,
            "Import accepted"
        );
        Ok(admission)
    }
}
