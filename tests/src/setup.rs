//! Common test setup.

use std::sync::Arc;

use engine_core::{
    ImportJob, ImportLimiter, InsertJob, MeteringMode, ParseJob, PlatformRegistry, SiteId,
    StorageKind, SubscriptionInfo, INSERT_QUEUE,
};
use import_storage::{ImportFiles, LocalFileStore};
use tempfile::TempDir;
use uuid::Uuid;
use worker::{ImportIntake, InsertOutcome, InsertStage, ParseOutcome, ParseStage, PipelineContext};

use crate::fixtures::{write_export, UmamiRow};
use crate::mocks::{
    MemoryEventStore, MemoryStatusStore, RecordingQueue, StaticSites, StaticSubscriptions,
};

/// Organization owning the test sites.
pub const ORG: &str = "org_test";

/// A site on current pricing (all event types metered).
pub const SITE: SiteId = 2500;

/// A second site of the same organization.
pub const OTHER_SITE: SiteId = 2501;

/// Site on legacy pricing (pageviews only metered).
pub const LEGACY_SITE: SiteId = 1200;

/// Pipeline wired to in-memory collaborators and a temporary upload dir.
pub struct TestContext {
    pub dir: TempDir,
    pub statuses: MemoryStatusStore,
    pub events: MemoryEventStore,
    pub queue: RecordingQueue,
    pub ctx: PipelineContext,
}

impl TestContext {
    /// Unmetered deployment.
    pub fn unmetered() -> Self {
        Self::build(MeteringMode::Unmetered, None)
    }

    /// Metered deployment where [`ORG`] has `subscription`.
    pub fn metered(subscription: SubscriptionInfo) -> Self {
        Self::build(MeteringMode::Metered, Some(subscription))
    }

    /// Metered deployment where [`ORG`] has no subscription row.
    pub fn metered_without_subscription() -> Self {
        Self::build(MeteringMode::Metered, None)
    }

    fn build(metering: MeteringMode, subscription: Option<SubscriptionInfo>) -> Self {
        telemetry::init_test_tracing();

        let dir = tempfile::tempdir().unwrap();
        let statuses = MemoryStatusStore::new();
        let events = MemoryEventStore::new();
        let queue = RecordingQueue::new();

        let subscriptions = match subscription {
            Some(info) => StaticSubscriptions::new(&[(ORG, info)]),
            None => StaticSubscriptions::default(),
        };

        let ctx = PipelineContext {
            statuses: Arc::new(statuses.clone()),
            sites: Arc::new(StaticSites::new(&[
                (SITE, ORG),
                (OTHER_SITE, ORG),
                (LEGACY_SITE, ORG),
            ])),
            subscriptions: Arc::new(subscriptions),
            events: Arc::new(events.clone()),
            files: ImportFiles::new(Arc::new(LocalFileStore::new(dir.path())), None),
            queue: Arc::new(queue.clone()),
            platforms: Arc::new(PlatformRegistry::default()),
            metering,
        };

        Self {
            dir,
            statuses,
            events,
            queue,
            ctx,
        }
    }

    /// Writes `rows` as an export and returns a job for it.
    pub fn job(&self, rows: &[UmamiRow]) -> ImportJob {
        let path = write_export(self.dir.path(), rows);
        ImportJob {
            site: SITE,
            import_id: Uuid::new_v4(),
            platform: "umami".to_string(),
            storage_location: path.to_string_lossy().into_owned(),
            storage_kind: StorageKind::Local,
            organization: ORG.to_string(),
            start_date: None,
            end_date: None,
        }
    }

    /// `job` as admitted: a `pending` row exists.
    pub async fn pending_job(&self, rows: &[UmamiRow]) -> ImportJob {
        let job = self.job(rows);
        engine_core::StatusStore::create_pending(&self.statuses, &job)
            .await
            .unwrap();
        job
    }

    pub fn intake(&self) -> ImportIntake {
        ImportIntake::new(
            ImportLimiter::new(
                self.ctx.sites.clone(),
                self.ctx.statuses.clone(),
                self.ctx.metering,
            ),
            self.ctx.statuses.clone(),
            self.ctx.queue.clone(),
        )
    }

    pub fn parse_stage(&self) -> ParseStage {
        ParseStage::new(self.ctx.clone())
    }

    pub fn insert_stage(&self) -> InsertStage {
        InsertStage::new(self.ctx.clone())
    }

    /// Insert jobs sent so far, removed from the queue.
    pub fn take_insert_jobs(&self) -> Vec<InsertJob> {
        self.queue.take(INSERT_QUEUE)
    }

    /// Runs the parse stage, then every insert job it sent, in order.
    pub async fn run_import(&self, job: &ParseJob) -> (ParseOutcome, Vec<InsertOutcome>) {
        self.run_import_with(self.parse_stage(), job).await
    }

    pub async fn run_import_with(
        &self,
        parse: ParseStage,
        job: &ParseJob,
    ) -> (ParseOutcome, Vec<InsertOutcome>) {
        let parsed = parse.handle(job).await;
        let insert = self.insert_stage();
        let mut inserted = Vec::new();
        for insert_job in self.take_insert_jobs() {
            inserted.push(insert.handle(&insert_job).await);
        }
        (parsed, inserted)
    }
}
