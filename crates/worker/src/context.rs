//! Collaborators shared by the pipeline stages.

use std::sync::Arc;

use engine_core::{
    EventStore, JobQueue, MeteringMode, PlatformRegistry, QuotaSources, SiteDirectory, StatusStore,
    SubscriptionSource,
};
use import_storage::ImportFiles;

/// Everything a parse or insert job touches outside its own payload.
#[derive(Clone)]
pub struct PipelineContext {
    pub statuses: Arc<dyn StatusStore>,
    pub sites: Arc<dyn SiteDirectory>,
    pub subscriptions: Arc<dyn SubscriptionSource>,
    pub events: Arc<dyn EventStore>,
    pub files: ImportFiles,
    pub queue: Arc<dyn JobQueue>,
    pub platforms: Arc<PlatformRegistry>,
    pub metering: MeteringMode,
}

impl PipelineContext {
    pub fn quota_sources(&self) -> QuotaSources<'_> {
        QuotaSources {
            subscriptions: self.subscriptions.as_ref(),
            sites: self.sites.as_ref(),
            events: self.events.as_ref(),
        }
    }
}
