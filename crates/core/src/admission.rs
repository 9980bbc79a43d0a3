//! Admission control for new imports.

use std::sync::Arc;

use tracing::debug;

use crate::backends::{SiteDirectory, StatusStore};
use crate::error::Result;
use crate::job::StatusKind;
use crate::limits::DEFAULT_CONCURRENT_IMPORT_LIMIT;
use crate::tenant::{MeteringMode, OrganizationId, SiteId};

/// Reason given when the site does not exist.
pub const SITE_NOT_FOUND: &str = "Site not found.";

/// Outcome of an admission check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    Allowed { organization: OrganizationId },
    Denied { reason: String },
}

impl Admission {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed { .. })
    }

    pub fn organization(&self) -> Option<&str> {
        match self {
            Self::Allowed { organization } => Some(organization),
            Self::Denied { .. } => None,
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Denied { reason } => Some(reason),
            Self::Allowed { .. } => None,
        }
    }
}

/// Gates imports to one active import per organization (by default).
///
/// [`check`](Self::check) is a read and can race another admission. The
/// caller creates the `pending` row with
/// [`StatusStore::create_pending_within_limit`] and [`slot_limit`](Self::slot_limit),
/// which enforces the limit again atomically.
pub struct ImportLimiter {
    sites: Arc<dyn SiteDirectory>,
    statuses: Arc<dyn StatusStore>,
    metering: MeteringMode,
    concurrent_limit: u64,
}

impl ImportLimiter {
    pub fn new(
        sites: Arc<dyn SiteDirectory>,
        statuses: Arc<dyn StatusStore>,
        metering: MeteringMode,
    ) -> Self {
        Self {
            sites,
            statuses,
            metering,
            concurrent_limit: DEFAULT_CONCURRENT_IMPORT_LIMIT,
        }
    }

    pub fn with_concurrent_limit(mut self, limit: u64) -> Self {
        self.concurrent_limit = limit;
        self
    }

    /// Decides whether `site` may start a new import.
    pub async fn check(&self, site: SiteId) -> Result<Admission> {
        let Some(organization) = self.sites.organization_for_site(site).await? else {
            return Ok(Admission::Denied {
                reason: SITE_NOT_FOUND.to_string(),
            });
        };

        if !self.metering.is_metered() {
            return Ok(Admission::Allowed { organization });
        }

        let active = self
            .statuses
            .count_active(&organization, StatusKind::ACTIVE)
            .await?;

        if active >= self.concurrent_limit {
            debug!(
                site_id = site,
                organization_id = %organization,
                active = active,
                limit = self.concurrent_limit,
                "Import refused: concurrent limit reached"
            );
            return Ok(self.concurrency_denial());
        }

        Ok(Admission::Allowed { organization })
    }

    /// Concurrent imports allowed per organization, `None` when unmetered.
    pub fn slot_limit(&self) -> Option<u64> {
        self.metering.is_metered().then_some(self.concurrent_limit)
    }

    /// The denial returned when the concurrent limit is reached.
    pub fn concurrency_denial(&self) -> Admission {
        Admission::Denied {
            reason: concurrency_reason(self.concurrent_limit),
        }
    }
}

fn concurrency_reason(limit: u64) -> String {
    let noun = if limit == 1 { "import" } else { "imports" };
    format!("Only {} concurrent {} allowed per organization.", limit, noun)
}
