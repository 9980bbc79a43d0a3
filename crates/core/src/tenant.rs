//! Organizations, sites, and subscription tiers.

use serde::{Deserialize, Serialize};

use crate::events::EventType;
use crate::limits::LEGACY_SITE_ID_THRESHOLD;

/// Numeric site identifier.
pub type SiteId = u32;

/// Organization identifier (owner of sites and subscriptions).
pub type OrganizationId = String;

/// Whether quotas apply to this deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MeteringMode {
    /// Managed cloud: per-organization quotas and concurrency limits.
    #[default]
    Metered,
    /// Self-hosted: no quotas, no admission limits.
    Unmetered,
}

impl MeteringMode {
    pub fn from_flag(metered: bool) -> Self {
        if metered {
            Self::Metered
        } else {
            Self::Unmetered
        }
    }

    pub fn is_metered(&self) -> bool {
        matches!(self, Self::Metered)
    }
}

/// Subscription tier limits for an organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionInfo {
    /// Events allowed per calendar month.
    pub monthly_event_limit: u64,
    /// How many months back an import may reach.
    pub months_of_history: u32,
}

/// Sites created before the pricing change are metered on pageviews only.
pub fn is_grandfathered(site: SiteId) -> bool {
    site < LEGACY_SITE_ID_THRESHOLD
}

/// Event types that count against the quota for a site.
pub fn metered_event_types(site: SiteId) -> &'static [EventType] {
    if is_grandfathered(site) {
        &[EventType::Pageview]
    } else {
        &[EventType::Pageview, EventType::CustomEvent, EventType::Performance]
    }
}

/// Splits sites into (grandfathered, current-pricing) partitions.
pub fn partition_by_pricing(sites: &[SiteId]) -> (Vec<SiteId>, Vec<SiteId>) {
    sites.iter().partition(|&&site| is_grandfathered(site))
}
