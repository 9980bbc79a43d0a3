//! Per-organization monthly event quotas for a single import attempt.
//!
//! A tracker is seeded once from historical usage in the event store, then
//! mutated in memory as rows are accepted. It is never shared between
//! imports and never persisted.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::backends::{EventStore, SiteDirectory, SubscriptionSource};
use crate::error::{Error, Result};
use crate::events::EventType;
use crate::limits::LEGACY_SITE_ID_THRESHOLD;
use crate::retention::{
    oldest_allowed_date, oldest_allowed_month, parse_event_timestamp, window_months, MonthKey,
    UNMETERED_OLDEST_MONTH,
};
use crate::tenant::{
    metered_event_types, partition_by_pricing, MeteringMode, SiteId, SubscriptionInfo,
};

/// Quota state for one month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyQuotaInfo {
    pub month: MonthKey,
    pub used: u64,
    pub limit: u64,
    pub remaining: u64,
}

/// Window-wide quota overview.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaSummary {
    pub total_months_in_window: u32,
    pub months_at_capacity: u32,
    pub months_with_space: u32,
    pub oldest_allowed_month: MonthKey,
}

/// Result of offering one event to the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaDecision {
    /// Counted against its month.
    Accepted,
    /// Timestamp is not `yyyy-MM-dd HH:mm:ss`.
    InvalidTimestamp,
    /// Month precedes the historical window.
    OutsideWindow,
    /// Month already at the monthly limit.
    MonthFull,
}

impl QuotaDecision {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }
}

/// Collaborators needed to seed a tracker.
#[derive(Clone, Copy)]
pub struct QuotaSources<'a> {
    pub subscriptions: &'a dyn SubscriptionSource,
    pub sites: &'a dyn SiteDirectory,
    pub events: &'a dyn EventStore,
}

/// Monthly usage accounting against a subscription tier.
#[derive(Debug, Clone)]
pub struct QuotaTracker {
    monthly_usage: HashMap<MonthKey, u64>,
    /// `None` when metering is disabled.
    limits: Option<SubscriptionInfo>,
    oldest_allowed_month: MonthKey,
    as_of: DateTime<Utc>,
}

impl QuotaTracker {
    /// A tracker that accepts everything.
    pub fn unmetered(now: DateTime<Utc>) -> Self {
        Self {
            monthly_usage: HashMap::new(),
            limits: None,
            oldest_allowed_month: UNMETERED_OLDEST_MONTH,
            as_of: now,
        }
    }

    /// A tracker seeded with existing per-month usage.
    pub fn metered(
        subscription: SubscriptionInfo,
        monthly_usage: HashMap<MonthKey, u64>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            monthly_usage,
            limits: Some(subscription),
            oldest_allowed_month: oldest_allowed_month(now, subscription.months_of_history),
            as_of: now,
        }
    }

    /// Builds a tracker for `organization`, seeded from the event store.
    ///
    /// A failing usage query degrades to empty usage; a missing subscription
    /// for a metered organization is an error.
    pub async fn load(
        organization: &str,
        metering: MeteringMode,
        sources: QuotaSources<'_>,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        if !metering.is_metered() {
            return Ok(Self::unmetered(now));
        }

        let subscription = sources
            .subscriptions
            .subscription(organization)
            .await?
            .ok_or_else(|| Error::MissingSubscription(organization.to_string()))?;

        let since = oldest_allowed_date(now, subscription.months_of_history);
        let sites = sources.sites.sites_for_organization(organization).await?;

        let usage = if sites.is_empty() {
            HashMap::new()
        } else {
            match query_monthly_usage(sources.events, &sites, since).await {
                Ok(usage) => usage,
                Err(e) => {
                    warn!(
                        organization_id = organization,
                        error = %e,
                        "Monthly usage query failed, starting from empty usage"
                    );
                    HashMap::new()
                }
            }
        };

        debug!(
            organization_id = organization,
            sites = sites.len(),
            months_with_usage = usage.len(),
            since = %since,
            "Seeded import quota tracker"
        );

        Ok(Self::metered(subscription, usage, now))
    }

    pub fn is_metered(&self) -> bool {
        self.limits.is_some()
    }

    pub fn oldest_allowed_month(&self) -> MonthKey {
        self.oldest_allowed_month
    }

    /// Offers one event; on `Accepted` its month's usage is incremented.
    ///
    /// Call exactly once per candidate event, in stream order.
    pub fn check_event(&mut self, timestamp: &str) -> QuotaDecision {
        let Some(limits) = self.limits else {
            return QuotaDecision::Accepted;
        };

        let Some(ts) = parse_event_timestamp(timestamp) else {
            warn!(timestamp = timestamp, "Invalid timestamp format");
            return QuotaDecision::InvalidTimestamp;
        };

        let month = MonthKey::of(&ts);
        if month < self.oldest_allowed_month {
            return QuotaDecision::OutsideWindow;
        }

        let used = self.monthly_usage.get(&month).copied().unwrap_or(0);
        if used >= limits.monthly_event_limit {
            return QuotaDecision::MonthFull;
        }

        self.monthly_usage.insert(month, used + 1);
        QuotaDecision::Accepted
    }

    /// Boolean form of [`check_event`](Self::check_event).
    pub fn can_import_event(&mut self, timestamp: &str) -> bool {
        self.check_event(timestamp).is_accepted()
    }

    pub fn month_quota(&self, month: MonthKey) -> MonthlyQuotaInfo {
        let used = self.monthly_usage.get(&month).copied().unwrap_or(0);
        let limit = self
            .limits
            .map(|l| l.monthly_event_limit)
            .unwrap_or(u64::MAX);
        MonthlyQuotaInfo {
            month,
            used,
            limit,
            remaining: limit.saturating_sub(used),
        }
    }

    /// One entry per month of the window, oldest first. Empty when unmetered.
    pub fn all_month_quotas(&self) -> Vec<MonthlyQuotaInfo> {
        let Some(limits) = self.limits else {
            return Vec::new();
        };
        window_months(self.as_of, limits.months_of_history)
            .into_iter()
            .map(|month| self.month_quota(month))
            .collect()
    }

    pub fn summary(&self) -> QuotaSummary {
        let total = self.limits.map(|l| l.months_of_history).unwrap_or(0);
        let quotas = self.all_month_quotas();
        let at_capacity = quotas.iter().filter(|q| q.remaining == 0).count() as u32;
        QuotaSummary {
            total_months_in_window: total,
            months_at_capacity: at_capacity,
            months_with_space: quotas.len() as u32 - at_capacity,
            oldest_allowed_month: self.oldest_allowed_month,
        }
    }

    /// User-facing explanation when every row of an import was rejected.
    pub fn rejection_message(&self, rejected: u64) -> String {
        let summary = self.summary();
        format!(
            "No events could be imported. All {} events exceeded monthly quotas or fell outside the {}-month historical window. \
             {} of {} months are at full capacity. \
             Try importing newer data or upgrade your plan for higher monthly quotas.",
            rejected,
            summary.total_months_in_window,
            summary.months_at_capacity,
            summary.total_months_in_window,
        )
    }
}

/// Sums per-month usage over both pricing partitions.
async fn query_monthly_usage(
    events: &dyn EventStore,
    sites: &[SiteId],
    since: NaiveDate,
) -> Result<HashMap<MonthKey, u64>> {
    let (grandfathered, current) = partition_by_pricing(sites);
    let mut usage: HashMap<MonthKey, u64> = HashMap::new();

    let partitions: [(&[SiteId], &[EventType]); 2] = [
        (grandfathered.as_slice(), metered_event_types(LEGACY_SITE_ID_THRESHOLD - 1)),
        (current.as_slice(), metered_event_types(LEGACY_SITE_ID_THRESHOLD)),
    ];

    for (sites, types) in partitions {
        if sites.is_empty() {
            continue;
        }
        for row in events.monthly_event_counts(sites, types, since).await? {
            *usage.entry(row.month).or_insert(0) += row.count;
        }
    }

    Ok(usage)
}
