//! Quota tracker seeding from existing events.

use chrono::{Duration, Utc};
use engine_core::{
    EventRecord, EventType, Error, MeteringMode, MonthKey, QuotaTracker, SubscriptionInfo,
};
use integration_tests::fixtures::months_ago;
use integration_tests::setup::{TestContext, LEGACY_SITE, ORG, SITE};

const SUBSCRIPTION: SubscriptionInfo = SubscriptionInfo {
    monthly_event_limit: 100,
    months_of_history: 6,
};

fn event(site: u32, event_type: EventType, months_back: u32) -> EventRecord {
    EventRecord {
        site_id: site,
        import_id: String::new(),
        event_type,
        timestamp: months_ago(months_back) + Duration::hours(1),
        session_id: String::new(),
        user_id: String::new(),
        hostname: String::new(),
        pathname: "/".into(),
        querystring: String::new(),
        page_title: String::new(),
        referrer: String::new(),
        browser: String::new(),
        operating_system: String::new(),
        device_type: String::new(),
        screen_width: 0,
        screen_height: 0,
        language: String::new(),
        country: String::new(),
        region: String::new(),
        city: String::new(),
        event_name: String::new(),
        url_parameters: "{}".into(),
    }
}

async fn load(ctx: &TestContext) -> engine_core::Result<QuotaTracker> {
    QuotaTracker::load(ORG, ctx.ctx.metering, ctx.ctx.quota_sources(), Utc::now()).await
}

#[tokio::test]
async fn test_existing_usage_is_seeded_per_month() {
    let ctx = TestContext::metered(SUBSCRIPTION);
    let mut seeded = Vec::new();
    seeded.extend((0..3).map(|_| event(SITE, EventType::Pageview, 0)));
    seeded.extend((0..2).map(|_| event(SITE, EventType::CustomEvent, 1)));
    ctx.events.seed(seeded);

    let tracker = load(&ctx).await.unwrap();

    let current = MonthKey::of(&months_ago(0));
    let previous = MonthKey::of(&months_ago(1));
    assert_eq!(tracker.month_quota(current).used, 3);
    assert_eq!(tracker.month_quota(previous).used, 2);
    assert_eq!(tracker.month_quota(previous).remaining, 98);
}

#[tokio::test]
async fn test_legacy_sites_count_pageviews_only() {
    let ctx = TestContext::metered(SUBSCRIPTION);
    ctx.events.seed(vec![
        event(LEGACY_SITE, EventType::Pageview, 0),
        event(LEGACY_SITE, EventType::CustomEvent, 0),
        event(LEGACY_SITE, EventType::Performance, 0),
        event(SITE, EventType::Performance, 0),
    ]);

    let tracker = load(&ctx).await.unwrap();

    assert_eq!(tracker.month_quota(MonthKey::of(&months_ago(0))).used, 2);
}

#[tokio::test]
async fn test_usage_before_window_is_ignored() {
    let ctx = TestContext::metered(SUBSCRIPTION);
    ctx.events.seed(vec![event(SITE, EventType::Pageview, 12)]);

    let tracker = load(&ctx).await.unwrap();

    let summary = tracker.summary();
    assert_eq!(summary.total_months_in_window, 6);
    assert_eq!(summary.months_at_capacity, 0);
    assert_eq!(summary.months_with_space, 6);
    assert_eq!(tracker.month_quota(MonthKey::of(&months_ago(12))).used, 0);
}

#[tokio::test]
async fn test_seeded_usage_counts_against_limit() {
    let ctx = TestContext::metered(SubscriptionInfo {
        monthly_event_limit: 2,
        months_of_history: 6,
    });
    ctx.events.seed(vec![event(SITE, EventType::Pageview, 0)]);

    let mut tracker = load(&ctx).await.unwrap();
    let ts = integration_tests::fixtures::format_timestamp(months_ago(0));

    assert!(tracker.can_import_event(&ts));
    assert!(!tracker.can_import_event(&ts));
}

#[tokio::test]
async fn test_missing_subscription_is_error() {
    let ctx = TestContext::metered_without_subscription();

    let err = load(&ctx).await.unwrap_err();

    assert!(matches!(err, Error::MissingSubscription(ref org) if org == ORG));
    assert!(!err.is_config());
}

#[tokio::test]
async fn test_unmetered_tracker_accepts_everything() {
    let ctx = TestContext::unmetered();
    assert_eq!(ctx.ctx.metering, MeteringMode::Unmetered);

    let mut tracker = load(&ctx).await.unwrap();

    assert!(!tracker.is_metered());
    assert!(tracker.can_import_event("1999-01-01 00:00:00"));
    assert!(tracker.all_month_quotas().is_empty());
    assert_eq!(tracker.summary().months_at_capacity, 0);
}
