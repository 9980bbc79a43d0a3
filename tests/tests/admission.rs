//! Admission control through the import intake.

use engine_core::{
    Admission, ImportLimiter, ImportStatus, StatusStore, SubscriptionInfo, PARSE_QUEUE,
    SITE_NOT_FOUND,
};
use integration_tests::fixtures::pageviews_this_month;
use integration_tests::setup::{TestContext, OTHER_SITE, SITE};
use worker::ImportIntake;

fn metered() -> TestContext {
    TestContext::metered(SubscriptionInfo {
        monthly_event_limit: 1_000,
        months_of_history: 12,
    })
}

#[tokio::test]
async fn test_second_concurrent_import_is_refused_when_metered() {
    let ctx = metered();
    let intake = ctx.intake();

    let first = ctx.job(&pageviews_this_month(1));
    let mut second = ctx.job(&pageviews_this_month(1));
    second.site = OTHER_SITE;

    assert!(intake.submit(first.clone()).await.unwrap().is_allowed());

    let refused = intake.submit(second.clone()).await.unwrap();
    assert_eq!(
        refused.reason(),
        Some("Only 1 concurrent import allowed per organization.")
    );
    assert!(ctx.statuses.get(second.import_id).await.unwrap().is_none());
    assert_eq!(ctx.queue.sent_count(PARSE_QUEUE), 1);
}

#[tokio::test]
async fn test_limit_holds_when_the_admission_read_is_stale() {
    let ctx = metered();
    ctx.statuses.set_stale_counts(true);
    let intake = ctx.intake();

    let first = ctx.job(&pageviews_this_month(1));
    let second = ctx.job(&pageviews_this_month(1));

    assert!(intake.submit(first).await.unwrap().is_allowed());
    let refused = intake.submit(second.clone()).await.unwrap();

    assert_eq!(
        refused.reason(),
        Some("Only 1 concurrent import allowed per organization.")
    );
    assert!(ctx.statuses.get(second.import_id).await.unwrap().is_none());
    assert_eq!(ctx.queue.sent_count(PARSE_QUEUE), 1);
}

#[tokio::test]
async fn test_simultaneous_submits_admit_one() {
    let ctx = metered();
    let intake = ctx.intake();

    let (a, b) = tokio::join!(
        intake.submit(ctx.job(&pageviews_this_month(1))),
        intake.submit(ctx.job(&pageviews_this_month(1))),
    );

    let allowed = [a.unwrap(), b.unwrap()]
        .iter()
        .filter(|admission| admission.is_allowed())
        .count();
    assert_eq!(allowed, 1);
    assert_eq!(ctx.queue.sent_count(PARSE_QUEUE), 1);
}

#[tokio::test]
async fn test_raised_limit_admits_up_to_the_limit() {
    let ctx = metered();
    let limiter = ImportLimiter::new(
        ctx.ctx.sites.clone(),
        ctx.ctx.statuses.clone(),
        ctx.ctx.metering,
    )
    .with_concurrent_limit(2);
    let intake = ImportIntake::new(limiter, ctx.ctx.statuses.clone(), ctx.ctx.queue.clone());

    for _ in 0..2 {
        let job = ctx.job(&pageviews_this_month(1));
        assert!(intake.submit(job).await.unwrap().is_allowed());
    }

    let third = intake.submit(ctx.job(&pageviews_this_month(1))).await.unwrap();
    assert_eq!(
        third.reason(),
        Some("Only 2 concurrent imports allowed per organization.")
    );
    assert_eq!(ctx.queue.sent_count(PARSE_QUEUE), 2);
}

#[tokio::test]
async fn test_concurrent_imports_allowed_when_unmetered() {
    let ctx = TestContext::unmetered();
    let intake = ctx.intake();

    for _ in 0..2 {
        let job = ctx.job(&pageviews_this_month(1));
        assert!(intake.submit(job).await.unwrap().is_allowed());
    }
    assert_eq!(ctx.queue.sent_count(PARSE_QUEUE), 2);
}

#[tokio::test]
async fn test_finished_import_frees_the_slot() {
    let ctx = metered();
    let intake = ctx.intake();

    let first = ctx.job(&pageviews_this_month(1));
    intake.submit(first.clone()).await.unwrap();
    ctx.statuses
        .update_status(first.import_id, &ImportStatus::Completed)
        .await
        .unwrap();

    let next = ctx.job(&pageviews_this_month(1));
    assert!(intake.submit(next).await.unwrap().is_allowed());
}

#[tokio::test]
async fn test_unknown_site_is_refused() {
    let ctx = TestContext::unmetered();
    let mut job = ctx.job(&pageviews_this_month(1));
    job.site = 9_999;

    let admission = ctx.intake().submit(job.clone()).await.unwrap();

    assert_eq!(
        admission,
        Admission::Denied {
            reason: SITE_NOT_FOUND.to_string()
        }
    );
    assert!(ctx.statuses.get(job.import_id).await.unwrap().is_none());
    assert_eq!(ctx.queue.sent_count(PARSE_QUEUE), 0);
}

#[tokio::test]
async fn test_admitted_import_is_pending() {
    let ctx = metered();
    let job = ctx.job(&pageviews_this_month(1));

    let admission = ctx.intake().submit(job.clone()).await.unwrap();

    assert_eq!(admission.organization(), Some(integration_tests::setup::ORG));
    let record = ctx.statuses.get(job.import_id).await.unwrap().unwrap();
    assert_eq!(record.status, ImportStatus::Pending);
    assert_eq!(record.site, SITE);
    assert_eq!(record.imported_events, 0);
}
