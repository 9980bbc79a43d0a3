//! Pipeline against a real ClickHouse.
//!
//! Requires Docker (or `IMPORT_TEST_CLICKHOUSE_URL`); run with
//! `cargo test -p integration-tests -- --ignored`.

use std::sync::Arc;

use chrono::NaiveDate;
use clickhouse_client::{
    count_import_events, delete_import_events, health::init_schema, monthly_event_counts,
    query_import_events, ClickHouseClient, ClickHouseEventStore,
};
use engine_core::{EventType, ImportStatus};
use integration_tests::containers::TestContainers;
use integration_tests::fixtures::{format_timestamp, months_ago, this_month, UmamiRow};
use integration_tests::setup::{TestContext, SITE};

async fn clickhouse(containers: &TestContainers) -> ClickHouseClient {
    let client = ClickHouseClient::new(containers.clickhouse_config())
        .expect("Failed to create ClickHouse client");

    init_schema(&client)
        .await
        .expect("Failed to initialize schema");
    client
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_imported_rows_read_back_from_clickhouse() {
    let containers = TestContainers::start().await;
    let client = clickhouse(&containers).await;

    let mut ctx = TestContext::unmetered();
    ctx.ctx.events = Arc::new(ClickHouseEventStore::new(client.clone()));

    let created_at = this_month(2);
    let rows = vec![
        UmamiRow::pageview(created_at[0].clone())
            .with("url_path", "/docs")
            .with("utm_campaign", "launch"),
        UmamiRow::custom_event(created_at[1].clone(), "download"),
    ];
    let job = ctx.pending_job(&rows).await;

    let (parsed, _) = ctx.run_import(&job).await;
    assert_eq!(parsed.accepted, 2);
    assert_eq!(ctx.statuses.status(job.import_id), Some(ImportStatus::Completed));

    assert_eq!(count_import_events(&client, job.import_id).await.unwrap(), 2);

    let events = query_import_events(&client, job.import_id, 10).await.unwrap();
    assert_eq!(events.len(), 2);
    assert!(events.iter().all(|e| e.site_id == SITE));
    assert!(events
        .iter()
        .all(|e| e.import_id == job.import_id.to_string()));

    assert_eq!(events[0].event_type, EventType::Pageview);
    assert_eq!(format_timestamp(events[0].timestamp), created_at[0]);
    assert_eq!(events[0].pathname, "/docs");
    assert_eq!(events[0].url_parameters, r#"{"utm_campaign":"launch"}"#);
    assert_eq!(events[1].event_type, EventType::CustomEvent);
    assert_eq!(events[1].event_name, "download");

    let since: NaiveDate = months_ago(0).date_naive();
    let counts = monthly_event_counts(
        &client,
        &[SITE],
        &[EventType::Pageview, EventType::CustomEvent],
        since,
    )
    .await
    .unwrap();
    let total: u64 = counts.iter().map(|c| c.count).sum();
    assert!(total >= 2);

    delete_import_events(&client, job.import_id).await.ok();
}
