//! Read queries: monthly usage for quota seeding, and lookups by import
//! (used in tests and admin).

use crate::client::ClickHouseClient;
use crate::insert::EventRow;
use chrono::NaiveDate;
use clickhouse::Row;
use engine_core::{Error, EventRecord, EventType, MonthKey, MonthlyCount, Result, SiteId};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Clone, Row, Deserialize)]
struct MonthlyCountRow {
    month: u32,
    count: u64,
}

/// Counts events per month for `sites` and `event_types` since `since`.
pub async fn monthly_event_counts(
    client: &ClickHouseClient,
    sites: &[SiteId],
    event_types: &[EventType],
    since: NaiveDate,
) -> Result<Vec<MonthlyCount>> {
    if sites.is_empty() || event_types.is_empty() {
        return Ok(Vec::new());
    }

    let types: Vec<&str> = event_types.iter().map(|t| t.as_str()).collect();

    let rows: Vec<MonthlyCountRow> = client
        .inner()
        .query(
            "SELECT toYYYYMM(timestamp) AS month, count() AS count FROM events \
             WHERE has(?, site_id) AND has(?, type) AND timestamp >= toDate(?) \
             GROUP BY month ORDER BY month",
        )
        .bind(sites)
        .bind(types)
        .bind(since.format("%Y-%m-%d").to_string())
        .fetch_all()
        .await
        .map_err(|e| Error::database(format!("Query error: {}", e)))?;

    rows.into_iter()
        .map(|row| {
            let month = MonthKey::new((row.month / 100) as i32, row.month % 100)
                .ok_or_else(|| Error::database(format!("Invalid month: {}", row.month)))?;
            Ok(MonthlyCount {
                month,
                count: row.count,
            })
        })
        .collect()
}

/// Count events loaded by one import.
pub async fn count_import_events(client: &ClickHouseClient, import_id: Uuid) -> Result<u64> {
    let count: u64 = client
        .inner()
        .query("SELECT count() FROM events WHERE import_id = ?")
        .bind(import_id.to_string())
        .fetch_one()
        .await
        .map_err(|e| Error::database(format!("Query error: {}", e)))?;
    Ok(count)
}

/// Fetch events loaded by one import, oldest first.
pub async fn query_import_events(
    client: &ClickHouseClient,
    import_id: Uuid,
    limit: u32,
) -> Result<Vec<EventRecord>> {
    let rows: Vec<EventRow> = client
        .inner()
        .query("SELECT ?fields FROM events WHERE import_id = ? ORDER BY timestamp LIMIT ?")
        .bind(import_id.to_string())
        .bind(limit)
        .fetch_all()
        .await
        .map_err(|e| Error::database(format!("Query error: {}", e)))?;

    rows.into_iter().map(EventRecord::try_from).collect()
}

/// Delete all events of one import (test cleanup).
pub async fn delete_import_events(client: &ClickHouseClient, import_id: Uuid) -> Result<()> {
    client
        .inner()
        .query("ALTER TABLE events DELETE WHERE import_id = ?")
        .bind(import_id.to_string())
        .execute()
        .await
        .map_err(|e| Error::database(format!("Delete error: {}", e)))?;
    Ok(())
}
