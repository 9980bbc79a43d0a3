//! Bulk insert of imported events.

use crate::client::ClickHouseClient;
use crate::schema::EVENTS_TABLE;
use chrono::{DateTime, Utc};
use clickhouse::Row;
use engine_core::{Error, EventRecord, EventType, Result};
use serde::{Deserialize, Serialize};
use telemetry::metrics;
use tracing::debug;

/// Flattened event row for the events table.
#[derive(Debug, Clone, Row, Serialize, Deserialize)]
pub struct EventRow {
    pub site_id: u32,
    pub import_id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub timestamp: i64, // DateTime64(3) as milliseconds
    pub session_id: String,
    pub user_id: String,
    pub hostname: String,
    pub pathname: String,
    pub querystring: String,
    pub page_title: String,
    pub referrer: String,
    pub browser: String,
    pub operating_system: String,
    pub device_type: String,
    pub screen_width: u16,
    pub screen_height: u16,
    pub language: String,
    pub country: String,
    pub region: String,
    pub city: String,
    pub event_name: String,
    pub url_parameters: String,
}

impl From<EventRecord> for EventRow {
    fn from(record: EventRecord) -> Self {
        Self {
            site_id: record.site_id,
            import_id: record.import_id,
            event_type: record.event_type.as_str().to_string(),
            timestamp: record.timestamp.timestamp_millis(),
            session_id: record.session_id,
            user_id: record.user_id,
            hostname: record.hostname,
            pathname: record.pathname,
            querystring: record.querystring,
            page_title: record.page_title,
            referrer: record.referrer,
            browser: record.browser,
            operating_system: record.operating_system,
            device_type: record.device_type,
            screen_width: record.screen_width,
            screen_height: record.screen_height,
            language: record.language,
            country: record.country,
            region: record.region,
            city: record.city,
            event_name: record.event_name,
            url_parameters: record.url_parameters,
        }
    }
}

impl TryFrom<EventRow> for EventRecord {
    type Error = Error;

    fn try_from(row: EventRow) -> Result<Self> {
        let event_type = EventType::parse(&row.event_type)
            .ok_or_else(|| Error::database(format!("Unknown event type: {}", row.event_type)))?;
        let timestamp = DateTime::<Utc>::from_timestamp_millis(row.timestamp)
            .ok_or_else(|| Error::database(format!("Invalid timestamp: {}", row.timestamp)))?;

        Ok(Self {
            site_id: row.site_id,
            import_id: row.import_id,
            event_type,
            timestamp,
            session_id: row.session_id,
            user_id: row.user_id,
            hostname: row.hostname,
            pathname: row.pathname,
            querystring: row.querystring,
            page_title: row.page_title,
            referrer: row.referrer,
            browser: row.browser,
            operating_system: row.operating_system,
            device_type: row.device_type,
            screen_width: row.screen_width,
            screen_height: row.screen_height,
            language: row.language,
            country: row.country,
            region: row.region,
            city: row.city,
            event_name: row.event_name,
            url_parameters: row.url_parameters,
        })
    }
}

/// Writes all records in a single INSERT.
///
/// Either the whole batch is acknowledged by `end()` or an error is
/// returned; ClickHouse applies one INSERT block atomically.
pub async fn insert_events(client: &ClickHouseClient, records: Vec<EventRecord>) -> Result<usize> {
    if records.is_empty() {
        return Ok(0);
    }

    let count = records.len();
    let start = std::time::Instant::now();
    let timeout = Some(client.timeout());

    let mut insert = client
        .inner()
        .insert::<EventRow>(EVENTS_TABLE)
        .map_err(|e| Error::database(format!("Insert error: {}", e)))?
        .with_timeouts(timeout, timeout);

    for record in records {
        insert
            .write(&EventRow::from(record))
            .await
            .map_err(|e| Error::database(format!("Write error: {}", e)))?;
    }

    insert
        .end()
        .await
        .map_err(|e| Error::database(format!("End error: {}", e)))?;

    let elapsed = start.elapsed();
    metrics().insert_latency_ms.observe(elapsed.as_millis() as u64);

    debug!(
        count = count,
        latency_ms = %elapsed.as_millis(),
        "Inserted events to ClickHouse"
    );

    Ok(count)
}
