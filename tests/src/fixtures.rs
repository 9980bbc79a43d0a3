//! Umami export fixtures.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Datelike, Duration, Months, TimeZone, Utc};
use engine_core::limits::EVENT_TIMESTAMP_FORMAT;
use engine_core::platform::umami::HEADERS;
use uuid::Uuid;

/// One row of an Umami website-event export.
#[derive(Debug, Clone, Default)]
pub struct UmamiRow {
    fields: HashMap<&'static str, String>,
}

impl UmamiRow {
    /// A pageview at `created_at` (`yyyy-MM-dd HH:mm:ss`).
    pub fn pageview(created_at: impl Into<String>) -> Self {
        Self::default()
            .with("website_id", Uuid::nil().to_string())
            .with("session_id", Uuid::new_v4().to_string())
            .with("hostname", "example.com")
            .with("browser", "chrome")
            .with("os", "Mac OS")
            .with("device", "desktop")
            .with("screen", "1920x1080")
            .with("language", "en-US")
            .with("country", "DE")
            .with("city", "Berlin")
            .with("url_path", "/")
            .with("page_title", "Home")
            .with("event_type", "1")
            .with("created_at", created_at)
    }

    /// A custom event named `name`.
    pub fn custom_event(created_at: impl Into<String>, name: &str) -> Self {
        Self::pageview(created_at)
            .with("event_type", "2")
            .with("event_name", name)
    }

    pub fn with(mut self, field: &'static str, value: impl Into<String>) -> Self {
        self.fields.insert(field, value.into());
        self
    }

    fn record(&self) -> Vec<&str> {
        HEADERS
            .iter()
            .map(|h| self.fields.get(h).map(String::as_str).unwrap_or(""))
            .collect()
    }
}

/// Renders rows as an Umami CSV export, header line included.
pub fn umami_csv(rows: &[UmamiRow]) -> String {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(HEADERS).unwrap();
    for row in rows {
        writer.write_record(row.record()).unwrap();
    }
    String::from_utf8(writer.into_inner().unwrap()).unwrap()
}

/// Writes an export into `dir` and returns its path.
pub fn write_export(dir: &Path, rows: &[UmamiRow]) -> PathBuf {
    let path = dir.join(format!("{}.csv", Uuid::new_v4()));
    std::fs::write(&path, umami_csv(rows)).unwrap();
    path
}

pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.format(EVENT_TIMESTAMP_FORMAT).to_string()
}

/// Midnight UTC on the first day of the month `n` months before the current one.
pub fn months_ago(n: u32) -> DateTime<Utc> {
    let now = Utc::now();
    let first = Utc
        .with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
        .unwrap();
    first.checked_sub_months(Months::new(n)).unwrap()
}

/// `count` timestamps in the current month, one second apart, never in
/// the future.
pub fn this_month(count: usize) -> Vec<String> {
    let start = months_ago(0);
    (0..count)
        .map(|i| format_timestamp(start + Duration::seconds(i as i64)))
        .collect()
}

/// `count` pageviews in the current month.
pub fn pageviews_this_month(count: usize) -> Vec<UmamiRow> {
    this_month(count).into_iter().map(UmamiRow::pageview).collect()
}
