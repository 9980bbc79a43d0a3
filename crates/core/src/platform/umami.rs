//! Umami website-event CSV exports.

use serde_json::{Map, Value};
use tracing::warn;
use uuid::Uuid;

use super::{CanonicalRow, ImportPlatform, CREATED_AT};
use crate::events::{EventRecord, EventType};
use crate::retention::parse_event_timestamp;
use crate::tenant::SiteId;

/// Column order of an Umami export.
pub const HEADERS: &[&str] = &[
    "website_id",
    "session_id",
    "visit_id",
    "event_id",
    "hostname",
    "browser",
    "os",
    "device",
    "screen",
    "language",
    "country",
    "subdivision1",
    "subdivision2",
    "city",
    "url_path",
    "url_query",
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_content",
    "utm_term",
    "referrer_path",
    "referrer_query",
    "referrer_domain",
    "page_title",
    "gclid",
    "fbclid",
    "msclkid",
    "ttclid",
    "li_fat_id",
    "twclid",
    "event_type",
    "event_name",
    "tag",
    "distinct_id",
    CREATED_AT,
    "job_id",
];

/// Columns carried into `url_parameters`.
const URL_PARAMETER_COLUMNS: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_content",
    "utm_term",
    "gclid",
    "fbclid",
    "msclkid",
    "ttclid",
    "li_fat_id",
    "twclid",
];

/// Umami `event_type` for custom events; everything else is a pageview.
const UMAMI_CUSTOM_EVENT: &str = "2";

pub const PLATFORM: ImportPlatform = ImportPlatform {
    name: "umami",
    headers: HEADERS,
    transform,
};

fn field<'a>(row: &'a CanonicalRow, name: &str) -> &'a str {
    row.get(name).map(|v| v.trim()).unwrap_or("")
}

fn transform(rows: &[CanonicalRow], site: SiteId, import_id: Uuid) -> Vec<EventRecord> {
    let import_id = import_id.to_string();
    rows.iter()
        .filter_map(|row| {
            let record = to_record(row, site, &import_id);
            if record.is_none() {
                warn!(
                    import_id = %import_id,
                    created_at = field(row, CREATED_AT),
                    "Skipping Umami row with unparsable timestamp"
                );
            }
            record
        })
        .collect()
}

fn to_record(row: &CanonicalRow, site: SiteId, import_id: &str) -> Option<EventRecord> {
    let timestamp = parse_event_timestamp(field(row, CREATED_AT))?;

    let event_type = if field(row, "event_type") == UMAMI_CUSTOM_EVENT {
        EventType::CustomEvent
    } else {
        EventType::Pageview
    };

    let (screen_width, screen_height) = parse_screen(field(row, "screen"));

    Some(EventRecord {
        site_id: site,
        import_id: import_id.to_string(),
        event_type,
        timestamp,
        session_id: field(row, "session_id").to_string(),
        user_id: field(row, "distinct_id").to_string(),
        hostname: field(row, "hostname").to_string(),
        pathname: field(row, "url_path").to_string(),
        querystring: with_prefix('?', field(row, "url_query")),
        page_title: field(row, "page_title").to_string(),
        referrer: referrer(row),
        browser: field(row, "browser").to_string(),
        operating_system: field(row, "os").to_string(),
        device_type: device_type(field(row, "device")),
        screen_width,
        screen_height,
        language: field(row, "language").to_string(),
        country: field(row, "country").to_uppercase(),
        region: field(row, "subdivision1").to_string(),
        city: field(row, "city").to_string(),
        event_name: match event_type {
            EventType::CustomEvent => field(row, "event_name").to_string(),
            _ => String::new(),
        },
        url_parameters: url_parameters(row),
    })
}

fn with_prefix(prefix: char, value: &str) -> String {
    if value.is_empty() || value.starts_with(prefix) {
        value.to_string()
    } else {
        format!("{}{}", prefix, value)
    }
}

fn referrer(row: &CanonicalRow) -> String {
    let domain = field(row, "referrer_domain");
    if domain.is_empty() {
        return String::new();
    }
    format!(
        "https://{}{}{}",
        domain,
        field(row, "referrer_path"),
        with_prefix('?', field(row, "referrer_query"))
    )
}

fn device_type(device: &str) -> String {
    match device.to_ascii_lowercase().as_str() {
        "desktop" | "laptop" => "Desktop".to_string(),
        "mobile" => "Mobile".to_string(),
        "tablet" => "Tablet".to_string(),
        _ => device.to_string(),
    }
}

fn parse_screen(screen: &str) -> (u16, u16) {
    screen
        .split_once('x')
        .and_then(|(w, h)| Some((w.trim().parse().ok()?, h.trim().parse().ok()?)))
        .unwrap_or((0, 0))
}

fn url_parameters(row: &CanonicalRow) -> String {
    let params: Map<String, Value> = URL_PARAMETER_COLUMNS
        .iter()
        .filter_map(|&name| {
            let value = field(row, name);
            (!value.is_empty()).then(|| (name.to_string(), Value::String(value.to_string())))
        })
        .collect();
    Value::Object(params).to_string()
}
