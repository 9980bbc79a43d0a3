//! ClickHouse table schemas.
//!
//! Imported events share the `events` table with live traffic; `import_id`
//! is empty for live events. Monthly quota queries aggregate on
//! `toYYYYMM(timestamp)`, which matches the partition key.

/// Name of the events table.
pub const EVENTS_TABLE: &str = "events";

/// SQL for creating the database.
pub fn create_database(database: &str) -> String {
    format!("CREATE DATABASE IF NOT EXISTS {}", database)
}

/// SQL for creating the events table.
pub fn create_events_table(database: &str) -> String {
    format!(
        r#"
CREATE TABLE IF NOT EXISTS {database}.{EVENTS_TABLE} (
    site_id UInt32,
    import_id String DEFAULT '',
    type LowCardinality(String),
    timestamp DateTime64(3),

    -- Identity
    session_id String,
    user_id String,

    -- Page
    hostname String,
    pathname String,
    querystring String,
    page_title String,
    referrer String,

    -- Client
    browser LowCardinality(String),
    operating_system LowCardinality(String),
    device_type LowCardinality(String),
    screen_width UInt16,
    screen_height UInt16,
    language LowCardinality(String),

    -- Location
    country LowCardinality(String),
    region LowCardinality(String),
    city String,

    -- Custom events and campaign parameters
    event_name String,
    url_parameters String,

    created_at DateTime DEFAULT now()
)
ENGINE = MergeTree()
PARTITION BY toYYYYMM(timestamp)
ORDER BY (site_id, timestamp)
SETTINGS index_granularity = 8192
"#
    )
}

/// All DDL statements, in execution order.
pub fn all_statements(database: &str) -> Vec<String> {
    vec![create_database(database), create_events_table(database)]
}
