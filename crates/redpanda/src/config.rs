//! Redpanda configuration.

use serde::{Deserialize, Serialize};

/// Where a partition consumer starts when no position was ever saved for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StartOffset {
    #[default]
    Earliest,
    Latest,
}

/// Redpanda job queue configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedpandaConfig {
    /// Broker addresses
    pub brokers: Vec<String>,
    /// SASL username (Redpanda Cloud); enables TLS + SCRAM-SHA-256 with the password
    #[serde(default)]
    pub sasl_username: Option<String>,
    #[serde(default)]
    pub sasl_password: Option<String>,
    /// Prepended to queue names to form topic names
    #[serde(default)]
    pub topic_prefix: String,
    /// Replication factor for topics created on startup
    #[serde(default = "default_replication_factor")]
    pub replication_factor: i16,
    /// Compression type (none, gzip, snappy, lz4, zstd)
    #[serde(default = "default_compression")]
    pub compression: String,
    /// Longest a poll waits for new records, in milliseconds
    #[serde(default = "default_fetch_max_wait_ms")]
    pub fetch_max_wait_ms: i32,
    /// Upper bound on bytes returned by one fetch
    #[serde(default = "default_fetch_max_bytes")]
    pub fetch_max_bytes: i32,
    #[serde(default)]
    pub start_offset: StartOffset,
}

fn default_replication_factor() -> i16 {
    1
}

fn default_compression() -> String {
    "zstd".to_string()
}

fn default_fetch_max_wait_ms() -> i32 {
    500
}

fn default_fetch_max_bytes() -> i32 {
    // One insert job carries up to 5000 rows
    32 * 1024 * 1024
}

impl Default for RedpandaConfig {
    fn default() -> Self {
        Self {
            brokers: vec!["localhost:9092".to_string()],
            sasl_username: None,
            sasl_password: None,
            topic_prefix: String::new(),
            replication_factor: default_replication_factor(),
            compression: default_compression(),
            fetch_max_wait_ms: default_fetch_max_wait_ms(),
            fetch_max_bytes: default_fetch_max_bytes(),
            start_offset: StartOffset::default(),
        }
    }
}

impl RedpandaConfig {
    /// Returns the broker list as a comma-separated string.
    pub fn broker_string(&self) -> String {
        self.brokers.join(",")
    }

    /// Topic backing a queue.
    pub fn topic_name(&self, queue: &str) -> String {
        format!("{}{}", self.topic_prefix, queue)
    }

    pub fn has_credentials(&self) -> bool {
        self.sasl_username.is_some() && self.sasl_password.is_some()
    }
}
