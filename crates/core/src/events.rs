//! Event records in the storage schema of the events table.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::retention::MonthKey;
use crate::tenant::SiteId;

/// Event classification in the events table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Pageview,
    CustomEvent,
    Performance,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pageview => "pageview",
            Self::CustomEvent => "custom_event",
            Self::Performance => "performance",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pageview" => Some(Self::Pageview),
            "custom_event" => Some(Self::CustomEvent),
            "performance" => Some(Self::Performance),
            _ => None,
        }
    }
}

/// An imported event, ready for bulk loading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub site_id: SiteId,
    pub import_id: String,
    pub event_type: EventType,
    pub timestamp: DateTime<Utc>,
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
    /// JSON object of utm and click-id parameters.
    pub url_parameters: String,
}

/// Event count for one calendar month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyCount {
    pub month: MonthKey,
    pub count: u64,
}
