//! User-supplied import date range.

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use engine_core::limits::DATE_FORMAT;
use engine_core::retention::parse_event_timestamp;
use engine_core::{Error, Result};

/// Inclusive day range in UTC. Either end may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
}

impl DateRange {
    /// Builds the range from `yyyy-MM-dd` strings. An invalid date is a
    /// configuration error.
    pub fn parse(start: Option<&str>, end: Option<&str>) -> Result<Self> {
        let start = start
            .map(|value| parse_day(value, "start"))
            .transpose()?
            .map(|day| Utc.from_utc_datetime(&day.and_time(NaiveTime::MIN)));

        let end = end
            .map(|value| parse_day(value, "end"))
            .transpose()?
            .map(|day| {
                let last = NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap_or(NaiveTime::MIN);
                Utc.from_utc_datetime(&day.and_time(last))
            });

        Ok(Self { start, end })
    }

    pub fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    /// Whether a source timestamp falls in the range. Unparsable timestamps
    /// never do.
    pub fn contains(&self, created_at: &str) -> bool {
        let Some(ts) = parse_event_timestamp(created_at) else {
            return false;
        };
        if self.start.is_some_and(|start| ts < start) {
            return false;
        }
        if self.end.is_some_and(|end| ts > end) {
            return false;
        }
        true
    }
}

fn parse_day(value: &str, which: &'static str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).map_err(|_| Error::InvalidDate {
        which,
        value: value.to_string(),
    })
}
