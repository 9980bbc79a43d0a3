//! Calendar-month keys and the historical import window.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Months, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::limits::EVENT_TIMESTAMP_FORMAT;

/// A calendar month, displayed as six-digit `yyyyMM`.
///
/// Ordering is chronological.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MonthKey(u32);

/// Window floor used when metering is disabled.
pub const UNMETERED_OLDEST_MONTH: MonthKey = MonthKey(190001);

/// Years a month key can represent.
const YEAR_RANGE: std::ops::RangeInclusive<i32> = 0..=9999;

impl MonthKey {
    /// Creates a key from a year and a 1-based month.
    pub fn new(year: i32, month: u32) -> Option<Self> {
        if !(1..=12).contains(&month) || !YEAR_RANGE.contains(&year) {
            return None;
        }
        Some(Self(year as u32 * 100 + month))
    }

    /// Month of `date`, clamped to years `0..=9999`.
    pub fn of<D: Datelike>(date: &D) -> Self {
        let year = date.year().clamp(*YEAR_RANGE.start(), *YEAR_RANGE.end());
        Self(year as u32 * 100 + date.month())
    }

    /// Months elapsed since January of year 0.
    fn index(&self) -> i64 {
        self.year() as i64 * 12 + self.month() as i64 - 1
    }

    pub fn year(&self) -> i32 {
        (self.0 / 100) as i32
    }

    pub fn month(&self) -> u32 {
        self.0 % 100
    }

    /// The month `n` months before this one.
    pub fn minus_months(&self, n: u32) -> Self {
        let total = (self.index() - n as i64).max(0);
        Self((total / 12) as u32 * 100 + (total % 12) as u32 + 1)
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:06}", self.0)
    }
}

impl FromStr for MonthKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 6 || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(format!("Invalid month key: {}", s));
        }
        let raw: u32 = s.parse().map_err(|_| format!("Invalid month key: {}", s))?;
        Self::new((raw / 100) as i32, raw % 100).ok_or_else(|| format!("Invalid month key: {}", s))
    }
}

impl TryFrom<String> for MonthKey {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MonthKey> for String {
    fn from(key: MonthKey) -> Self {
        key.to_string()
    }
}

/// Parses a source-file event timestamp (`yyyy-MM-dd HH:mm:ss`, UTC).
///
/// `%Y` accepts signed and five-digit years; anything outside `0..=9999`
/// is treated as unparsable.
pub fn parse_event_timestamp(value: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value.trim(), EVENT_TIMESTAMP_FORMAT)
        .ok()
        .filter(|naive| YEAR_RANGE.contains(&naive.year()))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Floors `now - months` to the start of its month, never earlier than
/// January of year 0.
pub fn oldest_allowed_date(now: DateTime<Utc>, months: u32) -> NaiveDate {
    let floor = NaiveDate::from_ymd_opt(*YEAR_RANGE.start(), 1, 1).unwrap_or(NaiveDate::MIN);
    let shifted = now
        .date_naive()
        .checked_sub_months(Months::new(months))
        .unwrap_or(floor)
        .max(floor);
    shifted.with_day(1).unwrap_or(shifted)
}

/// Month key of the oldest importable month for a window of `months`.
pub fn oldest_allowed_month(now: DateTime<Utc>, months: u32) -> MonthKey {
    MonthKey::of(&oldest_allowed_date(now, months))
}

/// The `months` most recent months ending with the current one, oldest first.
/// Never reaches before January of year 0.
pub fn window_months(now: DateTime<Utc>, months: u32) -> Vec<MonthKey> {
    let current = MonthKey::of(&now);
    let months = (months as i64).min(current.index() + 1) as u32;
    (0..months).rev().map(|i| current.minus_months(i)).collect()
}
