use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

const ACTIVITY_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ActivityId(pub String);

impl ActivityId {
    /// Fresh client-side identifier for a draft that has never been stored.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for ActivityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ActivityId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ActivityId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    #[serde(default)]
    pub id: ActivityId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub venue: String,
}

impl Activity {
    /// Copy of the activity with its date cut down to whole seconds.
    pub fn normalized(mut self) -> Self {
        self.date = normalize_date(&self.date);
        self
    }

    pub fn parsed_date(&self) -> Option<NaiveDateTime> {
        parse_activity_date(&self.date)
    }
}

/// Drops everything from the first `.` on, so `2024-01-01T10:00:00.000Z`
/// becomes `2024-01-01T10:00:00`.
pub fn normalize_date(raw: &str) -> String {
    match raw.split_once('.') {
        Some((head, _)) => head.to_string(),
        None => raw.to_string(),
    }
}

/// RFC 3339 values with an offset are converted to UTC. Values without an
/// offset, including a trailing `Z`, are taken as wall-clock time.
///
/// Known limitation: `normalize_date` drops the offset together with the
/// fraction, so `...T11:00:00.000+02:00` is read as 11:00 while
/// `...T11:00:00+02:00` is read as 09:00 UTC. The same instant can therefore
/// sort differently depending on whether the server sent fractional seconds.
pub fn parse_activity_date(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.naive_utc());
    }

    let local = raw.trim_end_matches('Z').replacen(' ', "T", 1);
    NaiveDateTime::parse_from_str(&local, ACTIVITY_DATE_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(&local, "%Y-%m-%dT%H:%M"))
        .ok()
}

pub fn format_activity_date(value: NaiveDateTime) -> String {
    value.format(ACTIVITY_DATE_FORMAT).to_string()
}

/// Date pickers and time pickers hand back separate values; the time keeps
/// hours and minutes only.
pub fn combine_date_and_time(date: NaiveDate, time: NaiveTime) -> NaiveDateTime {
    let time = time
        .with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(time);
    date.and_time(time)
}
