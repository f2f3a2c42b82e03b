pub mod admin_user;
pub mod credential;

use chrono::{DateTime, SecondsFormat, Utc};

/// Timestamps are stored as RFC 3339 text in UTC with second precision.
pub fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn parse_ts(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
