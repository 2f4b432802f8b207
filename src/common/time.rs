//! Simple time helpers used by multiple services.

use chrono::{DateTime, SecondsFormat, Utc};
use std::time::{SystemTime, UNIX_EPOCH};

/// Current timestamp in milliseconds since the Unix epoch.
pub fn now_ms() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
}

/// Current wall-clock time in UTC.
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// ISO-8601 rendering used for history and evaluation timestamps.
pub fn iso(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Render a stored timestamp as a short chart label.
///
/// Accepts RFC 3339 as well as the naive `YYYY-MM-DDTHH:MM:SS.ffffff` form
/// found in older history files.
pub fn chart_label(raw: &str) -> Option<String> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.format("%Y-%m-%d %H:%M").to_string());
    }
    chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|ts| ts.format("%Y-%m-%d %H:%M").to_string())
}
