//! Timestamp coercion into local time.

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime};

/// Parse a source timestamp. Offset-less values are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Local>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Local));
    }

    // ISO 8601 basic offsets, e.g. `+0000`, which RFC 3339 rejects.
    if let Ok(dt) = DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Some(dt.with_timezone(&Local));
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc().with_timezone(&Local));
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc().with_timezone(&Local))
}

/// Like [`parse_timestamp`], but never fails: unparseable input becomes now.
pub fn resolve_timestamp(raw: Option<&str>) -> DateTime<Local> {
    match raw.and_then(parse_timestamp) {
        Some(dt) => dt,
        None => {
            tracing::debug!(raw = ?raw, "Could not parse backup timestamp, using current time");
            Local::now()
        }
    }
}
