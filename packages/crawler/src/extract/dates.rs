//! Published-date parsing.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};

/// Hour assumed for date-only values; articles rarely carry a midnight
/// timestamp on purpose.
const ASSUMED_HOUR: u32 = 12;

/// Parse a published date: RFC 3339 as-is; a bare `YYYY-MM-DD` becomes
/// noon UTC; anything else is dropped.
pub fn parse_published(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();

    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }

    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        let time = NaiveTime::from_hms_opt(ASSUMED_HOUR, 0, 0)?;
        return Some(date.and_time(time).and_utc());
    }

    None
}
