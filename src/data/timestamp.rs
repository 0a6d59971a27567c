//! Timestamp normalization
//!
//! Input files mix date-only values, naive datetimes, and timezone-aware
//! datetimes. Everything is coerced to a UTC-aware value here, before any
//! business logic sees it, so event ordering is never at the mercy of a
//! parser default. Naive values are read as UTC; date-only values as UTC
//! midnight.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};

use crate::error::DataError;

/// Naive datetime formats accepted in input files
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Parse a raw timestamp string into a UTC-aware datetime.
///
/// Accepts RFC 3339 (offset or `Z`), naive datetimes, and bare dates.
pub fn parse_utc(raw: &str) -> Result<DateTime<Utc>, DataError> {
    let s = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN)));
    }

    Err(DataError::BadTimestamp(s.to_string()))
}

/// Join key component: the UTC calendar date of an event.
pub fn utc_day(ts: &DateTime<Utc>) -> NaiveDate {
    ts.date_naive()
}
