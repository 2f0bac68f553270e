//! Lenient timestamp parsing for checkpoint queries.
//!
//! Stored `offense_date` values come straight from the API and, in older
//! documents, from other writers, so the text can appear in several
//! shapes:
//! - `2024-01-15T10:30:00.000` (Socrata)
//! - `2024-01-15 10:30:00` (`DuckDB` `::TEXT` cast, no fraction)
//! - `2024-01-15 10:30:00.123` (fractional seconds)
//! - `2024-01-15 10:30:00+00` (with timezone)
//!
//! [`parse_timestamp`] tries them in order and returns the first match.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
];

const ZONED_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%#z",
    "%Y-%m-%d %H:%M:%S%.f%#z",
    "%Y-%m-%dT%H:%M:%S%#z",
    "%Y-%m-%dT%H:%M:%S%.f%#z",
];

/// Parses a stored timestamp into a naive UTC datetime.
///
/// Zoned values are converted to UTC. A bare date is read as midnight.
#[must_use]
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();

    if let Some(naive) = NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
    {
        return Some(naive);
    }

    if let Some(zoned) = ZONED_FORMATS
        .iter()
        .find_map(|fmt| DateTime::parse_from_str(s, fmt).ok())
    {
        return Some(zoned.with_timezone(&Utc).naive_utc());
    }

    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}
