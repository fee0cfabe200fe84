use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};

use crate::error::TaxLotError;

/// A trade time together with the UTC offset it was recorded in.
///
/// Comparisons use the instant, formatting uses the local wall-clock time of the feed.
pub type Timestamp = DateTime<FixedOffset>;

const DATE_TIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
];

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d"];

/// Parses a trade date from the order feed.
///
/// RFC 3339 input keeps its offset. Input without an offset is taken as UTC, and a bare date maps
/// to midnight.
pub fn parse_timestamp(s: &str) -> Result<Timestamp, TaxLotError> {
    let s = s.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt);
    }
    for format in DATE_TIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(dt.and_utc().fixed_offset());
        }
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, format) {
            return Ok(date.and_time(NaiveTime::MIN).and_utc().fixed_offset());
        }
    }

    Err(TaxLotError::DateParseError(s.to_string()))
}
