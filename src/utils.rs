use crate::constants::DEFAULT_CACHE_TTL_SECONDS;
use crate::error::{Error, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};

/// Get cache TTL in seconds from environment variable or use default
pub fn get_cache_ttl_seconds() -> i64 {
    std::env::var("CACHE_TTL_SECONDS")
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .filter(|ttl| *ttl > 0)
        .unwrap_or(DEFAULT_CACHE_TTL_SECONDS)
}

/// Parse a candle open time.
///
/// Accepts `YYYY-MM-DD`, `YYYY-MM-DD HH:MM:SS` (optionally with fractional
/// seconds), RFC 3339, and epoch seconds / milliseconds.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return Err(Error::Parse("empty timestamp".to_string()));
    }

    if let Ok(epoch) = s.parse::<i64>() {
        // 13+ digits means milliseconds
        let parsed = if epoch.abs() >= 1_000_000_000_000 {
            Utc.timestamp_millis_opt(epoch).single()
        } else {
            Utc.timestamp_opt(epoch, 0).single()
        };
        return parsed.ok_or_else(|| Error::Parse(format!("epoch out of range: {}", s)));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(naive) = date.and_hms_opt(0, 0, 0) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }

    Err(Error::Parse(format!("unrecognized timestamp: {}", s)))
}

/// Format a timestamp as YYYY-MM-DD
pub fn format_date(time: &DateTime<Utc>) -> String {
    time.format("%Y-%m-%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    #[test]
    fn test_parse_timestamp_formats() {
        let date = parse_timestamp("2023-03-05").unwrap();
        assert_eq!((date.year(), date.month(), date.day()), (2023, 3, 5));

        let dt = parse_timestamp("2023-03-05 00:00:00").unwrap();
        assert_eq!(dt, date);

        let dt = parse_timestamp("2023-03-05 00:00:00.000").unwrap();
        assert_eq!(dt, date);

        let secs = parse_timestamp(&date.timestamp().to_string()).unwrap();
        assert_eq!(secs, date);

        let millis = parse_timestamp(&date.timestamp_millis().to_string()).unwrap();
        assert_eq!(millis, date);
    }

    #[test]
    fn test_parse_timestamp_rejects_garbage() {
        assert!(parse_timestamp("").is_err());
        assert!(parse_timestamp("   ").is_err());
        assert!(parse_timestamp("yesterday").is_err());
    }
}
