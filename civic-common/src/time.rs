//! Timestamp utilities

use chrono::{DateTime, NaiveDateTime, Utc};

/// Naive layouts accepted by [`parse_timestamp`]; SQLite's `CURRENT_TIMESTAMP`
/// produces the first one.
const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Parse a stored timestamp.
///
/// Offset-carrying (RFC 3339) input is converted to UTC. Naive input has no
/// offset and is taken to already be UTC. Returns `None` for anything else.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();

    if let Ok(aware) = DateTime::parse_from_rfc3339(value) {
        return Some(aware.with_timezone(&Utc));
    }

    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .map(|naive| naive.and_utc())
}

/// Format a timestamp the way it is written to the database
pub fn to_db_string(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339()
}

/// Whole days elapsed from `start` to `end` (negative if `end` precedes `start`)
pub fn days_between(start: &DateTime<Utc>, end: &DateTime<Utc>) -> i64 {
    end.signed_duration_since(*start).num_days()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_now_returns_recent_timestamp() {
        let timestamp = now();
        assert!(timestamp.timestamp() > 946_684_800); // 2000-01-01 00:00:00 UTC
        assert!(timestamp.timestamp() < 4_102_444_800); // 2100-01-01 00:00:00 UTC
    }

    #[test]
    fn test_parse_rfc3339_with_offset() {
        let parsed = parse_timestamp("2024-03-01T10:00:00+05:30").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2024, 3, 1, 4, 30, 0).unwrap());
    }

    #[test]
    fn test_parse_naive_sqlite_format_as_utc() {
        let parsed = parse_timestamp("2024-03-01 10:00:00").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_naive_iso_with_fraction() {
        let parsed = parse_timestamp("2024-03-01T10:00:00.250").unwrap();
        assert_eq!(parsed.timestamp_subsec_millis(), 250);
    }

    #[test]
    fn test_parse_garbage_is_none() {
        assert!(parse_timestamp("yesterday").is_none());
        assert!(parse_timestamp("").is_none());
    }

    #[test]
    fn test_db_string_round_trip() {
        let ts = Utc.with_ymd_and_hms(2023, 12, 31, 23, 59, 59).unwrap();
        assert_eq!(parse_timestamp(&to_db_string(&ts)), Some(ts));
    }

    #[test]
    fn test_days_between_truncates_partial_days() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(days_between(&start, &(start + Duration::hours(47))), 1);
        assert_eq!(days_between(&start, &(start + Duration::days(40))), 40);
        assert!(days_between(&(start + Duration::days(2)), &start) < 0);
    }
}
