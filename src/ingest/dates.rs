//! Date parsing for activity rows.
//!
//! Timestamps are reduced to their calendar day. Offset-aware values keep
//! their local wall-clock date, the same as dropping the offset.

use chrono::{DateTime, NaiveDate, NaiveDateTime};

const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Parse `YYYY-MM-DD`, RFC 3339, or a naive/`UTC`-suffixed timestamp.
pub fn parse_activity_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim().trim_matches('"');
    if s.is_empty() {
        return None;
    }

    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(d);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_local().date());
    }

    let naive = s.strip_suffix(" UTC").unwrap_or(s);
    NAIVE_DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(naive, fmt).ok())
        .map(|dt| dt.date())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_accepted_formats() {
        assert_eq!(parse_activity_date("2024-02-29"), Some(d(2024, 2, 29)));
        assert_eq!(parse_activity_date("2024-02-29 00:00:00.000 UTC"), Some(d(2024, 2, 29)));
        assert_eq!(parse_activity_date("2024-02-29T23:10:00"), Some(d(2024, 2, 29)));
        assert_eq!(parse_activity_date("2024-02-29T23:10:00-05:00"), Some(d(2024, 2, 29)));
        assert_eq!(parse_activity_date(" 2024-03-01 "), Some(d(2024, 3, 1)));
    }

    #[test]
    fn test_rejects_garbage() {
        assert_eq!(parse_activity_date(""), None);
        assert_eq!(parse_activity_date("03/01/2024"), None);
        assert_eq!(parse_activity_date("2024-13-01"), None);
    }
}
