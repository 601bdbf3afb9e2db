//! Timestamp utilities and period keys

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Utc};

/// Parse a timestamp as sent by the history API
///
/// Accepts RFC 3339 (`2025-11-20T10:00:00Z`, `+01:00` offsets), naive
/// date-times (`2025-11-20T10:00:00`, optional fraction, taken as UTC) and
/// bare dates.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// `YYYY`
pub fn year_key(dt: &DateTime<Utc>) -> String {
    format!("{:04}", dt.year())
}

/// `YYYY-MM`
pub fn month_key(dt: &DateTime<Utc>) -> String {
    format!("{:04}-{:02}", dt.year(), dt.month())
}

/// ISO week `YYYY-Www` (the ISO year, which differs around new year)
pub fn iso_week_key(dt: &DateTime<Utc>) -> String {
    let week = dt.iso_week();
    format!("{:04}-W{:02}", week.year(), week.week())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = Utc.with_ymd_and_hms(2025, 11, 20, 10, 0, 0).unwrap();
        assert_eq!(parse_timestamp("2025-11-20T10:00:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2025-11-20T11:00:00+01:00"), Some(expected));
        assert_eq!(parse_timestamp("2025-11-20T10:00:00"), Some(expected));
        assert_eq!(parse_timestamp("2025-11-20T10:00:00.000123"), Some(expected + chrono::Duration::microseconds(123)));
        assert_eq!(parse_timestamp("2025-11-20 10:00:00"), Some(expected));
        assert_eq!(
            parse_timestamp("2025-11-20"),
            Some(Utc.with_ymd_and_hms(2025, 11, 20, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_parse_timestamp_rejects_garbage() {
        assert_eq!(parse_timestamp(""), None);
        assert_eq!(parse_timestamp("yesterday"), None);
        assert_eq!(parse_timestamp("2025-13-40"), None);
    }

    #[test]
    fn test_period_keys() {
        let dt = Utc.with_ymd_and_hms(2025, 3, 5, 8, 0, 0).unwrap();
        assert_eq!(year_key(&dt), "2025");
        assert_eq!(month_key(&dt), "2025-03");
        assert_eq!(iso_week_key(&dt), "2025-W10");
    }

    #[test]
    fn test_iso_week_uses_iso_year() {
        // 2024-12-30 is a Monday in ISO week 1 of 2025
        let dt = Utc.with_ymd_and_hms(2024, 12, 30, 12, 0, 0).unwrap();
        assert_eq!(iso_week_key(&dt), "2025-W01");
        assert_eq!(year_key(&dt), "2024");

        // 2021-01-01 is a Friday in ISO week 53 of 2020
        let dt = Utc.with_ymd_and_hms(2021, 1, 1, 12, 0, 0).unwrap();
        assert_eq!(iso_week_key(&dt), "2020-W53");
    }
}
