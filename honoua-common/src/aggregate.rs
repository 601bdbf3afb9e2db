//! Period aggregation of cart history
//!
//! Grams stay the pivot unit. Each record lands in at most one year, one
//! month and one ISO-week bucket. Backend period fields win over timestamps;
//! `created_at` then `validated_at` fill whatever is still missing.

use crate::evolution::PeriodType;
use crate::history::CartHistoryRecord;
use crate::time::{iso_week_key, month_key, parse_timestamp, year_key};
use crate::units::sanitize_amount;
use serde::Serialize;
use std::collections::BTreeMap;

/// Totals for one period bucket
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PeriodTotals {
    pub total_co2_g: f64,
    pub total_distance_km: f64,
    pub count: u32,
}

impl PeriodTotals {
    fn add(&mut self, co2_g: f64, distance_km: f64) {
        self.total_co2_g += co2_g;
        self.total_distance_km += distance_km;
        self.count += 1;
    }
}

/// One point of a sorted period series
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodPoint {
    pub period: String,
    pub totals: PeriodTotals,
}

/// History grouped by year, month and ISO week
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PeriodAggregation {
    pub by_year: BTreeMap<String, PeriodTotals>,
    pub by_month: BTreeMap<String, PeriodTotals>,
    pub by_week: BTreeMap<String, PeriodTotals>,
}

impl PeriodAggregation {
    pub fn buckets(&self, period: PeriodType) -> &BTreeMap<String, PeriodTotals> {
        match period {
            PeriodType::Year => &self.by_year,
            PeriodType::Month => &self.by_month,
            PeriodType::Week => &self.by_week,
        }
    }

    /// Points sorted by period key
    pub fn series(&self, period: PeriodType) -> Vec<PeriodPoint> {
        self.buckets(period)
            .iter()
            .map(|(period, totals)| PeriodPoint {
                period: period.clone(),
                totals: *totals,
            })
            .collect()
    }
}

/// `YYYY-MM`
fn is_month_label(label: &str) -> bool {
    let b = label.as_bytes();
    b.len() == 7 && b[4] == b'-' && b[..4].iter().chain(&b[5..]).all(u8::is_ascii_digit)
}

/// `YYYY-Wn` or `YYYY-Wnn`, normalized to two week digits
fn normalize_week_label(label: &str) -> Option<String> {
    let (year, week) = label.split_once("-W")?;
    let valid_year = year.len() == 4 && year.bytes().all(|b| b.is_ascii_digit());
    let valid_week = matches!(week.len(), 1 | 2) && week.bytes().all(|b| b.is_ascii_digit());
    if !valid_year || !valid_week {
        return None;
    }
    Some(format!("{}-W{:0>2}", year, week))
}

/// Year from the first four characters of a period label
fn year_from_label(label: &str) -> Option<String> {
    let prefix = label.get(..4)?;
    prefix
        .parse::<u32>()
        .ok()
        .map(|y| format!("{:04}", y))
}

struct PeriodKeys {
    year: Option<String>,
    month: Option<String>,
    week: Option<String>,
}

fn period_keys(record: &CartHistoryRecord) -> PeriodKeys {
    let mut year = record
        .period_label
        .as_deref()
        .or(record.period_month.as_deref())
        .or(record.period_week.as_deref())
        .and_then(year_from_label);

    let mut month = record.period_month.clone().or_else(|| {
        record
            .period_label
            .as_deref()
            .filter(|l| is_month_label(l))
            .map(str::to_string)
    });

    let mut week = record.period_week.clone().or_else(|| {
        record
            .period_label
            .as_deref()
            .and_then(normalize_week_label)
    });

    if year.is_none() || (month.is_none() && week.is_none()) {
        let timestamp = record
            .created_at
            .as_deref()
            .or(record.validated_at.as_deref())
            .and_then(parse_timestamp);

        if let Some(dt) = timestamp {
            year.get_or_insert_with(|| year_key(&dt));
            month.get_or_insert_with(|| month_key(&dt));
            week.get_or_insert_with(|| iso_week_key(&dt));
        }
    }

    PeriodKeys { year, month, week }
}

/// Group history records by year, month and ISO week
pub fn aggregate_by_period(records: &[CartHistoryRecord]) -> PeriodAggregation {
    let mut agg = PeriodAggregation::default();

    for record in records {
        let co2_g = sanitize_amount(record.total_co2_g);
        let distance_km = sanitize_amount(record.total_distance_km);
        let keys = period_keys(record);

        for (bucket, key) in [
            (&mut agg.by_year, keys.year),
            (&mut agg.by_month, keys.month),
            (&mut agg.by_week, keys.week),
        ] {
            if let Some(key) = key {
                bucket.entry(key).or_default().add(co2_g, distance_km);
            }
        }
    }

    agg
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(co2: f64, km: f64) -> CartHistoryRecord {
        CartHistoryRecord {
            total_co2_g: co2,
            total_distance_km: km,
            ..Default::default()
        }
    }

    #[test]
    fn test_backend_period_fields() {
        let r = CartHistoryRecord {
            period_label: Some("2025-11".to_string()),
            period_month: Some("2025-11".to_string()),
            period_week: Some("2025-W47".to_string()),
            ..record(1000.0, 50.0)
        };
        let agg = aggregate_by_period(&[r.clone(), r]);

        assert_eq!(agg.by_year["2025"].total_co2_g, 2000.0);
        assert_eq!(agg.by_month["2025-11"].count, 2);
        assert_eq!(agg.by_week["2025-W47"].total_distance_km, 100.0);
    }

    #[test]
    fn test_period_label_interpreted_as_month_or_week() {
        let month = CartHistoryRecord {
            period_label: Some("2025-10".to_string()),
            ..record(10.0, 0.0)
        };
        let week = CartHistoryRecord {
            period_label: Some("2025-W7".to_string()),
            ..record(20.0, 0.0)
        };
        let agg = aggregate_by_period(&[month, week]);

        assert_eq!(agg.by_month.keys().collect::<Vec<_>>(), vec!["2025-10"]);
        assert_eq!(agg.by_week.keys().collect::<Vec<_>>(), vec!["2025-W07"]);
        assert_eq!(agg.by_year["2025"].total_co2_g, 30.0);
    }

    #[test]
    fn test_timestamp_fallback() {
        let created = CartHistoryRecord {
            created_at: Some("2024-12-30T12:00:00Z".to_string()),
            ..record(5.0, 1.0)
        };
        let validated = CartHistoryRecord {
            validated_at: Some("2025-01-15T08:00:00".to_string()),
            ..record(7.0, 2.0)
        };
        let agg = aggregate_by_period(&[created, validated]);

        assert_eq!(agg.by_year["2024"].total_co2_g, 5.0);
        assert_eq!(agg.by_year["2025"].total_co2_g, 7.0);
        assert_eq!(agg.by_month["2024-12"].count, 1);
        assert_eq!(agg.by_month["2025-01"].count, 1);
        // 2024-12-30 belongs to ISO week 1 of 2025
        assert_eq!(agg.by_week["2025-W01"].count, 1);
        assert_eq!(agg.by_week["2025-W03"].count, 1);
    }

    #[test]
    fn test_month_label_fills_week_from_timestamp_only_when_nothing_else() {
        // Month known from the label: the timestamp is not consulted
        let r = CartHistoryRecord {
            period_label: Some("2025-11".to_string()),
            created_at: Some("2025-11-20T10:00:00Z".to_string()),
            ..record(1.0, 0.0)
        };
        let agg = aggregate_by_period(&[r]);
        assert_eq!(agg.by_month.len(), 1);
        assert!(agg.by_week.is_empty());
    }

    #[test]
    fn test_invalid_amounts_count_as_zero() {
        let r = CartHistoryRecord {
            period_label: Some("2025-11".to_string()),
            ..record(-50.0, f64::NAN)
        };
        let agg = aggregate_by_period(&[r]);
        let totals = agg.by_month["2025-11"];
        assert_eq!(totals.total_co2_g, 0.0);
        assert_eq!(totals.total_distance_km, 0.0);
        assert_eq!(totals.count, 1);
    }

    #[test]
    fn test_records_without_any_key_are_skipped() {
        let agg = aggregate_by_period(&[record(100.0, 0.0)]);
        assert_eq!(agg, PeriodAggregation::default());
    }

    #[test]
    fn test_series_sorted() {
        let records: Vec<_> = ["2025-03", "2024-12", "2025-01"]
            .iter()
            .map(|m| CartHistoryRecord {
                period_month: Some(m.to_string()),
                ..record(1.0, 0.0)
            })
            .collect();
        let series = aggregate_by_period(&records).series(PeriodType::Month);
        let keys: Vec<&str> = series.iter().map(|p| p.period.as_str()).collect();
        assert_eq!(keys, vec!["2024-12", "2025-01", "2025-03"]);
    }

    #[test]
    fn test_label_helpers() {
        assert!(is_month_label("2025-11"));
        assert!(!is_month_label("2025-W1"));
        assert!(!is_month_label("2025-1"));
        assert_eq!(normalize_week_label("2025-W9").as_deref(), Some("2025-W09"));
        assert_eq!(normalize_week_label("2025-W49").as_deref(), Some("2025-W49"));
        assert_eq!(normalize_week_label("2025-W123"), None);
        assert_eq!(normalize_week_label("2025-11"), None);
        assert_eq!(year_from_label("2025-W09").as_deref(), Some("2025"));
        assert_eq!(year_from_label("20"), None);
        assert_eq!(year_from_label("abcd-11"), None);
    }
}
