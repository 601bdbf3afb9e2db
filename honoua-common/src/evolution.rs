//! Period-over-period CO₂ evolution

use crate::aggregate::PeriodAggregation;
use crate::error::Error;
use crate::history::CartHistoryRecord;
use crate::units::{grams_to_kg, sanitize_amount};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Granularity of a period series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodType {
    Year,
    Month,
    Week,
}

impl PeriodType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PeriodType::Year => "year",
            PeriodType::Month => "month",
            PeriodType::Week => "week",
        }
    }
}

impl fmt::Display for PeriodType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PeriodType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "year" => Ok(PeriodType::Year),
            "month" => Ok(PeriodType::Month),
            "week" => Ok(PeriodType::Week),
            other => Err(Error::InvalidInput(format!(
                "unknown period type '{}' (expected year, month or week)",
                other
            ))),
        }
    }
}

const MONTH_NAMES: [&str; 12] = [
    "Jan.", "Feb.", "Mar.", "Apr.", "May", "Jun.", "Jul.", "Aug.", "Sep.", "Oct.", "Nov.", "Dec.",
];

/// Human label for a period key
///
/// `"2025-11"` becomes `"Nov. 2025"` and `"2025-W49"` becomes
/// `"Wk 49 (2025)"`. Keys that do not parse are returned unchanged.
pub fn format_period_label(period: PeriodType, key: &str) -> String {
    match period {
        PeriodType::Month => {
            let month_name = key
                .split_once('-')
                .and_then(|(year, month)| {
                    let index = month.parse::<usize>().ok()?.checked_sub(1)?;
                    MONTH_NAMES.get(index).map(|name| (year, *name))
                });
            match month_name {
                Some((year, name)) => format!("{} {}", name, year),
                None => key.to_string(),
            }
        }
        PeriodType::Week => match key.split_once("-W") {
            Some((year, week)) if !week.is_empty() => format!("Wk {} ({})", week, year),
            _ => key.to_string(),
        },
        PeriodType::Year => key.to_string(),
    }
}

/// Relative change in percent; `None` when there is no usable base
pub fn pct_change(current: f64, previous: f64) -> Option<f64> {
    if previous == 0.0 || !previous.is_finite() || !current.is_finite() {
        return None;
    }
    Some((current - previous) / previous * 100.0)
}

/// One point of an evolution chart
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvolutionPoint {
    pub key: String,
    pub label: String,
    pub co2_kg: f64,
    pub distance_km: f64,
}

impl EvolutionPoint {
    fn new(period: PeriodType, key: String, co2_g: f64, distance_km: f64) -> Self {
        Self {
            label: format_period_label(period, &key),
            key,
            co2_kg: grams_to_kg(sanitize_amount(co2_g)),
            distance_km: sanitize_amount(distance_km),
        }
    }
}

/// Series from backend records already tagged with a period type
pub fn build_series(records: &[CartHistoryRecord], period: PeriodType) -> Vec<EvolutionPoint> {
    let mut points: Vec<EvolutionPoint> = records
        .iter()
        .filter(|r| r.period_type.as_deref() == Some(period.as_str()))
        .filter_map(|r| {
            let key = r.period_label.clone()?;
            Some(EvolutionPoint::new(
                period,
                key,
                r.total_co2_g,
                r.total_distance_km,
            ))
        })
        .collect();

    points.sort_by(|a, b| a.key.cmp(&b.key));
    points
}

/// Series from a local aggregation
pub fn series_from_aggregation(agg: &PeriodAggregation, period: PeriodType) -> Vec<EvolutionPoint> {
    agg.series(period)
        .into_iter()
        .map(|p| {
            EvolutionPoint::new(
                period,
                p.period,
                p.totals.total_co2_g,
                p.totals.total_distance_km,
            )
        })
        .collect()
}

/// Latest period compared with the one before it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvolutionSummary {
    pub period_type: PeriodType,
    pub current: EvolutionPoint,
    pub previous: Option<EvolutionPoint>,
    pub co2_change_pct: Option<f64>,
    pub distance_change_pct: Option<f64>,
}

/// Summarize a sorted series; `None` when it is empty
pub fn summarize(points: &[EvolutionPoint], period: PeriodType) -> Option<EvolutionSummary> {
    let (current, rest) = points.split_last()?;
    let previous = rest.last();

    Some(EvolutionSummary {
        period_type: period,
        current: current.clone(),
        previous: previous.cloned(),
        co2_change_pct: previous.and_then(|p| pct_change(current.co2_kg, p.co2_kg)),
        distance_change_pct: previous.and_then(|p| pct_change(current.distance_km, p.distance_km)),
    })
}
