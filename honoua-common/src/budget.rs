//! Annual household CO₂ budget
//!
//! The reference budget is 2 t CO₂ per person per year. Consumption is the
//! sum of validated carts dated in the current calendar year.

use crate::history::CartHistoryRecord;
use crate::time::parse_timestamp;
use crate::units::grams_to_kg;
use chrono::Datelike;
use serde::{Deserialize, Serialize};

/// Yearly budget per person (kg CO₂)
pub const BUDGET_PER_PERSON_KG: f64 = 2000.0;

pub const MIN_HOUSEHOLD_SIZE: u32 = 1;
pub const MAX_HOUSEHOLD_SIZE: u32 = 12;

/// Share of the budget above which the status turns to warning (%)
const WARNING_THRESHOLD_PCT: f64 = 80.0;

/// Upper bound for the displayed percentage
const MAX_PERCENT_USED: f64 = 300.0;

/// Round and clamp a household size to `1..=12`; non-finite → 1
pub fn clamp_household_size(raw: f64) -> u32 {
    if !raw.is_finite() {
        return MIN_HOUSEHOLD_SIZE;
    }
    raw.round()
        .clamp(MIN_HOUSEHOLD_SIZE as f64, MAX_HOUSEHOLD_SIZE as f64) as u32
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BudgetStatus {
    Ok,
    Warning,
    Over,
}

impl BudgetStatus {
    fn from_percent(percent_used: f64) -> Self {
        if percent_used > 100.0 {
            BudgetStatus::Over
        } else if percent_used > WARNING_THRESHOLD_PCT {
            BudgetStatus::Warning
        } else {
            BudgetStatus::Ok
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            BudgetStatus::Ok => "Budget under control",
            BudgetStatus::Warning => "Budget to watch",
            BudgetStatus::Over => "Budget exceeded",
        }
    }

    /// Traffic-light level
    pub fn level(&self) -> &'static str {
        match self {
            BudgetStatus::Ok => "green",
            BudgetStatus::Warning => "orange",
            BudgetStatus::Over => "red",
        }
    }
}

/// Budget usage for one year
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BudgetState {
    pub current_year: i32,
    pub household_size: u32,
    pub budget_annual_kg: f64,
    pub co2_annual_kg: f64,
    pub percent_used: f64,
    pub percent_remaining: f64,
    pub budget_remaining_kg: f64,
    pub status: BudgetStatus,
    pub status_label: &'static str,
    pub status_level: &'static str,
}

fn record_year(record: &CartHistoryRecord) -> Option<i32> {
    record
        .created_at
        .as_deref()
        .and_then(parse_timestamp)
        .map(|dt| dt.year())
        .or_else(|| {
            record
                .period_label
                .as_deref()
                .and_then(|label| label.get(..4))
                .and_then(|year| year.parse().ok())
        })
}

/// Budget state for `current_year` from a list of history records
pub fn compute_budget(
    records: &[CartHistoryRecord],
    current_year: i32,
    household_size: u32,
    per_person_kg: f64,
) -> BudgetState {
    let household_size = household_size.clamp(MIN_HOUSEHOLD_SIZE, MAX_HOUSEHOLD_SIZE);

    let total_g: f64 = records
        .iter()
        .filter(|r| record_year(r) == Some(current_year))
        .map(|r| if r.total_co2_g.is_finite() { r.total_co2_g } else { 0.0 })
        .sum();

    let co2_annual_kg = grams_to_kg(total_g);
    let budget_annual_kg = per_person_kg * household_size as f64;

    let mut percent_used = co2_annual_kg / budget_annual_kg * 100.0;
    if !percent_used.is_finite() || percent_used < 0.0 {
        percent_used = 0.0;
    }
    let percent_used = percent_used.min(MAX_PERCENT_USED);

    let status = BudgetStatus::from_percent(percent_used);

    BudgetState {
        current_year,
        household_size,
        budget_annual_kg,
        co2_annual_kg,
        percent_used,
        percent_remaining: (100.0 - percent_used).max(0.0),
        budget_remaining_kg: (budget_annual_kg - co2_annual_kg).max(0.0),
        status,
        status_label: status.label(),
        status_level: status.level(),
    }
}
