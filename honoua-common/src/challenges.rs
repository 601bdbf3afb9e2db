//! Personal CO₂ challenges derived from monthly history

use crate::aggregate::{PeriodAggregation, PeriodPoint};
use crate::evolution::PeriodType;
use crate::units::grams_to_kg;
use serde::{Deserialize, Serialize};

/// Reduction goal for month-over-month challenges
const REDUCTION_TARGET: f64 = 0.10;

const NOT_ENOUGH_HISTORY: &str = "Not enough history: at least 2 months of data are needed.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeStatus {
    InProgress,
    Succeeded,
    NotReached,
}

impl ChallengeStatus {
    pub fn label(&self) -> &'static str {
        match self {
            ChallengeStatus::InProgress => "In progress",
            ChallengeStatus::Succeeded => "Succeeded",
            ChallengeStatus::NotReached => "Not reached",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Challenge {
    pub id: &'static str,
    pub icon: &'static str,
    pub name: String,
    pub status: ChallengeStatus,
    /// 0..=100
    pub progress_pct: u32,
    pub message: String,
}

/// Shown until the first validated month exists
fn placeholder_challenges() -> Vec<Challenge> {
    vec![
        Challenge {
            id: "reduce_10_percent_30_days",
            icon: "🏆",
            name: "Cut your CO₂ by 10 % over 30 days".to_string(),
            status: ChallengeStatus::InProgress,
            progress_pct: 63,
            message: "You cut your CO₂ by 7 %, goal: 10 %. Keep going!".to_string(),
        },
        Challenge {
            id: "local_week",
            icon: "🌍",
            name: "A 100 % local week".to_string(),
            status: ChallengeStatus::InProgress,
            progress_pct: 40,
            message: "40 % of your products are already local this week.".to_string(),
        },
        Challenge {
            id: "short_distance_month",
            icon: "🚲",
            name: "Keep the average product distance down".to_string(),
            status: ChallengeStatus::Succeeded,
            progress_pct: 100,
            message: "Well done! Your average distance stayed under your goal this month."
                .to_string(),
        },
    ]
}

/// Outcome of comparing one metric between the last two months
struct Reduction {
    status: ChallengeStatus,
    progress_pct: u32,
    achieved: f64,
    rising: bool,
}

/// `None` when the previous value gives no usable base
fn reduction(last: f64, prev: f64) -> Option<Reduction> {
    if !(prev > 0.0) || !last.is_finite() {
        return None;
    }

    let achieved = ((prev - last) / prev).max(0.0);
    let rising = last > prev;
    let progress_pct = if rising {
        0
    } else {
        (achieved / REDUCTION_TARGET * 100.0).round().min(100.0) as u32
    };
    let status = if achieved >= REDUCTION_TARGET {
        ChallengeStatus::Succeeded
    } else {
        ChallengeStatus::InProgress
    };

    Some(Reduction {
        status,
        progress_pct,
        achieved,
        rising,
    })
}

fn pct(ratio: f64) -> i64 {
    (ratio * 100.0).round() as i64
}

fn co2_challenge(last: Option<&PeriodPoint>, prev: Option<&PeriodPoint>) -> Challenge {
    let mut challenge = Challenge {
        id: "reduce_10_percent_30_days",
        icon: "🏆",
        name: "Cut your CO₂ by 10 % (last month vs previous)".to_string(),
        status: ChallengeStatus::InProgress,
        progress_pct: 0,
        message: NOT_ENOUGH_HISTORY.to_string(),
    };

    let (Some(last), Some(prev)) = (last, prev) else {
        return challenge;
    };
    let last_g = last.totals.total_co2_g;
    let prev_g = prev.totals.total_co2_g;

    challenge.message = match reduction(last_g, prev_g) {
        Some(r) => {
            challenge.status = r.status;
            challenge.progress_pct = r.progress_pct;
            if r.status == ChallengeStatus::Succeeded {
                format!(
                    "Well done! -{}% vs {} (goal: -10%).",
                    pct(r.achieved),
                    prev.period
                )
            } else if r.rising {
                format!(
                    "CO₂ rising: {} kg vs {} kg ({}). Goal: -10%.",
                    grams_to_kg(last_g).round() as i64,
                    grams_to_kg(prev_g).round() as i64,
                    prev.period
                )
            } else {
                format!(
                    "Current reduction: -{}% (goal: -10%). Keep going.",
                    pct(r.achieved)
                )
            }
        }
        None => format!(
            "CO₂ last month: {} kg (previous base is zero).",
            grams_to_kg(last_g).round() as i64
        ),
    };

    challenge
}

fn local_week_challenge() -> Challenge {
    Challenge {
        id: "local_week",
        icon: "🌍",
        name: "A 100 % local week (coming soon)".to_string(),
        status: ChallengeStatus::NotReached,
        progress_pct: 0,
        message: "Coming soon: product origin is not recorded in the history yet.".to_string(),
    }
}

fn distance_challenge(last: Option<&PeriodPoint>, prev: Option<&PeriodPoint>) -> Challenge {
    let mut challenge = Challenge {
        id: "short_distance_month",
        icon: "🚲",
        name: "Cut the total distance (last month vs previous)".to_string(),
        status: ChallengeStatus::InProgress,
        progress_pct: 0,
        message: NOT_ENOUGH_HISTORY.to_string(),
    };

    let (Some(last), Some(prev)) = (last, prev) else {
        return challenge;
    };
    let last_km = last.totals.total_distance_km;
    let prev_km = prev.totals.total_distance_km;

    challenge.message = match reduction(last_km, prev_km) {
        Some(r) => {
            challenge.status = r.status;
            challenge.progress_pct = r.progress_pct;
            if r.status == ChallengeStatus::Succeeded {
                format!(
                    "Well done! Distance down {}% vs {}.",
                    pct(r.achieved),
                    prev.period
                )
            } else if r.rising {
                format!(
                    "Distance rising: {} km vs {} km ({}).",
                    last_km.round() as i64,
                    prev_km.round() as i64,
                    prev.period
                )
            } else {
                format!("Current decrease: {}% (goal: 10%).", pct(r.achieved))
            }
        }
        None => format!(
            "Distance last month: {} km (previous base is zero).",
            last_km.round() as i64
        ),
    };

    challenge
}

/// Challenges for the latest two months of an aggregation
pub fn build_challenges(agg: &PeriodAggregation) -> Vec<Challenge> {
    let months = agg.series(PeriodType::Month);
    if months.is_empty() {
        return placeholder_challenges();
    }

    let (last, prev) = match months.as_slice() {
        [.., prev, last] => (Some(last), Some(prev)),
        _ => (None, None),
    };

    vec![
        co2_challenge(last, prev),
        local_week_challenge(),
        distance_challenge(last, prev),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::aggregate_by_period;
    use crate::history::CartHistoryRecord;

    fn month(key: &str, co2_g: f64, km: f64) -> CartHistoryRecord {
        CartHistoryRecord {
            period_month: Some(key.to_string()),
            total_co2_g: co2_g,
            total_distance_km: km,
            ..Default::default()
        }
    }

    fn build(records: &[CartHistoryRecord]) -> Vec<Challenge> {
        build_challenges(&aggregate_by_period(records))
    }

    #[test]
    fn test_placeholders_without_monthly_data() {
        let challenges = build(&[]);
        assert_eq!(challenges, placeholder_challenges());
        assert_eq!(challenges.len(), 3);
    }

    #[test]
    fn test_single_month_not_enough_history() {
        let challenges = build(&[month("2025-11", 5000.0, 100.0)]);
        assert_eq!(challenges.len(), 3);

        assert_eq!(challenges[0].status, ChallengeStatus::InProgress);
        assert_eq!(challenges[0].progress_pct, 0);
        assert_eq!(challenges[0].message, NOT_ENOUGH_HISTORY);

        assert_eq!(challenges[1].status, ChallengeStatus::NotReached);
        assert_eq!(challenges[2].message, NOT_ENOUGH_HISTORY);
    }

    #[test]
    fn test_co2_reduction_succeeded() {
        let challenges = build(&[
            month("2025-10", 10_000.0, 100.0),
            month("2025-11", 8_500.0, 100.0),
        ]);
        let co2 = &challenges[0];
        assert_eq!(co2.status, ChallengeStatus::Succeeded);
        assert_eq!(co2.progress_pct, 100);
        assert_eq!(co2.message, "Well done! -15% vs 2025-10 (goal: -10%).");
    }

    #[test]
    fn test_co2_partial_reduction() {
        let challenges = build(&[
            month("2025-10", 10_000.0, 0.0),
            month("2025-11", 9_500.0, 0.0),
        ]);
        let co2 = &challenges[0];
        assert_eq!(co2.status, ChallengeStatus::InProgress);
        assert_eq!(co2.progress_pct, 50);
        assert!(co2.message.starts_with("Current reduction: -5%"));
    }

    #[test]
    fn test_co2_rising_resets_progress() {
        let challenges = build(&[
            month("2025-10", 10_000.0, 0.0),
            month("2025-11", 12_000.0, 0.0),
        ]);
        let co2 = &challenges[0];
        assert_eq!(co2.status, ChallengeStatus::InProgress);
        assert_eq!(co2.progress_pct, 0);
        assert_eq!(co2.message, "CO₂ rising: 12 kg vs 10 kg (2025-10). Goal: -10%.");
    }

    #[test]
    fn test_distance_challenge() {
        let challenges = build(&[
            month("2025-09", 0.0, 999.0),
            month("2025-10", 1000.0, 200.0),
            month("2025-11", 1000.0, 170.0),
        ]);
        let distance = &challenges[2];
        assert_eq!(distance.status, ChallengeStatus::Succeeded);
        assert_eq!(distance.progress_pct, 100);
        assert_eq!(distance.message, "Well done! Distance down 15% vs 2025-10.");
    }

    #[test]
    fn test_distance_zero_base() {
        let challenges = build(&[month("2025-10", 1000.0, 0.0), month("2025-11", 1000.0, 42.4)]);
        let distance = &challenges[2];
        assert_eq!(distance.status, ChallengeStatus::InProgress);
        assert_eq!(distance.progress_pct, 0);
        assert_eq!(distance.message, "Distance last month: 42 km (previous base is zero).");
    }

    #[test]
    fn test_co2_zero_base() {
        let challenges = build(&[month("2025-10", 0.0, 0.0), month("2025-11", 1600.0, 0.0)]);
        let co2 = &challenges[0];
        assert_eq!(co2.status, ChallengeStatus::InProgress);
        assert_eq!(co2.progress_pct, 0);
        assert_eq!(co2.message, "CO₂ last month: 2 kg (previous base is zero).");
    }

    #[test]
    fn test_status_serde() {
        assert_eq!(
            serde_json::to_string(&ChallengeStatus::NotReached).unwrap(),
            "\"not_reached\""
        );
        assert_eq!(ChallengeStatus::Succeeded.label(), "Succeeded");
    }
}
