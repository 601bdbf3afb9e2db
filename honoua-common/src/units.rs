//! Unit conversions and tree-capture equivalence
//!
//! Grams are the pivot unit for every CO₂ amount stored in carts and
//! history records; kilograms are for display and budgets.

/// CO₂ captured by one tree in a year (kg)
pub const TREE_CO2_KG_PER_YEAR: f64 = 22.0;

const DAYS_PER_YEAR: f64 = 365.0;

const PLACEHOLDER: &str = "—";

pub fn grams_to_kg(grams: f64) -> f64 {
    grams / 1000.0
}

pub fn kg_to_grams(kg: f64) -> f64 {
    kg * 1000.0
}

/// Clamp an amount read from loosely-typed data: non-finite or negative → 0
pub fn sanitize_amount(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

/// Days one tree needs to capture `co2_kg`
pub fn tree_capture_days(co2_kg: f64) -> f64 {
    if !co2_kg.is_finite() || co2_kg <= 0.0 {
        return 0.0;
    }
    co2_kg * DAYS_PER_YEAR / TREE_CO2_KG_PER_YEAR
}

/// Human-readable tree-capture duration
///
/// ```
/// use honoua_common::units::format_tree_days;
///
/// assert_eq!(format_tree_days(0.0), "—");
/// assert_eq!(format_tree_days(0.4), "< 1 day");
/// assert_eq!(format_tree_days(1.7), "1 day");
/// assert_eq!(format_tree_days(225.6), "226 days");
/// ```
pub fn format_tree_days(days: f64) -> String {
    if !days.is_finite() || days <= 0.0 {
        PLACEHOLDER.to_string()
    } else if days < 1.0 {
        "< 1 day".to_string()
    } else if days < 2.0 {
        "1 day".to_string()
    } else {
        format!("{} days", days.round() as i64)
    }
}

/// Fixed-decimal kilogram display, `—` when the value is not finite
pub fn format_kg(value: f64, decimals: usize) -> String {
    if !value.is_finite() {
        return PLACEHOLDER.to_string();
    }
    format!("{:.*} kg", decimals, value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gram_kilogram_conversions() {
        assert_eq!(grams_to_kg(1500.0), 1.5);
        assert_eq!(kg_to_grams(0.25), 250.0);
    }

    #[test]
    fn test_sanitize_amount() {
        assert_eq!(sanitize_amount(12.5), 12.5);
        assert_eq!(sanitize_amount(-3.0), 0.0);
        assert_eq!(sanitize_amount(f64::NAN), 0.0);
        assert_eq!(sanitize_amount(f64::INFINITY), 0.0);
    }

    #[test]
    fn test_tree_capture_days() {
        // 22 kg is exactly one tree-year
        assert!((tree_capture_days(22.0) - 365.0).abs() < 1e-9);
        assert!((tree_capture_days(13.6) - 225.636).abs() < 0.01);
        assert_eq!(tree_capture_days(0.0), 0.0);
        assert_eq!(tree_capture_days(-5.0), 0.0);
        assert_eq!(tree_capture_days(f64::NAN), 0.0);
    }

    #[test]
    fn test_format_kg() {
        assert_eq!(format_kg(1.23456, 2), "1.23 kg");
        assert_eq!(format_kg(12.0, 0), "12 kg");
        assert_eq!(format_kg(f64::NAN, 1), "—");
    }
}
