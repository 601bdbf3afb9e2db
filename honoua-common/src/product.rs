//! Product record normalization
//!
//! The CO₂ product endpoint has served several payload shapes over time
//! (grams vs kilograms, French vs English field names). [`ProductRecord`]
//! is the single normalized view used by the cart; only JSON numbers are
//! trusted for amounts, anything else is treated as absent.

use crate::gtin::Gtin;
use crate::units::kg_to_grams;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Weight assumed when the API does not report one (g)
pub const DEFAULT_WEIGHT_G: f64 = 500.0;

/// Name shown when the API does not report one
pub const UNNAMED_PRODUCT: &str = "Unnamed product";

const NAME_FIELDS: &[&str] = &["product_name", "product_label", "label", "name", "nom"];

const CATEGORY_FIELDS: &[&str] = &[
    "category",
    "product_category",
    "main_category",
    "categorie",
    "category_name",
    "categories",
    "categories_fr",
    "off_categories",
];

/// Normalized product data for one EAN
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub ean: String,
    pub name: String,
    pub category: Option<String>,
    /// CO₂ per unit (g CO₂e)
    pub co2_unit_g: Option<f64>,
    pub distance_km: Option<f64>,
    /// Packaging CO₂ (g CO₂e)
    pub co2_packaging_g: Option<f64>,
    pub origin: Option<String>,
    pub weight_g: f64,
}

impl ProductRecord {
    /// Build a record from a raw API payload
    pub fn from_api_value(data: &Value, ean: &Gtin) -> Self {
        let name = NAME_FIELDS
            .iter()
            .find_map(|f| non_empty_str(data, f))
            .unwrap_or(UNNAMED_PRODUCT)
            .to_string();

        let co2_unit_g = number(data, "co2_total_g")
            .or_else(|| number(data, "co2_total"))
            .or_else(|| number(data, "carbon_total_kg").map(kg_to_grams))
            .or_else(|| number(data, "carbon_total").map(kg_to_grams));

        let distance_km = number(data, "distance_km").or_else(|| number(data, "distance"));

        let co2_packaging_g = number(data, "co2_packaging_g")
            .or_else(|| number(data, "co2_packaging"))
            .or_else(|| number(data, "carbon_pack_kg").map(kg_to_grams));

        let origin = non_empty_str(data, "origin")
            .or_else(|| non_empty_str(data, "origine"))
            .map(str::to_string);

        let weight_g = number(data, "weight_g")
            .or_else(|| number(data, "weight"))
            .or_else(|| number(data, "poids_g"))
            .unwrap_or(DEFAULT_WEIGHT_G);

        Self {
            ean: ean.to_string(),
            name,
            category: category_text(data),
            co2_unit_g,
            distance_km,
            co2_packaging_g,
            origin,
            weight_g,
        }
    }

    /// True when the unit CO₂ is usable (finite and positive)
    pub fn has_co2_data(&self) -> bool {
        matches!(self.co2_unit_g, Some(g) if g.is_finite() && g > 0.0)
    }
}

fn number(data: &Value, field: &str) -> Option<f64> {
    data.get(field).and_then(Value::as_f64)
}

fn non_empty_str<'a>(data: &'a Value, field: &str) -> Option<&'a str> {
    data.get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

/// First non-null category field, arrays joined with ", "
fn category_text(data: &Value) -> Option<String> {
    let raw = CATEGORY_FIELDS
        .iter()
        .filter_map(|f| data.get(f))
        .find(|v| !v.is_null())?;

    match raw {
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => Some(
            items
                .iter()
                .map(scalar_to_string)
                .collect::<Vec<_>>()
                .join(", "),
        ),
        other => Some(scalar_to_string(other)),
    }
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
