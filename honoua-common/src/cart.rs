//! CO₂ cart
//!
//! The one canonical cart: items keyed by EAN, quantities, totals in grams,
//! recommendations and per-category breakdown. No I/O here; persistence
//! lives in [`crate::db::storage`].

use crate::category::GraphCategory;
use crate::product::ProductRecord;
use crate::units::{grams_to_kg, tree_capture_days};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Number of products in each recommendation list
const RECOMMENDATION_COUNT: usize = 3;

/// One product line in the cart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    pub ean: String,
    pub product_name: String,
    #[serde(default)]
    pub category: Option<String>,
    pub quantity: u32,
    #[serde(default)]
    pub co2_unit_g: Option<f64>,
    #[serde(default)]
    pub co2_total_g: f64,
    #[serde(default)]
    pub distance_km: Option<f64>,
    #[serde(default)]
    pub co2_packaging_g: Option<f64>,
    #[serde(default)]
    pub origin: Option<String>,
    #[serde(default)]
    pub weight_g: Option<f64>,
    #[serde(default)]
    pub has_co2_data: bool,
    pub last_scan_at: DateTime<Utc>,
}

impl CartItem {
    fn usable_unit_g(&self) -> Option<f64> {
        match self.co2_unit_g {
            Some(g) if self.has_co2_data && g.is_finite() => Some(g),
            _ => None,
        }
    }

    fn recompute_total(&mut self) {
        self.co2_total_g = match self.usable_unit_g() {
            Some(unit) => unit * f64::from(self.quantity),
            None => 0.0,
        };
    }
}

/// Result of [`Cart::add_product`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// New product line with quantity 1
    Added,
    /// Existing line, quantity now at the given value
    Incremented(u32),
    /// Existing line, repeat add refused; only metadata refreshed
    Declined,
}

/// Aggregate counters for the cart
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CartTotals {
    pub total_co2_g: f64,
    pub total_items: u32,
    pub distinct_products: usize,
}

/// Lowest and highest emitting products (by unit CO₂)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Recommendations {
    /// Ascending unit CO₂
    pub lowest: Vec<CartItem>,
    /// Descending unit CO₂
    pub highest: Vec<CartItem>,
}

/// CO₂ grams per graph category
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CategoryBreakdown {
    pub totals_g: BTreeMap<GraphCategory, f64>,
    pub total_g: f64,
}

impl CategoryBreakdown {
    /// Category with the largest share and that share in percent
    pub fn dominant(&self) -> Option<(GraphCategory, f64)> {
        if self.total_g <= 0.0 {
            return None;
        }
        GraphCategory::ALL
            .iter()
            .filter_map(|c| self.totals_g.get(c).map(|g| (*c, *g)))
            .filter(|(_, g)| *g > 0.0)
            .fold(None, |best: Option<(GraphCategory, f64)>, (c, g)| match best {
                Some((_, best_g)) if best_g >= g => best,
                _ => Some((c, g)),
            })
            .map(|(c, g)| (c, g / self.total_g * 100.0))
    }

    /// Share of `category` in percent
    pub fn share_pct(&self, category: GraphCategory) -> f64 {
        if self.total_g <= 0.0 {
            return 0.0;
        }
        self.totals_g.get(&category).copied().unwrap_or(0.0) / self.total_g * 100.0
    }
}

/// Validated-cart payload sent to history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartSummary {
    pub total_co2_g: i64,
    pub nb_articles: i64,
    pub nb_distinct_products: i64,
    pub total_distance_km: i64,
    pub days_captured_by_tree: f64,
    pub tree_equivalent: f64,
}

/// The CO₂ cart
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cart {
    items: Vec<CartItem>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_items(items: Vec<CartItem>) -> Self {
        Self { items }
    }

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, ean: &str) -> Option<&CartItem> {
        self.items.iter().find(|item| item.ean == ean)
    }

    /// Add a scanned product
    ///
    /// A product already in the cart first gets its distance, packaging,
    /// origin and weight refreshed; `confirm_repeat` is then asked (with the
    /// current quantity) whether to add one more.
    pub fn add_product<F>(&mut self, product: &ProductRecord, now: DateTime<Utc>, confirm_repeat: F) -> AddOutcome
    where
        F: FnOnce(u32) -> bool,
    {
        let has_co2_data = product.has_co2_data();

        let index = match self.items.iter().position(|item| item.ean == product.ean) {
            Some(index) => index,
            None => {
                let mut item = CartItem {
                    ean: product.ean.clone(),
                    product_name: product.name.clone(),
                    category: product.category.clone(),
                    quantity: 1,
                    co2_unit_g: if has_co2_data { product.co2_unit_g } else { None },
                    co2_total_g: 0.0,
                    distance_km: product.distance_km,
                    co2_packaging_g: product.co2_packaging_g,
                    origin: product.origin.clone(),
                    weight_g: Some(product.weight_g),
                    has_co2_data,
                    last_scan_at: now,
                };
                item.recompute_total();
                self.items.push(item);
                return AddOutcome::Added;
            }
        };
        let item = &mut self.items[index];

        if product.distance_km.is_some() {
            item.distance_km = product.distance_km;
        }
        if product.co2_packaging_g.is_some() {
            item.co2_packaging_g = product.co2_packaging_g;
        }
        if product.origin.is_some() {
            item.origin = product.origin.clone();
        }
        item.weight_g = Some(product.weight_g);
        item.last_scan_at = now;

        if !confirm_repeat(item.quantity) {
            return AddOutcome::Declined;
        }

        item.quantity = item.quantity.saturating_add(1);
        if has_co2_data {
            item.co2_unit_g = product.co2_unit_g;
        }
        item.has_co2_data = item.has_co2_data || has_co2_data;
        item.recompute_total();

        AddOutcome::Incremented(item.quantity)
    }

    /// Remove every unit of `ean`; false when it was not in the cart
    pub fn remove(&mut self, ean: &str) -> bool {
        let before = self.items.len();
        self.items.retain(|item| item.ean != ean);
        self.items.len() != before
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn totals(&self) -> CartTotals {
        let total_co2_g = self
            .items
            .iter()
            .filter(|item| item.has_co2_data && item.co2_total_g.is_finite())
            .map(|item| item.co2_total_g)
            .sum();

        CartTotals {
            total_co2_g,
            total_items: self.items.iter().map(|item| item.quantity).sum(),
            distinct_products: self.items.len(),
        }
    }

    /// Transport distance weighted by quantity (km)
    pub fn total_distance_km(&self) -> f64 {
        self.items
            .iter()
            .filter_map(|item| {
                item.distance_km
                    .filter(|d| d.is_finite())
                    .map(|d| d * f64::from(item.quantity))
            })
            .sum()
    }

    /// Most recently scanned item (first one wins on ties)
    pub fn last_scanned(&self) -> Option<&CartItem> {
        self.items.iter().fold(None, |latest: Option<&CartItem>, item| match latest {
            Some(l) if l.last_scan_at >= item.last_scan_at => Some(l),
            _ => Some(item),
        })
    }

    /// Top three lowest and highest unit-CO₂ products
    pub fn recommendations(&self) -> Recommendations {
        let mut with_co2: Vec<(f64, &CartItem)> = self
            .items
            .iter()
            .filter_map(|item| item.usable_unit_g().map(|g| (g, item)))
            .collect();

        if with_co2.is_empty() {
            return Recommendations::default();
        }

        with_co2.sort_by(|a, b| a.0.total_cmp(&b.0));

        let lowest = with_co2
            .iter()
            .take(RECOMMENDATION_COUNT)
            .map(|(_, item)| (*item).clone())
            .collect();
        let highest = with_co2
            .iter()
            .rev()
            .take(RECOMMENDATION_COUNT)
            .map(|(_, item)| (*item).clone())
            .collect();

        Recommendations { lowest, highest }
    }

    pub fn category_breakdown(&self) -> CategoryBreakdown {
        let mut breakdown = CategoryBreakdown::default();
        for item in self.items.iter().filter(|item| item.has_co2_data) {
            let grams = item.co2_total_g;
            if !grams.is_finite() || grams <= 0.0 {
                continue;
            }
            let category = GraphCategory::classify(item.category.as_deref());
            *breakdown.totals_g.entry(category).or_insert(0.0) += grams;
            breakdown.total_g += grams;
        }
        breakdown
    }

    /// Summary for history; `None` for an empty cart or one without CO₂
    pub fn summary(&self) -> Option<CartSummary> {
        let totals = self.totals();
        if totals.total_items == 0 || totals.total_co2_g <= 0.0 {
            return None;
        }

        let days = tree_capture_days(grams_to_kg(totals.total_co2_g));
        let total_distance_km = self.total_distance_km();

        Some(CartSummary {
            total_co2_g: totals.total_co2_g.round() as i64,
            nb_articles: i64::from(totals.total_items),
            nb_distinct_products: totals.distinct_products as i64,
            total_distance_km: if total_distance_km.is_finite() {
                total_distance_km.round() as i64
            } else {
                0
            },
            days_captured_by_tree: days,
            tree_equivalent: if days > 0.0 { days / 30.0 } else { 0.0 },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 11, 20, 10, 0, 0).unwrap() + Duration::seconds(secs)
    }

    fn product(ean: &str, co2_g: Option<f64>, category: &str) -> ProductRecord {
        ProductRecord {
            ean: ean.to_string(),
            name: format!("Product {}", ean),
            category: Some(category.to_string()),
            co2_unit_g: co2_g,
            distance_km: Some(100.0),
            co2_packaging_g: None,
            origin: None,
            weight_g: 500.0,
        }
    }

    #[test]
    fn test_add_new_product() {
        let mut cart = Cart::new();
        let outcome = cart.add_product(&product("1", Some(250.0), "viande"), t(0), |_| panic!("no prompt"));
        assert_eq!(outcome, AddOutcome::Added);

        let item = cart.get("1").unwrap();
        assert_eq!(item.quantity, 1);
        assert_eq!(item.co2_total_g, 250.0);
        assert!(item.has_co2_data);
    }

    #[test]
    fn test_repeat_add_confirmed() {
        let mut cart = Cart::new();
        cart.add_product(&product("1", Some(250.0), "viande"), t(0), |_| true);

        let mut asked_with = None;
        let outcome = cart.add_product(&product("1", Some(300.0), "viande"), t(5), |qty| {
            asked_with = Some(qty);
            true
        });

        assert_eq!(asked_with, Some(1));
        assert_eq!(outcome, AddOutcome::Incremented(2));
        let item = cart.get("1").unwrap();
        assert_eq!(item.co2_unit_g, Some(300.0));
        assert_eq!(item.co2_total_g, 600.0);
        assert_eq!(item.last_scan_at, t(5));
    }

    #[test]
    fn test_repeat_add_declined_refreshes_metadata_only() {
        let mut cart = Cart::new();
        cart.add_product(&product("1", Some(250.0), "viande"), t(0), |_| true);

        let mut again = product("1", Some(300.0), "viande");
        again.distance_km = Some(42.0);
        again.origin = Some("France".to_string());
        let outcome = cart.add_product(&again, t(9), |_| false);

        assert_eq!(outcome, AddOutcome::Declined);
        let item = cart.get("1").unwrap();
        assert_eq!(item.quantity, 1);
        assert_eq!(item.co2_total_g, 250.0);
        assert_eq!(item.co2_unit_g, Some(250.0));
        assert_eq!(item.distance_km, Some(42.0));
        assert_eq!(item.origin.as_deref(), Some("France"));
        assert_eq!(item.last_scan_at, t(9));
    }

    #[test]
    fn test_product_without_co2_counts_items_not_grams() {
        let mut cart = Cart::new();
        cart.add_product(&product("1", None, "eau"), t(0), |_| true);
        cart.add_product(&product("1", None, "eau"), t(1), |_| true);
        cart.add_product(&product("2", Some(100.0), "fruit"), t(2), |_| true);

        let totals = cart.totals();
        assert_eq!(totals.total_items, 3);
        assert_eq!(totals.distinct_products, 2);
        assert_eq!(totals.total_co2_g, 100.0);
        assert_eq!(cart.get("1").unwrap().co2_total_g, 0.0);
    }

    #[test]
    fn test_remove_and_clear() {
        let mut cart = Cart::new();
        cart.add_product(&product("1", Some(10.0), "x"), t(0), |_| true);
        cart.add_product(&product("2", Some(20.0), "x"), t(1), |_| true);

        assert!(cart.remove("1"));
        assert!(!cart.remove("1"));
        assert_eq!(cart.items().len(), 1);

        cart.clear();
        assert!(cart.is_empty());
        assert_eq!(cart.totals().total_items, 0);
    }

    #[test]
    fn test_last_scanned() {
        let mut cart = Cart::new();
        assert!(cart.last_scanned().is_none());

        cart.add_product(&product("1", Some(10.0), "x"), t(0), |_| true);
        cart.add_product(&product("2", Some(20.0), "x"), t(10), |_| true);
        cart.add_product(&product("1", Some(10.0), "x"), t(20), |_| false);

        assert_eq!(cart.last_scanned().unwrap().ean, "1");
    }

    #[test]
    fn test_recommendations() {
        let mut cart = Cart::new();
        for (i, g) in [500.0, 50.0, 900.0, 120.0, 300.0].iter().enumerate() {
            cart.add_product(&product(&i.to_string(), Some(*g), "x"), t(i as i64), |_| true);
        }
        cart.add_product(&product("no-data", None, "x"), t(9), |_| true);

        let reco = cart.recommendations();
        let low: Vec<f64> = reco.lowest.iter().filter_map(|i| i.co2_unit_g).collect();
        let high: Vec<f64> = reco.highest.iter().filter_map(|i| i.co2_unit_g).collect();
        assert_eq!(low, vec![50.0, 120.0, 300.0]);
        assert_eq!(high, vec![900.0, 500.0, 300.0]);

        assert_eq!(Cart::new().recommendations(), Recommendations::default());
    }

    #[test]
    fn test_category_breakdown_and_dominant() {
        let mut cart = Cart::new();
        cart.add_product(&product("1", Some(600.0), "Viandes"), t(0), |_| true);
        cart.add_product(&product("2", Some(300.0), "Légumes"), t(1), |_| true);
        cart.add_product(&product("3", Some(100.0), "Sodas"), t(2), |_| true);

        let breakdown = cart.category_breakdown();
        assert_eq!(breakdown.total_g, 1000.0);
        assert_eq!(breakdown.totals_g.get(&GraphCategory::Meat), Some(&600.0));
        assert_eq!(breakdown.share_pct(GraphCategory::Beverage), 10.0);

        let (dominant, pct) = breakdown.dominant().unwrap();
        assert_eq!(dominant, GraphCategory::Meat);
        assert_eq!(pct, 60.0);

        assert!(Cart::new().category_breakdown().dominant().is_none());
    }

    #[test]
    fn test_summary() {
        let mut cart = Cart::new();
        assert!(cart.summary().is_none());

        cart.add_product(&product("1", None, "x"), t(0), |_| true);
        assert!(cart.summary().is_none(), "no CO₂ data means nothing to record");

        cart.add_product(&product("2", Some(11_000.0), "x"), t(1), |_| true);
        cart.add_product(&product("2", Some(11_000.0), "x"), t(2), |_| true);

        let summary = cart.summary().unwrap();
        assert_eq!(summary.total_co2_g, 22_000);
        assert_eq!(summary.nb_articles, 3);
        assert_eq!(summary.nb_distinct_products, 2);
        assert_eq!(summary.total_distance_km, 300);
        assert!((summary.days_captured_by_tree - 365.0).abs() < 1e-9);
        assert!((summary.tree_equivalent - 365.0 / 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_cart_json_is_plain_array() {
        let mut cart = Cart::new();
        cart.add_product(&product("1", Some(10.0), "x"), t(0), |_| true);

        let json = serde_json::to_value(&cart).unwrap();
        assert!(json.is_array());
        assert_eq!(json[0]["ean"], "1");

        let back: Cart = serde_json::from_value(json).unwrap();
        assert_eq!(back, cart);
    }
}
