//! Validated-cart history
//!
//! History records come from two places: carts validated locally and the
//! `/api/cart/history` endpoint. Neither follows a strict schema, so every
//! record is decoded field by field: missing or wrong-typed numbers become 0,
//! missing strings become `None`.

use crate::cart::CartSummary;
use crate::time::{iso_week_key, month_key};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::VecDeque;

/// Records kept in the local history
pub const DEFAULT_HISTORY_LIMIT: usize = 30;

/// One validated cart
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CartHistoryRecord {
    pub period_type: Option<String>,
    pub period_label: Option<String>,
    pub period_month: Option<String>,
    pub period_week: Option<String>,
    pub total_co2_g: f64,
    pub nb_articles: f64,
    pub nb_distinct_products: f64,
    pub total_distance_km: f64,
    pub days_captured_by_tree: f64,
    pub tree_equivalent: f64,
    pub created_at: Option<String>,
    pub validated_at: Option<String>,
}

impl CartHistoryRecord {
    /// Monthly record for a cart validated at `now`
    pub fn from_summary(summary: &CartSummary, now: DateTime<Utc>) -> Self {
        let month = month_key(&now);
        Self {
            period_type: Some("month".to_string()),
            period_label: Some(month.clone()),
            period_month: Some(month),
            period_week: Some(iso_week_key(&now)),
            total_co2_g: summary.total_co2_g as f64,
            nb_articles: summary.nb_articles as f64,
            nb_distinct_products: summary.nb_distinct_products as f64,
            total_distance_km: summary.total_distance_km as f64,
            days_captured_by_tree: summary.days_captured_by_tree,
            tree_equivalent: summary.tree_equivalent,
            created_at: Some(now.to_rfc3339()),
            validated_at: None,
        }
    }

    /// Decode one loosely-typed JSON object; `None` for non-objects
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        Some(Self {
            period_type: text(obj, "period_type"),
            period_label: text(obj, "period_label"),
            period_month: text(obj, "period_month"),
            period_week: text(obj, "period_week"),
            total_co2_g: number(obj, "total_co2_g"),
            nb_articles: number(obj, "nb_articles"),
            nb_distinct_products: number(obj, "nb_distinct_products"),
            total_distance_km: number(obj, "total_distance_km"),
            days_captured_by_tree: number(obj, "days_captured_by_tree"),
            tree_equivalent: number(obj, "tree_equivalent"),
            created_at: text(obj, "created_at"),
            validated_at: text(obj, "validated_at"),
        })
    }
}

fn number(obj: &Map<String, Value>, field: &str) -> f64 {
    let parsed = match obj.get(field) {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite()).unwrap_or(0.0)
}

fn text(obj: &Map<String, Value>, field: &str) -> Option<String> {
    match obj.get(field) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

/// Records from a history payload: a bare array or `{ "value": [...] }`
pub fn normalize_history_response(raw: &Value) -> Vec<CartHistoryRecord> {
    let items = match raw {
        Value::Array(items) => items,
        Value::Object(obj) => match obj.get("value") {
            Some(Value::Array(items)) => items,
            _ => return Vec::new(),
        },
        _ => return Vec::new(),
    };

    items.iter().filter_map(CartHistoryRecord::from_value).collect()
}

/// Bounded history, newest first
#[derive(Debug, Clone, PartialEq)]
pub struct CartHistory {
    records: VecDeque<CartHistoryRecord>,
    limit: usize,
}

impl Default for CartHistory {
    fn default() -> Self {
        Self::with_limit(DEFAULT_HISTORY_LIMIT)
    }
}

impl CartHistory {
    pub fn with_limit(limit: usize) -> Self {
        Self {
            records: VecDeque::new(),
            limit: limit.max(1),
        }
    }

    /// Build from stored records (assumed newest first), trimmed to `limit`
    pub fn from_records(records: Vec<CartHistoryRecord>, limit: usize) -> Self {
        let mut history = Self::with_limit(limit);
        history.records = records.into_iter().take(history.limit).collect();
        history
    }

    /// Record a new validated cart, dropping the oldest beyond the limit
    pub fn push_front(&mut self, record: CartHistoryRecord) {
        self.records.push_front(record);
        self.records.truncate(self.limit);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The `n` most recent records
    pub fn latest(&self, n: usize) -> Vec<&CartHistoryRecord> {
        self.records.iter().take(n).collect()
    }

    pub fn records(&self) -> Vec<CartHistoryRecord> {
        self.records.iter().cloned().collect()
    }
}
