//! Product category classification for the cart breakdown
//!
//! Free-form category text from the product API (often an OpenFoodFacts
//! category path in French) is reduced to five graph categories by keyword
//! matching. Lists are checked in display order and the first hit wins.

use serde::{Deserialize, Serialize};
use std::fmt;

const MEAT_KEYWORDS: &[&str] = &[
    "viande", "bœuf", "boeuf", "porc", "poulet", "volaille", "dinde", "agneau", "charcuterie",
    "steak",
];

const PLANT_KEYWORDS: &[&str] = &[
    "légume", "legume", "fruit", "végétal", "vegetal", "végétaux", "vegetaux", "céréale",
    "cereale", "légumineuse", "legumineuse",
];

const GROCERY_KEYWORDS: &[&str] = &[
    "épicerie", "epicerie", "sucré", "sucre", "chocolat", "biscuit", "gâteau", "gateau",
    "pâtisserie", "patisserie", "snack", "barre",
];

const BEVERAGE_KEYWORDS: &[&str] = &["boisson", "eau", "soda", "limonade", "jus", "sirop"];

/// One of the five categories shown in cart reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GraphCategory {
    Meat,
    Plant,
    Grocery,
    Beverage,
    Other,
}

impl GraphCategory {
    /// All categories in display order
    pub const ALL: [GraphCategory; 5] = [
        GraphCategory::Meat,
        GraphCategory::Plant,
        GraphCategory::Grocery,
        GraphCategory::Beverage,
        GraphCategory::Other,
    ];

    /// Classify raw category text; `None` and unmatched text give `Other`
    pub fn classify(raw: Option<&str>) -> Self {
        let text = match raw {
            Some(t) => t.to_lowercase(),
            None => return GraphCategory::Other,
        };

        let table: [(GraphCategory, &[&str]); 4] = [
            (GraphCategory::Meat, MEAT_KEYWORDS),
            (GraphCategory::Plant, PLANT_KEYWORDS),
            (GraphCategory::Grocery, GROCERY_KEYWORDS),
            (GraphCategory::Beverage, BEVERAGE_KEYWORDS),
        ];

        table
            .iter()
            .find(|(_, keywords)| keywords.iter().any(|k| text.contains(k)))
            .map(|(category, _)| *category)
            .unwrap_or(GraphCategory::Other)
    }

    /// Display label used by the app
    pub fn label(&self) -> &'static str {
        match self {
            GraphCategory::Meat => "Viande",
            GraphCategory::Plant => "Végétaux",
            GraphCategory::Grocery => "Épicerie",
            GraphCategory::Beverage => "Boisson",
            GraphCategory::Other => "Autres",
        }
    }

    /// Chart color (hex)
    pub fn color(&self) -> &'static str {
        match self {
            GraphCategory::Meat => "#D9534F",
            GraphCategory::Plant => "#5CB85C",
            GraphCategory::Grocery => "#F0AD4E",
            GraphCategory::Beverage => "#5BC0DE",
            GraphCategory::Other => "#999999",
        }
    }
}

impl fmt::Display for GraphCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
