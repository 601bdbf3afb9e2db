//! # Honoua Common Library
//!
//! Shared code for the Honoua carbon footprint scanner:
//! - GTIN checksum validation and the barcode acceptance filter
//! - Product record normalization from the CO₂ API
//! - Cart, history, period aggregation, budget and challenges
//! - Local key/value storage (SQLite)
//! - Configuration loading

pub mod aggregate;
pub mod budget;
pub mod cart;
pub mod category;
pub mod challenges;
pub mod config;
pub mod db;
pub mod error;
pub mod evolution;
pub mod gtin;
pub mod history;
pub mod product;
pub mod scan_filter;
pub mod time;
pub mod units;

pub use error::{Error, Result};
pub use gtin::{is_valid_gtin, Gtin, GtinKind};
pub use scan_filter::{ConfirmedScan, ScanCandidate, ScanFilter, ScanFilterConfig};
