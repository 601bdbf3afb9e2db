//! Command implementations behind the `honoua-scan` binary
//!
//! Every command writes its report to the given writer so the binary can
//! print to stdout and tests can capture the text.

use crate::services::{ApiError, HonouaClient};
use crate::session::{parse_decoder_line, ScanSession};
use anyhow::{Context, Result};
use chrono::{Datelike, Utc};
use honoua_common::aggregate::aggregate_by_period;
use honoua_common::budget::{compute_budget, BudgetState};
use honoua_common::cart::{AddOutcome, Cart, CartItem};
use honoua_common::challenges::build_challenges;
use honoua_common::config::TomlConfig;
use honoua_common::db;
use honoua_common::evolution::{build_series, series_from_aggregation, summarize, PeriodType};
use honoua_common::history::{CartHistoryRecord, DEFAULT_HISTORY_LIMIT};
use honoua_common::product::ProductRecord;
use honoua_common::units::{format_kg, format_tree_days, grams_to_kg};
use honoua_common::{ConfirmedScan, Gtin};
use serde::Serialize;
use serde_json::Value;
use sqlx::SqlitePool;
use std::io::{BufRead, Write};
use tracing::{info, warn};

/// History entries requested from the API for dashboards
const REMOTE_HISTORY_LIMIT: usize = 200;

/// Everything a command needs
pub struct App {
    pub pool: SqlitePool,
    /// `None` when running offline
    pub client: Option<HonouaClient>,
    pub config: TomlConfig,
    pub location: Option<(f64, f64)>,
    pub json: bool,
}

fn write_json<T: Serialize>(out: &mut impl Write, value: &T) -> Result<()> {
    writeln!(out, "{}", serde_json::to_string_pretty(value)?)?;
    Ok(())
}

fn history_limit(config: &TomlConfig) -> usize {
    if config.history_limit == 0 {
        DEFAULT_HISTORY_LIMIT
    } else {
        config.history_limit
    }
}

#[derive(Debug, Serialize)]
struct CodeCheck<'a> {
    code: &'a str,
    valid: bool,
    kind: Option<&'static str>,
}

/// Validate barcodes; returns false when any code is invalid
pub fn check_codes(codes: &[String], json: bool, out: &mut impl Write) -> Result<bool> {
    let checks: Vec<CodeCheck> = codes
        .iter()
        .map(|code| {
            let kind = code.parse::<Gtin>().ok().map(|g| g.kind().as_str());
            CodeCheck {
                code,
                valid: kind.is_some(),
                kind,
            }
        })
        .collect();

    if json {
        write_json(out, &checks)?;
    } else {
        for check in &checks {
            match check.kind {
                Some(kind) => writeln!(out, "{}\tvalid\t{}", check.code, kind)?,
                None => writeln!(out, "{}\tinvalid", check.code)?,
            }
        }
    }

    Ok(checks.iter().all(|c| c.valid))
}

/// Counters for one replayed scan session
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    pub confirmed: u32,
    pub added: u32,
    pub incremented: u32,
    pub declined: u32,
    pub not_found: u32,
    pub failed: u32,
}

impl App {
    /// Look up a confirmed code; offline scans get a record without CO₂ data
    async fn product_for(&self, scan: &ConfirmedScan) -> Result<Option<ProductRecord>, ApiError> {
        match &self.client {
            Some(client) => client.fetch_product(&scan.code, self.location).await,
            None => Ok(Some(ProductRecord::from_api_value(&Value::Null, &scan.code))),
        }
    }

    /// Replay decoder output through a scan session and fill the cart
    ///
    /// Repeat adds of a product already in the cart need `accept_repeats`.
    pub async fn scan(
        &self,
        input: impl BufRead,
        accept_repeats: bool,
        out: &mut impl Write,
    ) -> Result<ScanReport> {
        let mut cart = db::load_cart(&self.pool).await?;
        let mut session = ScanSession::start(self.config.scan, Utc::now());
        let mut report = ScanReport::default();

        for (index, line) in input.lines().enumerate() {
            let line = line.context("Failed to read decoder input")?;
            let (millis, event) = match parse_decoder_line(&line) {
                Ok(Some(parsed)) => parsed,
                Ok(None) => continue,
                Err(e) => {
                    warn!("Skipping line {}: {}", index + 1, e);
                    continue;
                }
            };

            let at = session.at_offset(millis);
            let Some(scan) = session.on_event(event, at) else {
                continue;
            };
            report.confirmed += 1;

            let product = match self.product_for(&scan).await {
                Ok(Some(product)) => product,
                Ok(None) => {
                    report.not_found += 1;
                    writeln!(out, "{}\tno CO₂ data available", scan.code)?;
                    continue;
                }
                Err(e) => {
                    warn!("Lookup failed for {}: {}", scan.code, e);
                    report.failed += 1;
                    writeln!(out, "{}\tlookup failed", scan.code)?;
                    continue;
                }
            };

            let outcome = cart.add_product(&product, scan.confirmed_at, |_| accept_repeats);
            match outcome {
                AddOutcome::Added => {
                    report.added += 1;
                    writeln!(out, "{}\tadded\t{}", scan.code, product.name)?;
                }
                AddOutcome::Incremented(quantity) => {
                    report.incremented += 1;
                    writeln!(out, "{}\tquantity {}\t{}", scan.code, quantity, product.name)?;
                }
                AddOutcome::Declined => {
                    report.declined += 1;
                    writeln!(out, "{}\talready in cart\t{}", scan.code, product.name)?;
                }
            }
        }

        session.stop();
        db::save_cart(&self.pool, &cart).await?;
        info!(
            "Scan finished: {} confirmed, {} added, {} incremented",
            report.confirmed, report.added, report.incremented
        );

        if self.json {
            write_json(out, &report)?;
        }

        Ok(report)
    }

    pub async fn lookup(&self, ean: &str, out: &mut impl Write) -> Result<bool> {
        let ean: Gtin = ean.parse()?;
        let client = self
            .client
            .as_ref()
            .context("Product lookup needs the API (remove --offline)")?;

        match client.fetch_product(&ean, self.location).await? {
            Some(product) => {
                write_json(out, &product)?;
                Ok(true)
            }
            None => {
                writeln!(out, "{}\tno CO₂ data available", ean)?;
                Ok(false)
            }
        }
    }

    pub async fn cart_show(&self, out: &mut impl Write) -> Result<()> {
        let cart = db::load_cart(&self.pool).await?;
        if self.json {
            return write_json(out, &cart);
        }
        write_cart(&cart, out)
    }

    pub async fn cart_remove(&self, ean: &str, out: &mut impl Write) -> Result<bool> {
        let mut cart = db::load_cart(&self.pool).await?;
        let removed = cart.remove(ean.trim());
        if removed {
            db::save_cart(&self.pool, &cart).await?;
            writeln!(out, "Removed {}", ean.trim())?;
        } else {
            writeln!(out, "{} is not in the cart", ean.trim())?;
        }
        Ok(removed)
    }

    pub async fn cart_clear(&self, out: &mut impl Write) -> Result<()> {
        db::save_cart(&self.pool, &Cart::new()).await?;
        writeln!(out, "Cart cleared")?;
        Ok(())
    }

    /// Record the cart in history (local, then remote) and empty it
    ///
    /// Returns false when there is nothing to validate.
    pub async fn cart_validate(&self, out: &mut impl Write) -> Result<bool> {
        let cart = db::load_cart(&self.pool).await?;
        let Some(summary) = cart.summary() else {
            writeln!(out, "Nothing to validate: the cart has no CO₂ data")?;
            return Ok(false);
        };

        let record = CartHistoryRecord::from_summary(&summary, Utc::now());
        db::append_cart_history(&self.pool, record, history_limit(&self.config)).await?;

        if let Some(client) = &self.client {
            let user_id = db::user_id(&self.pool).await?;
            if let Err(e) = client.post_cart_summary(&summary, &user_id).await {
                warn!("Cart saved locally but not sent to the API: {}", e);
            }
        }

        db::save_cart(&self.pool, &Cart::new()).await?;

        if self.json {
            write_json(out, &summary)?;
        } else {
            writeln!(
                out,
                "Validated cart: {} ({} items, {} products, {} km)",
                format_kg(grams_to_kg(summary.total_co2_g as f64), 2),
                summary.nb_articles,
                summary.nb_distinct_products,
                summary.total_distance_km
            )?;
            writeln!(
                out,
                "A tree needs {} to capture it",
                format_tree_days(summary.days_captured_by_tree)
            )?;
        }

        Ok(true)
    }

    /// Remote history when available, else the local one
    async fn history_records(&self) -> Result<Vec<CartHistoryRecord>> {
        if let Some(client) = &self.client {
            match client.fetch_history(REMOTE_HISTORY_LIMIT).await {
                Ok(Some(records)) if !records.is_empty() => return Ok(records),
                Ok(_) => info!("No remote history, using local history"),
                Err(e) => warn!("Remote history unavailable, using local history: {}", e),
            }
        }

        let history = db::load_cart_history(&self.pool, history_limit(&self.config)).await?;
        Ok(history.records())
    }

    async fn current_household_size(&self) -> Result<u32> {
        let default = self.config.budget.household_size.unwrap_or(1);
        Ok(db::household_size(&self.pool, default).await?)
    }

    pub async fn budget(&self, out: &mut impl Write) -> Result<BudgetState> {
        let records = self.history_records().await?;
        let household = self.current_household_size().await?;
        let state = compute_budget(
            &records,
            Utc::now().year(),
            household,
            self.config.budget.per_person_kg,
        );

        if self.json {
            write_json(out, &state)?;
        } else {
            writeln!(
                out,
                "Annual budget {}: {} for {} person(s)",
                state.current_year,
                format_kg(state.budget_annual_kg, 0),
                state.household_size
            )?;
            writeln!(
                out,
                "Used {} ({:.1} %), remaining {}",
                format_kg(state.co2_annual_kg, 1),
                state.percent_used,
                format_kg(state.budget_remaining_kg, 0)
            )?;
            writeln!(out, "{} [{}]", state.status_label, state.status_level)?;
        }

        Ok(state)
    }

    pub async fn evolution(&self, period: PeriodType, out: &mut impl Write) -> Result<()> {
        let records = self.history_records().await?;

        let mut series = build_series(&records, period);
        if series.is_empty() {
            series = series_from_aggregation(&aggregate_by_period(&records), period);
        }
        let summary = summarize(&series, period);

        if self.json {
            #[derive(Serialize)]
            struct Evolution<'a> {
                series: &'a [honoua_common::evolution::EvolutionPoint],
                summary: &'a Option<honoua_common::evolution::EvolutionSummary>,
            }
            return write_json(out, &Evolution { series: &series, summary: &summary });
        }

        if series.is_empty() {
            writeln!(out, "No history yet")?;
            return Ok(());
        }

        for point in &series {
            writeln!(
                out,
                "{:<14}{:>12}{:>10.0} km",
                point.label,
                format_kg(point.co2_kg, 1),
                point.distance_km
            )?;
        }

        if let Some(summary) = summary {
            if let Some(previous) = &summary.previous {
                let change = |pct: Option<f64>| match pct {
                    Some(p) => format!("{:+.1} %", p),
                    None => "n/a".to_string(),
                };
                writeln!(
                    out,
                    "{} vs {}: CO₂ {}, distance {}",
                    summary.current.label,
                    previous.label,
                    change(summary.co2_change_pct),
                    change(summary.distance_change_pct)
                )?;
            }
        }

        Ok(())
    }

    pub async fn challenges(&self, out: &mut impl Write) -> Result<()> {
        let records = self.history_records().await?;
        let challenges = build_challenges(&aggregate_by_period(&records));

        if self.json {
            return write_json(out, &challenges);
        }

        for challenge in &challenges {
            writeln!(
                out,
                "{} {} [{}] {}%",
                challenge.icon,
                challenge.name,
                challenge.status.label(),
                challenge.progress_pct
            )?;
            writeln!(out, "   {}", challenge.message)?;
        }

        Ok(())
    }

    /// Show or set the household size
    pub async fn household(&self, size: Option<f64>, out: &mut impl Write) -> Result<u32> {
        let size = match size {
            Some(raw) => db::set_household_size(&self.pool, raw).await?,
            None => self.current_household_size().await?,
        };
        writeln!(out, "Household size: {}", size)?;
        Ok(size)
    }
}

fn write_cart(cart: &Cart, out: &mut impl Write) -> Result<()> {
    if cart.is_empty() {
        writeln!(out, "Cart is empty")?;
        return Ok(());
    }

    for item in cart.items() {
        writeln!(out, "{}", cart_line(item))?;
    }

    let totals = cart.totals();
    writeln!(
        out,
        "Total: {} ({} items, {} products, {:.0} km)",
        format_kg(grams_to_kg(totals.total_co2_g), 2),
        totals.total_items,
        totals.distinct_products,
        cart.total_distance_km()
    )?;

    if let Some((category, share)) = cart.category_breakdown().dominant() {
        writeln!(out, "Main category: {} ({:.0} %)", category, share)?;
    }

    if let Some(summary) = cart.summary() {
        writeln!(
            out,
            "Tree capture: {}",
            format_tree_days(summary.days_captured_by_tree)
        )?;
    }

    let recommendations = cart.recommendations();
    if let Some(best) = recommendations.lowest.first() {
        writeln!(out, "Lowest impact: {}", best.product_name)?;
    }
    if let Some(worst) = recommendations.highest.first() {
        writeln!(out, "Highest impact: {}", worst.product_name)?;
    }

    Ok(())
}

fn cart_line(item: &CartItem) -> String {
    let co2 = if item.has_co2_data {
        format_kg(grams_to_kg(item.co2_total_g), 2)
    } else {
        "no data".to_string()
    };
    format!(
        "{:>3} × {} ({})\t{}",
        item.quantity, item.product_name, item.ean, co2
    )
}
