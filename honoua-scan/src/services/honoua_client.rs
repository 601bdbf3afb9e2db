//! Honoua CO₂ API client
//!
//! Endpoints:
//! - `GET  /api/v1/co2/product/{ean}` product CO₂ record (404: unknown product)
//! - `GET  /api/cart/history?limit=N` validated carts (404: endpoint not deployed)
//! - `POST /api/cart/history` record a validated cart summary

use honoua_common::cart::CartSummary;
use honoua_common::history::{normalize_history_response, CartHistoryRecord};
use honoua_common::product::ProductRecord;
use honoua_common::Gtin;
use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

const USER_AGENT: &str = concat!("honoua-scan/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT_SECS: u64 = 30;
const USER_ID_HEADER: &str = "X-Honoua-User-Id";

/// Honoua API client errors
#[derive(Debug, Error)]
pub enum ApiError {
    /// Network communication error
    #[error("Network error: {0}")]
    Network(String),

    /// API returned an error response
    #[error("API error {0}: {1}")]
    Status(u16, String),

    /// Failed to parse API response JSON
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Honoua API client
#[derive(Clone)]
pub struct HonouaClient {
    http_client: reqwest::Client,
    base_url: String,
    user_id: Option<String>,
}

impl HonouaClient {
    /// Create a client for `base_url` (trailing slashes ignored)
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            user_id: None,
        })
    }

    /// Identify history reads with this user id
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Look up a product; `Ok(None)` when the API has no data for it
    ///
    /// With a known location the API computes the transport distance from
    /// the user rather than a national average.
    pub async fn fetch_product(
        &self,
        ean: &Gtin,
        location: Option<(f64, f64)>,
    ) -> Result<Option<ProductRecord>, ApiError> {
        let url = format!("{}/api/v1/co2/product/{}", self.base_url, ean);

        tracing::debug!(ean = %ean, url = %url, "Querying product CO₂");

        let mut request = self.http_client.get(&url).header("Accept", "application/json");
        if let Some((lat, lon)) = location {
            request = request.query(&[("user_lat", lat.to_string()), ("user_lon", lon.to_string())]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            let detail = response
                .json::<Value>()
                .await
                .ok()
                .and_then(|v| v.get("detail").and_then(Value::as_str).map(str::to_string))
                .filter(|d| !d.trim().is_empty())
                .unwrap_or_else(|| "no CO₂ data for this product yet".to_string());
            tracing::warn!(ean = %ean, "Product not found: {}", detail);
            return Ok(None);
        }

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ApiError::Status(status.as_u16(), error_text));
        }

        let data: Value = response
            .json()
            .await
            .map_err(|e| ApiError::Parse(e.to_string()))?;

        let record = ProductRecord::from_api_value(&data, ean);

        tracing::info!(
            ean = %ean,
            name = %record.name,
            has_co2 = record.has_co2_data(),
            "Product lookup successful"
        );

        Ok(Some(record))
    }

    /// Remote history, normalized; `Ok(None)` when the endpoint is not deployed
    pub async fn fetch_history(
        &self,
        limit: usize,
    ) -> Result<Option<Vec<CartHistoryRecord>>, ApiError> {
        let url = format!("{}/api/cart/history", self.base_url);

        let mut request = self
            .http_client
            .get(&url)
            .query(&[("limit", limit)])
            .header("Accept", "application/json");
        if let Some(user_id) = &self.user_id {
            request = request.header(USER_ID_HEADER, user_id);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            tracing::info!("Cart history endpoint unavailable (404)");
            return Ok(None);
        }

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ApiError::Status(status.as_u16(), error_text));
        }

        let raw: Value = response
            .json()
            .await
            .map_err(|e| ApiError::Parse(e.to_string()))?;

        let records = normalize_history_response(&raw);
        tracing::debug!(count = records.len(), "Fetched cart history");

        Ok(Some(records))
    }

    /// Record a validated cart
    pub async fn post_cart_summary(
        &self,
        summary: &CartSummary,
        user_id: &str,
    ) -> Result<(), ApiError> {
        let url = format!("{}/api/cart/history", self.base_url);

        let response = self
            .http_client
            .post(&url)
            .header("Accept", "application/json")
            .header(USER_ID_HEADER, user_id)
            .json(summary)
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ApiError::Status(status.as_u16(), error_text));
        }

        tracing::info!(
            total_co2_g = summary.total_co2_g,
            nb_articles = summary.nb_articles,
            "Cart summary recorded"
        );

        Ok(())
    }
}
