use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::time::{Duration, Instant};

use crate::api::DashboardApi;
use crate::error::{Error, Result};
use crate::metrics;
use crate::models::{Balance, Order, OrderResponse, Performance, Positions, Snapshot, Trade};

/// A client for the dashboard's JSON API (`/api/market`, `/api/order`, ...).
#[derive(Debug, Clone)]
pub struct HttpDashboardClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpDashboardClient {
    /// Creates a new `HttpDashboardClient`.
    ///
    /// # Arguments
    /// * `base_url` - Server root, e.g. "http://localhost:5000". A trailing
    ///   slash is ignored.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: normalize(base_url.into()),
        }
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: normalize(base_url.into()),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, name: &str) -> String {
        format!("{}/api/{}", self.base_url, name)
    }

    async fn get_json<T: DeserializeOwned>(&self, name: &str) -> Result<T> {
        let url = self.endpoint(name);
        log::debug!("GET {}", url);
        let started = Instant::now();

        let response = self.client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::ApiConnectionFailed(format!("GET {} failed: {}", url, e)))?;

        metrics::FETCH_LATENCY.observe(started.elapsed().as_secs_f64());

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_else(|_| "Failed to read error body".to_string());
            return Err(Error::ApiError(format!(
                "GET {} failed with status {}: {}", url, status, error_text
            )));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| Error::ApiInvalidFormat(format!("Failed to parse {} response: {}", name, e)))
    }
}

fn normalize(base_url: String) -> String {
    base_url.trim_end_matches('/').to_string()
}

#[async_trait]
impl DashboardApi for HttpDashboardClient {
    async fn fetch_market(&self) -> Result<Snapshot> {
        self.get_json("market").await
    }

    async fn fetch_balance(&self) -> Result<Balance> {
        self.get_json("balance").await
    }

    async fn fetch_positions(&self) -> Result<Positions> {
        self.get_json("positions").await
    }

    async fn fetch_history(&self) -> Result<Vec<Trade>> {
        self.get_json("history").await
    }

    async fn fetch_performance(&self) -> Result<Performance> {
        self.get_json("performance").await
    }

    async fn submit_order(&self, order: &Order) -> Result<OrderResponse> {
        let url = self.endpoint("order");
        log::debug!("POST {}: {:?}", url, order);

        let response = self.client
            .post(&url)
            .json(order)
            .send()
            .await
            .map_err(|e| {
                log::error!("Order request to {} failed: {}", url, e);
                Error::ApiConnectionFailed(format!("POST {} failed: {}", url, e))
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::ApiConnectionFailed(format!("Reading order response from {} failed: {}", url, e)))?;

        // 4xx responses carry `{"error": ...}` from the order handler.
        if status.is_success() || status.is_client_error() {
            if let Ok(parsed) = serde_json::from_str::<OrderResponse>(&body) {
                if status.is_success() || parsed.error.is_some() {
                    return Ok(parsed);
                }
            }
        }

        if status.is_success() {
            return Err(Error::ApiInvalidFormat(format!("Failed to parse order response: {}", body)));
        }
        if status == StatusCode::NOT_FOUND {
            return Err(Error::ApiError(format!("Order endpoint not found at {}", url)));
        }
        Err(Error::ApiError(format!("POST {} failed with status {}: {}", url, status, body)))
    }
}
