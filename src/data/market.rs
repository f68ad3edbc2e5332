//! CoinGecko market data API client
//!
//! This module provides functionality to search for coins by name and fetch
//! consolidated market data (price, market cap, volume, 7-day sparkline) for
//! a set of coin ids, quoted in USD.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::MarketProvider;

/// Base URL for the CoinGecko API
const COINGECKO_API_BASE: &str = "https://api.coingecko.com/api/v3";

/// Upper bound on a single upstream request, so a hung API cannot pin a
/// request handler indefinitely
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// A coin matching a search term, prior to market-data enrichment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    /// CoinGecko coin id, used to request market data
    pub id: String,
    /// Human-readable coin name
    pub name: String,
    /// Ticker symbol
    pub symbol: String,
}

/// Response shape of the CoinGecko `/search` endpoint
#[derive(Debug, Deserialize)]
struct SearchResponse {
    coins: Vec<Candidate>,
}

/// Errors that can occur when talking to the market data API
#[derive(Debug, Error)]
pub enum MarketError {
    /// HTTP request failed (network error, timeout)
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// Upstream answered with a non-success status
    #[error("Upstream returned status {0}")]
    BadStatus(StatusCode),

    /// Failed to parse JSON response
    #[error("Failed to parse JSON response: {0}")]
    ParseError(#[from] serde_json::Error),
}

/// Client for the CoinGecko market data API
#[derive(Debug, Clone)]
pub struct MarketClient {
    client: Client,
    base_url: String,
}

impl Default for MarketClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MarketClient {
    /// Create a new MarketClient against the public CoinGecko API
    pub fn new() -> Self {
        Self::with_base_url(COINGECKO_API_BASE)
    }

    /// Create a new MarketClient with a custom API base URL
    ///
    /// Useful for tests or self-hosted API proxies.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
        }
    }

    /// Search for coins matching a query term
    ///
    /// # Arguments
    /// * `query` - The search term, as typed by the user
    ///
    /// # Returns
    /// * `Ok(Vec<Candidate>)` - All candidates upstream reported, in its order
    /// * `Err(MarketError)` - If the request or parsing fails
    pub async fn search(&self, query: &str) -> Result<Vec<Candidate>, MarketError> {
        let url = self.search_url(query);
        let response = self
            .client
            .get(&url)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(MarketError::BadStatus(status));
        }

        let text = response.text().await?;
        let parsed: SearchResponse = serde_json::from_str(&text)?;
        Ok(parsed.coins)
    }

    /// Fetch consolidated market data for a set of coin ids in one call
    ///
    /// Returns the upstream JSON array verbatim: price, market cap, volume,
    /// 24h change, and 7-day sparkline per coin, quoted in USD and ordered by
    /// market cap.
    pub async fn markets(&self, ids: &[String]) -> Result<Value, MarketError> {
        let url = self.markets_url(ids);
        let response = self
            .client
            .get(&url)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(MarketError::BadStatus(status));
        }

        let text = response.text().await?;
        let payload: Value = serde_json::from_str(&text)?;
        Ok(payload)
    }

    fn search_url(&self, query: &str) -> String {
        format!("{}/search?query={}", self.base_url, query)
    }

    fn markets_url(&self, ids: &[String]) -> String {
        format!(
            "{}/coins/markets?vs_currency=usd&ids={}&order=market_cap_desc&sparkline=true",
            self.base_url,
            ids.join(",")
        )
    }
}

#[async_trait]
impl MarketProvider for MarketClient {
    async fn search(&self, query: &str) -> Result<Vec<Candidate>, MarketError> {
        MarketClient::search(self, query).await
    }

    async fn markets(&self, ids: &[String]) -> Result<Value, MarketError> {
        MarketClient::markets(self, ids).await
    }
}
