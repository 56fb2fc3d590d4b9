// src/quotes.rs
use crate::error::{PortfolioError, Result};
use async_trait::async_trait;
use log::info;
use reqwest::header::USER_AGENT;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;

pub const YAHOO_BASE_URL: &str = "https://query1.finance.yahoo.com";
pub const ALPHAVANTAGE_BASE_URL: &str = "https://www.alphavantage.co";

/// Source of the most recent daily close for a symbol.
///
/// `Ok(None)` means the service answered but had no data for the symbol.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    async fn latest_close(&self, symbol: &str) -> Result<Option<f64>>;
}

#[derive(Deserialize)]
struct ChartResponse {
    chart: ChartBody,
}

#[derive(Deserialize)]
struct ChartBody {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Deserialize)]
struct ChartError {
    code: String,
    description: Option<String>,
}

#[derive(Deserialize)]
struct ChartResult {
    indicators: ChartIndicators,
}

#[derive(Deserialize)]
struct ChartIndicators {
    quote: Vec<ChartQuote>,
}

#[derive(Deserialize)]
struct ChartQuote {
    #[serde(default)]
    close: Vec<Option<f64>>,
}

/// Unauthenticated Yahoo Finance chart endpoint, one-day range.
pub struct YahooQuotes {
    client: Client,
    base_url: String,
}

impl YahooQuotes {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
        }
    }
}

impl Default for YahooQuotes {
    fn default() -> Self {
        Self::new(YAHOO_BASE_URL)
    }
}

#[async_trait]
impl QuoteSource for YahooQuotes {
    async fn latest_close(&self, symbol: &str) -> Result<Option<f64>> {
        let url = format!(
            "{}/v8/finance/chart/{}?range=1d&interval=1d",
            self.base_url.trim_end_matches('/'),
            symbol
        );
        info!("Fetching current price for {} from Yahoo", symbol);

        let response = self
            .client
            .get(&url)
            .header(USER_AGENT, "Mozilla/5.0")
            .send()
            .await?;
        let status = response.status();
        let body: ChartResponse = response.json().await?;
        if let Some(err) = body.chart.error {
            if err.code == "Not Found" {
                return Ok(None);
            }
            return Err(PortfolioError::Quote(format!(
                "{}: {}",
                err.code,
                err.description.unwrap_or_default()
            )));
        }
        if !status.is_success() {
            return Err(PortfolioError::Quote(format!("HTTP {}", status)));
        }
        Ok(last_close_from_chart(body.chart.result.unwrap_or_default()))
    }
}

fn last_close_from_chart(results: Vec<ChartResult>) -> Option<f64> {
    results
        .into_iter()
        .flat_map(|r| r.indicators.quote)
        .flat_map(|q| q.close)
        .flatten()
        .last()
}

#[derive(Deserialize)]
struct TimeSeriesData {
    #[serde(rename = "4. close")]
    close: String,
}

#[derive(Deserialize)]
struct AlphaVantageResponse {
    #[serde(rename = "Time Series (Daily)")]
    time_series: Option<HashMap<String, TimeSeriesData>>,
    #[serde(rename = "Error Message")]
    error_message: Option<String>,
    #[serde(rename = "Note")]
    note: Option<String>,
}

/// Alpha Vantage `TIME_SERIES_DAILY`; needs an API key.
pub struct AlphaVantageQuotes {
    client: Client,
    base_url: String,
    api_key: String,
}

impl AlphaVantageQuotes {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl QuoteSource for AlphaVantageQuotes {
    async fn latest_close(&self, symbol: &str) -> Result<Option<f64>> {
        let url = format!(
            "{}/query?function=TIME_SERIES_DAILY&symbol={}&apikey={}",
            self.base_url.trim_end_matches('/'),
            symbol,
            self.api_key
        );
        info!("Fetching current price for {} from Alpha Vantage", symbol);

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(PortfolioError::Quote(format!(
                "HTTP {}",
                response.status()
            )));
        }
        let body: AlphaVantageResponse = response.json().await?;
        if let Some(message) = body.error_message.or(body.note) {
            return Err(PortfolioError::Quote(message));
        }
        latest_alphavantage_close(body.time_series.unwrap_or_default())
    }
}

fn latest_alphavantage_close(series: HashMap<String, TimeSeriesData>) -> Result<Option<f64>> {
    // Keys are YYYY-MM-DD, so the lexical maximum is the latest day.
    match series.into_iter().max_by(|a, b| a.0.cmp(&b.0)) {
        Some((date, data)) => data.close.parse::<f64>().map(Some).map_err(|e| {
            PortfolioError::Quote(format!("bad close {:?} on {}: {}", data.close, date, e))
        }),
        None => Ok(None),
    }
}
