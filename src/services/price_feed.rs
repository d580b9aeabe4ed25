use crate::error::{GasScopeError, Result};
use crate::models::PriceRecord;
use crate::services::history::HistoryLog;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Source of live gas price quotes, in Gwei.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    async fn latest_price(&self) -> Result<f64>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BlockPricesResponse {
    block_prices: Vec<BlockPrice>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BlockPrice {
    estimated_prices: Vec<EstimatedPrice>,
}

#[derive(Debug, Deserialize)]
struct EstimatedPrice {
    price: Value,
}

/// Block-price estimation endpoint; consumes the first estimate of the first
/// block.
pub struct HttpQuoteSource {
    client: reqwest::Client,
    url: String,
    api_key: String,
}

impl HttpQuoteSource {
    pub fn new(url: impl Into<String>, api_key: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GasScopeError::FeedUnavailable(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: url.into(),
            api_key: api_key.into(),
        })
    }
}

#[async_trait]
impl QuoteSource for HttpQuoteSource {
    async fn latest_price(&self) -> Result<f64> {
        let response = self
            .client
            .get(&self.url)
            .header("Authorization", &self.api_key)
            .send()
            .await
            .map_err(|e| GasScopeError::FeedUnavailable(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GasScopeError::FeedUnavailable(format!(
                "quote endpoint returned {}",
                status
            )));
        }

        let body: BlockPricesResponse = response
            .json()
            .await
            .map_err(|e| GasScopeError::FeedUnavailable(format!("malformed quote: {}", e)))?;

        extract_price(&body)
    }
}

fn extract_price(body: &BlockPricesResponse) -> Result<f64> {
    let estimate = body
        .block_prices
        .first()
        .and_then(|block| block.estimated_prices.first())
        .ok_or_else(|| GasScopeError::FeedUnavailable("quote has no price estimates".into()))?;

    let price = match &estimate.price {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    match price {
        Some(p) if p.is_finite() && p >= 0.0 => Ok(p),
        _ => Err(GasScopeError::FeedUnavailable(format!(
            "invalid price field: {}",
            estimate.price
        ))),
    }
}

/// Fetches a live quote and records it in the history log.
pub struct PriceFeed {
    source: Arc<dyn QuoteSource>,
    history: Arc<dyn HistoryLog>,
}

impl PriceFeed {
    pub fn new(source: Arc<dyn QuoteSource>, history: Arc<dyn HistoryLog>) -> Self {
        Self { source, history }
    }

    pub fn history(&self) -> &Arc<dyn HistoryLog> {
        &self.history
    }

    /// Fetches one quote and appends it. Nothing is appended unless a price
    /// was obtained.
    pub async fn fetch_and_record(&self) -> Result<f64> {
        let price = match self.source.latest_price().await {
            Ok(price) => price,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to fetch live gas price");
                return Err(e);
            }
        };

        let record = PriceRecord::now(price);
        self.history.append(&record)?;

        tracing::info!(
            price_gwei = price,
            timestamp = %record.timestamp,
            "Live gas price recorded"
        );
        Ok(price)
    }
}
