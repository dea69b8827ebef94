//! Market-data port: the upstream REST API behind the proxy and the typed
//! market views.

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::error::CoinfolioError;
use crate::domain::market::{Coin, CoinDetail, PricePoint};

pub const DEFAULT_UPSTREAM_ERROR: &str = "Failed to fetch data from CoinGecko API";

/// Raw upstream answer, relayed as-is by the proxy.
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamReply {
    pub status: u16,
    pub body: Value,
}

impl UpstreamReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// The upstream's own `error` field, or the generic message.
    pub fn error_message(&self) -> String {
        self.body
            .get("error")
            .and_then(|e| e.as_str())
            .filter(|e| !e.is_empty())
            .unwrap_or(DEFAULT_UPSTREAM_ERROR)
            .to_string()
    }
}

#[async_trait]
pub trait MarketDataPort: Send + Sync {
    /// GET `endpoint` with `query`, adding credentials. Any HTTP status is a
    /// reply; only transport or decoding failures are errors.
    async fn forward(
        &self,
        endpoint: &str,
        query: &[(String, String)],
    ) -> Result<UpstreamReply, CoinfolioError>;

    async fn markets(&self, page: u32, per_page: u32) -> Result<Vec<Coin>, CoinfolioError>;

    async fn coin_detail(&self, coin_id: &str) -> Result<CoinDetail, CoinfolioError>;

    /// OHLC candles for the chart, oldest first.
    async fn ohlc(&self, coin_id: &str, days: u32) -> Result<Vec<PricePoint>, CoinfolioError>;

    /// Daily closes, oldest first.
    async fn daily_history(&self, coin_id: &str, days: u32)
    -> Result<Vec<PricePoint>, CoinfolioError>;
}
