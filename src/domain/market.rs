//! Read-only projections of upstream market-data responses.
//!
//! Upstream payloads are loose: numeric fields are frequently `null` for
//! thinly traded coins, so everything beyond identity is optional.

use std::collections::HashMap;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// One row of the `/coins/markets` listing.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Coin {
    pub id: String,
    pub symbol: String,
    pub name: String,
    pub image: Option<String>,
    pub current_price: Option<f64>,
    pub market_cap: Option<f64>,
    pub market_cap_rank: Option<u32>,
    pub total_volume: Option<f64>,
    pub high_24h: Option<f64>,
    pub low_24h: Option<f64>,
    pub price_change_24h: Option<f64>,
    pub price_change_percentage_24h: Option<f64>,
    pub circulating_supply: Option<f64>,
    pub total_supply: Option<f64>,
    pub max_supply: Option<f64>,
    pub ath: Option<f64>,
    pub atl: Option<f64>,
    pub last_updated: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CoinDescription {
    pub en: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CoinLinks {
    pub homepage: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CoinMarketData {
    pub current_price: HashMap<String, f64>,
    pub price_change_percentage_24h: Option<f64>,
    pub total_supply: Option<f64>,
    pub max_supply: Option<f64>,
    pub circulating_supply: Option<f64>,
}

/// `/coins/{id}` response, trimmed to the fields the API exposes.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CoinDetail {
    pub id: String,
    pub symbol: String,
    pub name: String,
    pub description: CoinDescription,
    pub links: CoinLinks,
    pub market_data: CoinMarketData,
}

impl CoinDetail {
    pub fn usd_price(&self) -> Option<f64> {
        self.market_data
            .current_price
            .get("usd")
            .copied()
            .filter(|p| p.is_finite() && *p > 0.0)
    }

    /// First non-empty homepage link.
    pub fn homepage(&self) -> Option<&str> {
        self.links
            .homepage
            .iter()
            .map(|s| s.as_str())
            .find(|s| !s.trim().is_empty())
    }
}

/// A dated price sample, oldest first when in a series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: DateTime<Utc>,
    pub price: f64,
    pub volume: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub open: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub high: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub low: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub close: Option<f64>,
}

impl PricePoint {
    pub fn close_only(date: DateTime<Utc>, price: f64, volume: f64) -> Self {
        PricePoint {
            date,
            price,
            volume,
            open: None,
            high: None,
            low: None,
            close: None,
        }
    }

    /// Convert one `/ohlc` entry (`[ms, open, high, low, close]`). Entries
    /// with fewer than five numbers or a bad timestamp yield `None`.
    pub fn from_ohlc(entry: &[f64]) -> Option<Self> {
        let [ms, open, high, low, close] = entry.get(..5)?.try_into().ok()?;
        let date = Utc.timestamp_millis_opt(ms as i64).single()?;
        Some(PricePoint {
            date,
            price: close,
            volume: 0.0,
            open: Some(open),
            high: Some(high),
            low: Some(low),
            close: Some(close),
        })
    }
}

/// Pair `market_chart` price and volume samples (`[ms, value]`) by position.
pub fn daily_points(prices: &[[f64; 2]], volumes: &[[f64; 2]]) -> Vec<PricePoint> {
    prices
        .iter()
        .enumerate()
        .filter_map(|(i, [ms, price])| {
            let date = Utc.timestamp_millis_opt(*ms as i64).single()?;
            let volume = volumes.get(i).map(|v| v[1]).unwrap_or(0.0);
            Some(PricePoint::close_only(date, *price, volume))
        })
        .collect()
}
