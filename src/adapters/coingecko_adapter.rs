//! CoinGecko REST client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::domain::config_validation::MarketSettings;
use crate::domain::error::CoinfolioError;
use crate::domain::market::{daily_points, Coin, CoinDetail, PricePoint};
use crate::ports::market_port::{MarketDataPort, UpstreamReply, DEFAULT_UPSTREAM_ERROR};

const USER_AGENT: &str = concat!("coinfolio/", env!("CARGO_PKG_VERSION"));
const HISTORY_ATTEMPTS: u32 = 3;
const DEFAULT_RETRY_BASE: Duration = Duration::from_millis(300);

#[derive(Debug, Default, Deserialize)]
struct MarketChart {
    #[serde(default)]
    prices: Vec<[f64; 2]>,
    #[serde(default)]
    total_volumes: Vec<[f64; 2]>,
}

fn upstream(status: u16, message: impl Into<String>) -> CoinfolioError {
    CoinfolioError::Upstream {
        status,
        message: message.into(),
    }
}

/// Coin ids are slugs like `bitcoin` or `usd-coin`.
fn check_coin_id(coin_id: &str) -> Result<&str, CoinfolioError> {
    let valid = !coin_id.is_empty()
        && coin_id.len() <= 128
        && coin_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        && !coin_id.contains("..");
    if valid {
        Ok(coin_id)
    } else {
        Err(CoinfolioError::InvalidInput {
            reason: format!("invalid coin id {coin_id:?}"),
        })
    }
}

pub struct CoinGeckoAdapter {
    client: Client,
    settings: MarketSettings,
    retry_base: Duration,
}

impl CoinGeckoAdapter {
    pub fn new(settings: MarketSettings) -> Result<Self, CoinfolioError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()
            .map_err(|e| CoinfolioError::ConfigInvalid {
                section: "market".into(),
                key: "base_url".into(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            client,
            settings,
            retry_base: DEFAULT_RETRY_BASE,
        })
    }

    /// Override the first retry delay of the history fetch.
    pub fn with_retry_base(mut self, retry_base: Duration) -> Self {
        self.retry_base = retry_base;
        self
    }

    fn query_with_key(&self, query: &[(String, String)]) -> Vec<(String, String)> {
        let key_param = &self.settings.api_key_param;
        let mut params: Vec<(String, String)> = query
            .iter()
            .filter(|(k, _)| k != key_param)
            .cloned()
            .collect();
        if let Some(key) = &self.settings.api_key {
            params.push((key_param.clone(), key.clone()));
        }
        params
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> Result<T, CoinfolioError> {
        let owned: Vec<(String, String)> = query
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        let reply = self.forward(endpoint, &owned).await?;
        if !reply.is_success() {
            return Err(upstream(reply.status, reply.error_message()));
        }
        serde_json::from_value(reply.body).map_err(|e| {
            warn!(endpoint, error = %e, "unexpected upstream payload");
            upstream(502, format!("unexpected response from {endpoint}: {e}"))
        })
    }

    async fn fetch_daily(&self, coin_id: &str, days: u32) -> Result<Vec<PricePoint>, CoinfolioError> {
        let chart: MarketChart = self
            .get_json(
                &format!("/coins/{coin_id}/market_chart"),
                &[
                    ("vs_currency", "usd".to_string()),
                    ("days", days.to_string()),
                    ("interval", "daily".to_string()),
                ],
            )
            .await?;
        Ok(daily_points(&chart.prices, &chart.total_volumes))
    }
}

#[async_trait]
impl MarketDataPort for CoinGeckoAdapter {
    async fn forward(
        &self,
        endpoint: &str,
        query: &[(String, String)],
    ) -> Result<UpstreamReply, CoinfolioError> {
        let url = format!("{}{}", self.settings.base_url, endpoint);
        debug!(%url, "upstream request");

        let response = self
            .client
            .get(&url)
            .query(&self.query_with_key(query))
            .send()
            .await
            .map_err(|e| {
                warn!(%url, error = %e, "upstream request failed");
                upstream(500, DEFAULT_UPSTREAM_ERROR)
            })?;

        let status = response.status().as_u16();
        let text = response.text().await.map_err(|e| {
            warn!(%url, error = %e, "failed to read upstream body");
            upstream(500, DEFAULT_UPSTREAM_ERROR)
        })?;

        let body = match serde_json::from_str::<Value>(&text) {
            Ok(body) => body,
            Err(_) if !(200..300).contains(&status) => Value::Null,
            Err(e) => {
                warn!(%url, error = %e, "upstream returned invalid JSON");
                return Err(upstream(502, DEFAULT_UPSTREAM_ERROR));
            }
        };

        if !(200..300).contains(&status) {
            warn!(%url, status, "upstream returned an error status");
        }
        Ok(UpstreamReply { status, body })
    }

    async fn markets(&self, page: u32, per_page: u32) -> Result<Vec<Coin>, CoinfolioError> {
        self.get_json(
            "/coins/markets",
            &[
                ("vs_currency", "usd".to_string()),
                ("order", "market_cap_desc".to_string()),
                ("per_page", per_page.to_string()),
                ("page", page.to_string()),
                ("sparkline", "false".to_string()),
            ],
        )
        .await
    }

    async fn coin_detail(&self, coin_id: &str) -> Result<CoinDetail, CoinfolioError> {
        let coin_id = check_coin_id(coin_id)?;
        self.get_json(
            &format!("/coins/{coin_id}"),
            &[
                ("localization", "false".to_string()),
                ("tickers", "false".to_string()),
                ("community_data", "false".to_string()),
                ("developer_data", "false".to_string()),
            ],
        )
        .await
    }

    async fn ohlc(&self, coin_id: &str, days: u32) -> Result<Vec<PricePoint>, CoinfolioError> {
        let coin_id = check_coin_id(coin_id)?;
        let rows: Vec<Vec<f64>> = self
            .get_json(
                &format!("/coins/{coin_id}/ohlc"),
                &[
                    ("vs_currency", "usd".to_string()),
                    ("days", days.to_string()),
                ],
            )
            .await?;
        Ok(rows.iter().filter_map(|r| PricePoint::from_ohlc(r)).collect())
    }

    async fn daily_history(
        &self,
        coin_id: &str,
        days: u32,
    ) -> Result<Vec<PricePoint>, CoinfolioError> {
        let coin_id = check_coin_id(coin_id)?;
        let mut attempt = 0;
        loop {
            match self.fetch_daily(coin_id, days).await {
                Ok(points) => return Ok(points),
                Err(e) if attempt + 1 < HISTORY_ATTEMPTS => {
                    let delay = self.retry_base * 2u32.pow(attempt);
                    warn!(coin_id, attempt = attempt + 1, ?delay, error = %e, "history fetch failed, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter(api_key: Option<&str>) -> CoinGeckoAdapter {
        CoinGeckoAdapter::new(MarketSettings {
            api_key: api_key.map(String::from),
            ..MarketSettings::default()
        })
        .unwrap()
    }

    #[test]
    fn api_key_is_appended_once() {
        let query = vec![
            ("vs_currency".to_string(), "usd".to_string()),
            ("x_cg_demo_api_key".to_string(), "client-supplied".to_string()),
        ];
        let params = adapter(Some("secret")).query_with_key(&query);
        assert_eq!(
            params,
            vec![
                ("vs_currency".to_string(), "usd".to_string()),
                ("x_cg_demo_api_key".to_string(), "secret".to_string()),
            ]
        );
    }

    #[test]
    fn no_key_configured() {
        let query = vec![("page".to_string(), "1".to_string())];
        assert_eq!(adapter(None).query_with_key(&query), query);
    }

    #[test]
    fn coin_id_validation() {
        assert!(check_coin_id("usd-coin").is_ok());
        assert!(check_coin_id("").is_err());
        assert!(check_coin_id("../admin").is_err());
        assert!(check_coin_id("bitcoin?x=1").is_err());
    }
}
