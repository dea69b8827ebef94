#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, Response},
    Router,
};
use chrono::{Duration, TimeZone, Utc};
use coinfolio::adapters::sqlite_adapter::SqliteAdapter;
use coinfolio::adapters::web::{build_router, AppState};
use coinfolio::domain::config_validation::{AuthSettings, CachePolicy};
use coinfolio::domain::error::CoinfolioError;
use coinfolio::domain::market::{Coin, CoinDetail, PricePoint};
use coinfolio::domain::user::{User, UserRole};
use coinfolio::ports::market_port::{MarketDataPort, UpstreamReply};
use coinfolio::ports::store_port::ProfileStore;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, LazyLock, Mutex};
use tempfile::TempDir;

pub const TEST_PASSWORD: &str = "testpass123";

pub const TEST_SECRET: &str = "00000000000000000000000000000001\
                               00000000000000000000000000000001\
                               00000000000000000000000000000001\
                               00000000000000000000000000000001";

pub static TEST_PASSWORD_HASH: LazyLock<String> = LazyLock::new(|| {
    use argon2::{password_hash::SaltString, Algorithm, Argon2, Params, PasswordHasher, Version};
    let salt = SaltString::from_b64("dGVzdHNhbHR0ZXN0c2FsdA").unwrap();
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, Params::default());
    argon2
        .hash_password(TEST_PASSWORD.as_bytes(), &salt)
        .unwrap()
        .to_string()
});

/// Canned market data. Every `forward` call is recorded.
#[derive(Default)]
pub struct MockMarketPort {
    pub coins: Vec<Coin>,
    pub details: HashMap<String, CoinDetail>,
    pub history: HashMap<String, Vec<PricePoint>>,
    pub replies: HashMap<String, UpstreamReply>,
    pub markets_down: bool,
    pub forwarded: Mutex<Vec<(String, Vec<(String, String)>)>>,
}

impl MockMarketPort {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_coin(mut self, id: &str, symbol: &str, name: &str, price: f64) -> Self {
        self.coins.push(coin(id, symbol, name, price, 2.5));
        self.details
            .insert(id.to_string(), coin_detail(id, symbol, name, price));
        self
    }

    pub fn with_history(mut self, id: &str, points: Vec<PricePoint>) -> Self {
        self.history.insert(id.to_string(), points);
        self
    }

    pub fn with_reply(mut self, endpoint: &str, status: u16, body: Value) -> Self {
        self.replies
            .insert(endpoint.to_string(), UpstreamReply { status, body });
        self
    }

    pub fn markets_down(mut self) -> Self {
        self.markets_down = true;
        self
    }
}

fn not_found(what: &str) -> CoinfolioError {
    CoinfolioError::Upstream {
        status: 404,
        message: format!("{what} not found"),
    }
}

#[async_trait]
impl MarketDataPort for MockMarketPort {
    async fn forward(
        &self,
        endpoint: &str,
        query: &[(String, String)],
    ) -> Result<UpstreamReply, CoinfolioError> {
        self.forwarded
            .lock()
            .unwrap()
            .push((endpoint.to_string(), query.to_vec()));
        Ok(self.replies.get(endpoint).cloned().unwrap_or(UpstreamReply {
            status: 404,
            body: json!({ "error": "coin not found" }),
        }))
    }

    async fn markets(&self, page: u32, per_page: u32) -> Result<Vec<Coin>, CoinfolioError> {
        if self.markets_down {
            return Err(CoinfolioError::Upstream {
                status: 503,
                message: "Failed to fetch data from CoinGecko API".into(),
            });
        }
        let start = ((page.max(1) - 1) * per_page) as usize;
        Ok(self
            .coins
            .iter()
            .skip(start)
            .take(per_page as usize)
            .cloned()
            .collect())
    }

    async fn coin_detail(&self, coin_id: &str) -> Result<CoinDetail, CoinfolioError> {
        self.details.get(coin_id).cloned().ok_or_else(|| not_found(coin_id))
    }

    async fn ohlc(&self, coin_id: &str, days: u32) -> Result<Vec<PricePoint>, CoinfolioError> {
        let points = self.history.get(coin_id).ok_or_else(|| not_found(coin_id))?;
        let keep = points.len().min(days as usize);
        Ok(points[points.len() - keep..]
            .iter()
            .filter_map(|p| {
                let ms = p.date.timestamp_millis() as f64;
                PricePoint::from_ohlc(&[ms, p.price, p.price * 1.01, p.price * 0.99, p.price])
            })
            .collect())
    }

    async fn daily_history(
        &self,
        coin_id: &str,
        _days: u32,
    ) -> Result<Vec<PricePoint>, CoinfolioError> {
        self.history.get(coin_id).cloned().ok_or_else(|| not_found(coin_id))
    }
}

pub fn coin(id: &str, symbol: &str, name: &str, price: f64, change_pct: f64) -> Coin {
    serde_json::from_value(json!({
        "id": id,
        "symbol": symbol,
        "name": name,
        "current_price": price,
        "price_change_24h": price * change_pct / 100.0,
        "price_change_percentage_24h": change_pct,
    }))
    .unwrap()
}

pub fn coin_detail(id: &str, symbol: &str, name: &str, price: f64) -> CoinDetail {
    serde_json::from_value(json!({
        "id": id,
        "symbol": symbol,
        "name": name,
        "description": { "en": format!("{name} is a coin.") },
        "links": { "homepage": [format!("https://{id}.example")] },
        "market_data": { "current_price": { "usd": price } },
    }))
    .unwrap()
}

/// Daily closes starting 2023-01-01.
pub fn daily_series(prices: impl IntoIterator<Item = f64>) -> Vec<PricePoint> {
    let start = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
    prices
        .into_iter()
        .enumerate()
        .map(|(i, p)| PricePoint::close_only(start + Duration::days(i as i64), p, 1000.0))
        .collect()
}

pub fn auth_settings() -> AuthSettings {
    AuthSettings {
        session_secret: TEST_SECRET.to_string(),
        session_lifetime_secs: 86400,
        session_db: ":memory:".to_string(),
        secure_cookie: false,
    }
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<SqliteAdapter>,
    pub market: Arc<MockMarketPort>,
    _dir: TempDir,
}

pub async fn test_app(market: MockMarketPort) -> TestApp {
    test_app_with_policy(market, CachePolicy::NoCache).await
}

pub async fn test_app_with_policy(market: MockMarketPort, cache_policy: CachePolicy) -> TestApp {
    test_app_with(market, cache_policy, auth_settings()).await
}

pub async fn test_app_with(
    market: MockMarketPort,
    cache_policy: CachePolicy,
    auth: AuthSettings,
) -> TestApp {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("coinfolio.db");
    let store = Arc::new(SqliteAdapter::open(db_path.to_str().unwrap(), 2).unwrap());
    store.initialize_schema().unwrap();
    let market = Arc::new(market);

    let state = AppState {
        store: store.clone(),
        market: market.clone(),
        cache_policy,
    };
    let router = build_router(state, &auth).await.unwrap();
    TestApp {
        router,
        store,
        market,
        _dir: dir,
    }
}

/// Insert an account directly, bypassing sign-up.
pub fn seed_user(store: &SqliteAdapter, email: &str, role: UserRole, balance: f64) -> User {
    let mut user = User::new(uuid::Uuid::new_v4().to_string(), email.to_string(), "Test User".into());
    user.role = role;
    user.balance = balance;
    store.create_user(&user, &TEST_PASSWORD_HASH).unwrap()
}

pub fn extract_cookies(response: &Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .collect()
}

pub fn build_cookie_header(set_cookies: &[String]) -> String {
    set_cookies
        .iter()
        .map(|sc| sc.split(';').next().unwrap_or("").to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

pub fn json_request(method: &str, uri: &str, cookie: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn get_request(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(&bytes).unwrap()
}
