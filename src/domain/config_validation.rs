//! Typed, validated settings read from the config file.
//!
//! Every section is validated up front so `serve` fails before binding a
//! socket rather than on the first request.

use crate::domain::error::CoinfolioError;
use crate::ports::config_port::ConfigPort;

pub const DEFAULT_LISTEN: &str = "127.0.0.1:3000";
pub const DEFAULT_POOL_SIZE: i64 = 4;
pub const DEFAULT_SESSION_LIFETIME: i64 = 86_400;
pub const DEFAULT_MARKET_URL: &str = "https://api.coingecko.com/api/v3";
pub const DEFAULT_API_KEY_PARAM: &str = "x_cg_demo_api_key";
pub const DEFAULT_TIMEOUT_SECS: i64 = 10;
pub const DEFAULT_LOG_FILTER: &str = "info";
/// Hex length of the 64-byte session signing key.
pub const SESSION_SECRET_HEX_LEN: usize = 128;

/// `Cache-Control` policy applied to successful proxy responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CachePolicy {
    #[default]
    NoCache,
    Shared,
}

impl CachePolicy {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "no-cache" | "none" => Some(CachePolicy::NoCache),
            "shared" => Some(CachePolicy::Shared),
            _ => None,
        }
    }

    pub fn header_value(&self) -> &'static str {
        match self {
            CachePolicy::NoCache => "no-cache, no-store, must-revalidate",
            CachePolicy::Shared => "s-maxage=60, stale-while-revalidate=300",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoreSettings {
    pub path: String,
    pub pool_size: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AuthSettings {
    pub session_secret: String,
    pub session_lifetime_secs: i64,
    pub session_db: String,
    /// Only send the session cookie over HTTPS.
    pub secure_cookie: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MarketSettings {
    pub base_url: String,
    pub api_key: Option<String>,
    pub api_key_param: String,
    pub timeout_secs: u64,
}

impl Default for MarketSettings {
    fn default() -> Self {
        MarketSettings {
            base_url: DEFAULT_MARKET_URL.to_string(),
            api_key: None,
            api_key_param: DEFAULT_API_KEY_PARAM.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS as u64,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServerSettings {
    pub listen: String,
    pub store: StoreSettings,
    pub auth: AuthSettings,
    pub market: MarketSettings,
    pub cache_policy: CachePolicy,
    pub log_filter: String,
}

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> CoinfolioError {
    CoinfolioError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

fn required(config: &dyn ConfigPort, section: &str, key: &str) -> Result<String, CoinfolioError> {
    config
        .get_string(section, key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| CoinfolioError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        })
}

fn optional(config: &dyn ConfigPort, section: &str, key: &str) -> Option<String> {
    config
        .get_string(section, key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn store_settings(config: &dyn ConfigPort) -> Result<StoreSettings, CoinfolioError> {
    let path = required(config, "sqlite", "path")?;
    let pool_size = config.get_int("sqlite", "pool_size", DEFAULT_POOL_SIZE);
    if !(1..=64).contains(&pool_size) {
        return Err(invalid("sqlite", "pool_size", "pool_size must be between 1 and 64"));
    }
    Ok(StoreSettings {
        path,
        pool_size: pool_size as u32,
    })
}

pub fn auth_settings(config: &dyn ConfigPort) -> Result<AuthSettings, CoinfolioError> {
    let session_secret = required(config, "auth", "session_secret")?;
    if session_secret.len() != SESSION_SECRET_HEX_LEN
        || !session_secret.chars().all(|c| c.is_ascii_hexdigit())
    {
        return Err(invalid(
            "auth",
            "session_secret",
            format!("session_secret must be {SESSION_SECRET_HEX_LEN} hex characters"),
        ));
    }
    let session_lifetime_secs =
        config.get_int("auth", "session_lifetime", DEFAULT_SESSION_LIFETIME);
    if session_lifetime_secs <= 0 {
        return Err(invalid(
            "auth",
            "session_lifetime",
            "session_lifetime must be positive",
        ));
    }
    let session_db = optional(config, "auth", "session_db").unwrap_or_else(|| ":memory:".into());
    Ok(AuthSettings {
        session_secret,
        session_lifetime_secs,
        session_db,
        secure_cookie: config.get_bool("auth", "secure_cookie", false),
    })
}

pub fn market_settings(config: &dyn ConfigPort) -> Result<MarketSettings, CoinfolioError> {
    let base_url = optional(config, "market", "base_url")
        .unwrap_or_else(|| DEFAULT_MARKET_URL.to_string())
        .trim_end_matches('/')
        .to_string();
    if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
        return Err(invalid("market", "base_url", "base_url must be an http(s) URL"));
    }
    let timeout_secs = config.get_int("market", "timeout_secs", DEFAULT_TIMEOUT_SECS);
    if timeout_secs <= 0 {
        return Err(invalid("market", "timeout_secs", "timeout_secs must be positive"));
    }
    Ok(MarketSettings {
        base_url,
        api_key: optional(config, "market", "api_key"),
        api_key_param: optional(config, "market", "api_key_param")
            .unwrap_or_else(|| DEFAULT_API_KEY_PARAM.to_string()),
        timeout_secs: timeout_secs as u64,
    })
}

pub fn cache_policy(config: &dyn ConfigPort) -> Result<CachePolicy, CoinfolioError> {
    match optional(config, "proxy", "cache_policy") {
        None => Ok(CachePolicy::default()),
        Some(raw) => CachePolicy::parse(&raw)
            .ok_or_else(|| invalid("proxy", "cache_policy", "expected no-cache or shared")),
    }
}

pub fn server_settings(config: &dyn ConfigPort) -> Result<ServerSettings, CoinfolioError> {
    Ok(ServerSettings {
        listen: optional(config, "server", "listen").unwrap_or_else(|| DEFAULT_LISTEN.into()),
        store: store_settings(config)?,
        auth: auth_settings(config)?,
        market: market_settings(config)?,
        cache_policy: cache_policy(config)?,
        log_filter: optional(config, "log", "filter")
            .unwrap_or_else(|| DEFAULT_LOG_FILTER.into()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct MapConfig(HashMap<(String, String), String>);

    impl MapConfig {
        fn new(pairs: &[(&str, &str, &str)]) -> Self {
            MapConfig(
                pairs
                    .iter()
                    .map(|(s, k, v)| ((s.to_string(), k.to_string()), v.to_string()))
                    .collect(),
            )
        }
    }

    impl ConfigPort for MapConfig {
        fn get_string(&self, section: &str, key: &str) -> Option<String> {
            self.0.get(&(section.to_string(), key.to_string())).cloned()
        }
        fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
            self.get_string(section, key)
                .and_then(|v| v.parse().ok())
                .unwrap_or(default)
        }
        fn get_bool(&self, section: &str, key: &str, default: bool) -> bool {
            self.get_string(section, key)
                .and_then(|v| v.parse().ok())
                .unwrap_or(default)
        }
    }

    fn secret() -> String {
        "ab".repeat(64)
    }

    #[test]
    fn minimal_config_gets_defaults() {
        let s = secret();
        let config = MapConfig::new(&[("sqlite", "path", "/tmp/c.db"), ("auth", "session_secret", &s)]);
        let settings = server_settings(&config).unwrap();
        assert_eq!(settings.listen, DEFAULT_LISTEN);
        assert_eq!(settings.store.pool_size, 4);
        assert_eq!(settings.auth.session_db, ":memory:");
        assert_eq!(settings.auth.session_lifetime_secs, 86_400);
        assert!(!settings.auth.secure_cookie);
        assert_eq!(settings.market.base_url, DEFAULT_MARKET_URL);
        assert_eq!(settings.market.api_key, None);
        assert_eq!(settings.cache_policy, CachePolicy::NoCache);
        assert_eq!(settings.log_filter, "info");
    }

    #[test]
    fn secure_cookie_flag_is_read() {
        let s = secret();
        let config = MapConfig::new(&[("auth", "session_secret", &s), ("auth", "secure_cookie", "true")]);
        assert!(auth_settings(&config).unwrap().secure_cookie);
    }

    #[test]
    fn missing_store_path() {
        let config = MapConfig::new(&[]);
        assert!(matches!(
            store_settings(&config),
            Err(CoinfolioError::ConfigMissing { .. })
        ));
    }

    #[test]
    fn short_secret_is_invalid() {
        let config = MapConfig::new(&[("auth", "session_secret", "abcd")]);
        assert!(matches!(
            auth_settings(&config),
            Err(CoinfolioError::ConfigInvalid { .. })
        ));
    }

    #[test]
    fn non_hex_secret_is_invalid() {
        let s = "zz".repeat(64);
        let config = MapConfig::new(&[("auth", "session_secret", &s)]);
        assert!(auth_settings(&config).is_err());
    }

    #[test]
    fn market_url_trailing_slash_trimmed() {
        let config = MapConfig::new(&[
            ("market", "base_url", "http://localhost:9999/api/v3/"),
            ("market", "api_key", "k"),
        ]);
        let m = market_settings(&config).unwrap();
        assert_eq!(m.base_url, "http://localhost:9999/api/v3");
        assert_eq!(m.api_key.as_deref(), Some("k"));
    }

    #[test]
    fn cache_policy_values() {
        let config = MapConfig::new(&[("proxy", "cache_policy", "shared")]);
        assert_eq!(cache_policy(&config).unwrap(), CachePolicy::Shared);
        let config = MapConfig::new(&[("proxy", "cache_policy", "forever")]);
        assert!(cache_policy(&config).is_err());
        assert_eq!(
            CachePolicy::NoCache.header_value(),
            "no-cache, no-store, must-revalidate"
        );
    }

    #[test]
    fn pool_size_bounds() {
        let config = MapConfig::new(&[("sqlite", "path", "x.db"), ("sqlite", "pool_size", "0")]);
        assert!(store_settings(&config).is_err());
    }
}
