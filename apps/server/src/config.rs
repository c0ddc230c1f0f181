use std::{net::SocketAddr, str::FromStr, time::Duration};

use anyhow::{bail, Context};
use tradedash_market_feed::{DataKind, FeedConfig};

/// Upstreams the server knows how to wire: (provider id, env prefix, kinds).
const UPSTREAMS: &[(&str, &str, &[DataKind])] = &[
    (
        "market-data",
        "TD_MARKET_DATA",
        &[DataKind::MarketData, DataKind::SectorData],
    ),
    (
        "volatility",
        "TD_VOLATILITY",
        &[DataKind::Volatility, DataKind::GammaExposure],
    ),
    ("options-flow", "TD_OPTIONS_FLOW", &[DataKind::OptionsFlow]),
];

/// One configured upstream provider.
#[derive(Clone, Debug)]
pub struct UpstreamConfig {
    pub id: &'static str,
    pub base_url: String,
    pub api_key: Option<String>,
    pub kinds: &'static [DataKind],
}

#[derive(Clone, Debug)]
pub struct Config {
    pub listen_addr: SocketAddr,
    pub cors_allow: Vec<String>,
    pub request_timeout: Duration,
    pub feed: FeedConfig,
    pub upstreams: Vec<UpstreamConfig>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let listen_addr: SocketAddr = std::env::var("TD_LISTEN_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:8080".to_string())
            .parse()
            .context("Invalid TD_LISTEN_ADDR")?;
        let cors_allow = std::env::var("TD_CORS_ALLOW_ORIGINS")
            .unwrap_or_else(|_| "*".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        let timeout_ms: u64 = env_or("TD_REQUEST_TIMEOUT_MS", 30_000)?;

        let defaults = FeedConfig::default();
        let feed = FeedConfig {
            retry_attempts: env_or("TD_RETRY_ATTEMPTS", defaults.retry_attempts)?,
            retry_delay: env_ms("TD_RETRY_DELAY_MS", defaults.retry_delay)?,
            timeout: env_ms("TD_TIMEOUT_MS", defaults.timeout)?,
            fallback_enabled: env_bool("TD_FALLBACK_ENABLED", defaults.fallback_enabled)?,
            circuit_breaker_threshold: env_or(
                "TD_CB_THRESHOLD",
                defaults.circuit_breaker_threshold,
            )?,
            circuit_breaker_cooldown: env_ms(
                "TD_CB_COOLDOWN_MS",
                defaults.circuit_breaker_cooldown,
            )?,
            stale_cache_ttl: match std::env::var("TD_STALE_CACHE_TTL_MS") {
                Ok(raw) => Some(Duration::from_millis(
                    parse("TD_STALE_CACHE_TTL_MS", &raw)?,
                )),
                Err(_) => defaults.stale_cache_ttl,
            },
        };

        let upstreams = UPSTREAMS
            .iter()
            .filter_map(|(id, prefix, kinds)| {
                let base_url = std::env::var(format!("{}_URL", prefix)).ok()?;
                Some(UpstreamConfig {
                    id: *id,
                    base_url,
                    api_key: std::env::var(format!("{}_API_KEY", prefix)).ok(),
                    kinds: *kinds,
                })
            })
            .collect();

        Ok(Self {
            listen_addr,
            cors_allow,
            request_timeout: Duration::from_millis(timeout_ms),
            feed,
            upstreams,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            cors_allow: vec!["*".to_string()],
            request_timeout: Duration::from_secs(30),
            feed: FeedConfig::default(),
            upstreams: Vec::new(),
        }
    }
}

fn parse<T: FromStr>(key: &str, raw: &str) -> anyhow::Result<T>
where
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid {}: {}", key, e))
}

fn env_or<T: FromStr>(key: &str, default: T) -> anyhow::Result<T>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => parse(key, &raw),
        Err(_) => Ok(default),
    }
}

fn env_ms(key: &str, default: Duration) -> anyhow::Result<Duration> {
    env_or(key, default.as_millis() as u64).map(Duration::from_millis)
}

fn env_bool(key: &str, default: bool) -> anyhow::Result<bool> {
    let Ok(raw) = std::env::var(key) else {
        return Ok(default);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("Invalid {}: expected a boolean, got '{}'", key, other),
    }
}
