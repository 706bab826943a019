//! Configuration loader and application settings.

use std::str::FromStr;
use std::time::Duration;

use crate::models::{ExchangeId, Instrument, parse_exchange_list, parse_instrument_list};
use crate::utils::RetryPolicy;

const DEFAULT_INSTRUMENTS: &str = "BTC/USDT,ETH/USDT,SOL/USDT";
const DEFAULT_EXCHANGES: &str = "binance,kucoin,bybit";

/// Consolidated application configuration.
///
/// Everything is read from the environment with sensible defaults; the
/// core never reads the environment directly outside of `load`.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Instruments scanned when the caller does not specify a set.
    pub instruments: Vec<Instrument>,
    /// Exchanges scanned when the caller does not specify a set.
    pub exchanges: Vec<ExchangeId>,
    /// Maximum age at which a cached ticker is served without a refetch.
    pub cache_ttl: Duration,
    /// Maximum age of a cached per-exchange market catalog.
    pub market_ttl: Duration,
    /// Batch fetch retry budget and backoff base.
    pub retry: RetryPolicy,
    /// Delay between per-instrument fallback requests.
    pub fallback_delay: Duration,
    /// Minimum interval between outgoing calls to a single exchange.
    pub rate_limit: Duration,
    /// Per-request network timeout.
    pub http_timeout: Duration,
    /// Scan loop interval.
    pub poll_interval: Duration,
    /// Ceiling on the number of opportunities returned per query.
    pub max_limit: usize,
    /// Default spread filter; `None` keeps only positive spreads.
    pub min_spread_pct: Option<f64>,
    /// Default liquidity filter (quote-currency volume floor).
    pub min_quote_volume: f64,
}

impl AppConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset or unparsable.
    pub fn load() -> Self {
        let instruments = parse_instrument_list(
            &std::env::var("INSTRUMENTS").unwrap_or_else(|_| DEFAULT_INSTRUMENTS.into()),
        );
        let exchanges = parse_exchange_list(
            &std::env::var("EXCHANGES").unwrap_or_else(|_| DEFAULT_EXCHANGES.into()),
        );
        Self {
            instruments,
            exchanges,
            cache_ttl: Duration::from_millis(env_or("CACHE_TTL_MS", 2_000)),
            market_ttl: Duration::from_secs(env_or("MARKET_TTL_SECS", 3_600)),
            retry: RetryPolicy::new(
                env_or("RETRY_MAX_ATTEMPTS", 3),
                Duration::from_millis(env_or("RETRY_BASE_DELAY_MS", 1_000)),
            ),
            fallback_delay: Duration::from_millis(env_or("FALLBACK_DELAY_MS", 100)),
            rate_limit: Duration::from_millis(env_or("RATE_LIMIT_MS", 200)),
            http_timeout: Duration::from_millis(env_or("HTTP_TIMEOUT_MS", 10_000)),
            poll_interval: Duration::from_secs(env_or("POLL_INTERVAL_SECS", 5)),
            max_limit: env_or("MAX_LIMIT", 50),
            min_spread_pct: std::env::var("MIN_SPREAD_PCT")
                .ok()
                .and_then(|v| v.parse().ok()),
            min_quote_volume: env_or("MIN_QUOTE_VOLUME", 0.0),
        }
    }
}

fn env_or<T: FromStr + Copy>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
