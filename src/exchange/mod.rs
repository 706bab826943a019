//! Exchange REST adapters.
//!
//! One `ExchangeClient` per venue presents the same capability surface
//! (market catalog + ticker fetch) over each venue's public spot API.
//! Adapters only fetch and parse; normalization of the per-venue wire
//! shapes into [`NormalizedTicker`] happens in [`normalize`], and retry
//! policy lives in the orchestrator, never here.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::errors::Result;
use crate::models::{ExchangeId, Instrument, NormalizedTicker};

pub mod binance;
pub mod bybit;
pub mod gateio;
pub mod kucoin;
pub mod mexc;
pub mod okx;

/// Uniform capability surface over one exchange.
#[async_trait]
pub trait ExchangeClient: Send + Sync {
    fn id(&self) -> ExchangeId;

    /// Venue's documented spot taker fee, as a fraction. Public ticker
    /// endpoints carry no fee data, so this is a static per-venue value.
    fn taker_fee_rate(&self) -> Option<f64>;

    /// The venue's spot market catalog. Fails with `MarketsUnavailable`;
    /// callers degrade to an empty supported set rather than aborting.
    async fn list_instruments(&self) -> Result<HashSet<Instrument>>;

    /// One batched ticker call for a non-empty, pre-filtered instrument
    /// set. The venue may silently omit instruments it is not quoting.
    /// Fails with `TickerFetchFailed`; never retries internally.
    async fn fetch_tickers(
        &self,
        instruments: &HashSet<Instrument>,
    ) -> Result<HashMap<Instrument, RawTicker>>;

    /// Single-instrument fallback call.
    async fn fetch_ticker(&self, instrument: &Instrument) -> Result<RawTicker>;
}

/// A venue's native ticker reply, kept in its wire shape until
/// normalization. Stringly-typed fields never leak past this boundary.
#[derive(Debug, Clone)]
pub enum RawTicker {
    Binance(binance::Ticker24h),
    Bybit(bybit::TickerItem),
    Gateio(gateio::TickerItem),
    Kucoin(kucoin::TickerItem),
    Mexc(binance::Ticker24h),
    Okx(okx::TickerItem),
}

impl RawTicker {
    fn fields(&self) -> RawFields {
        match self {
            RawTicker::Binance(t) | RawTicker::Mexc(t) => t.fields(),
            RawTicker::Bybit(t) => t.fields(),
            RawTicker::Gateio(t) => t.fields(),
            RawTicker::Kucoin(t) => t.fields(),
            RawTicker::Okx(t) => t.fields(),
        }
    }
}

/// Venue-independent view of a raw ticker's numeric content.
#[derive(Debug, Default, Clone)]
pub(crate) struct RawFields {
    pub last: Option<f64>,
    pub bid: Option<f64>,
    pub ask: Option<f64>,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub base_volume: Option<f64>,
    pub quote_volume: Option<f64>,
    pub change_pct: Option<f64>,
    /// Per-ticker fee when the venue reports one (KuCoin does).
    pub taker_fee_rate: Option<f64>,
}

/// Parse an optional stringly numeric field.
pub(crate) fn num(value: &Option<String>) -> Option<f64> {
    value
        .as_deref()
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

/// Map a raw ticker to the canonical snapshot.
///
/// Tickers without a usable last price are discarded. Missing best
/// bid/ask fall back to the last price, and quote volume is derived from
/// base volume when the venue does not report it natively.
pub fn normalize(
    raw: &RawTicker,
    exchange: ExchangeId,
    instrument: &Instrument,
    default_taker_fee: Option<f64>,
    observed_at_ms: u64,
) -> Option<NormalizedTicker> {
    let f = raw.fields();
    let last = f.last.filter(|v| *v > 0.0)?;
    let bid = f.bid.filter(|v| *v > 0.0).unwrap_or(last);
    let ask = f.ask.filter(|v| *v > 0.0).unwrap_or(last);
    let quote_volume = f.quote_volume.or_else(|| f.base_volume.map(|b| b * last));
    let change_percent = f
        .change_pct
        .or_else(|| f.open.filter(|o| *o > 0.0).map(|o| (last - o) / o * 100.0));
    Some(NormalizedTicker {
        exchange,
        instrument: instrument.clone(),
        last_price: last,
        bid,
        ask,
        open_price: f.open,
        high_price: f.high,
        low_price: f.low,
        base_volume: f.base_volume,
        quote_volume,
        change_percent,
        taker_fee_rate: f.taker_fee_rate.or(default_taker_fee),
        observed_at_ms,
    })
}

/// Paces outgoing calls to one venue's documented request-rate ceiling.
#[derive(Debug)]
pub struct RequestPacer {
    min_interval: Duration,
    last: Mutex<Option<Instant>>,
}

impl RequestPacer {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last: Mutex::new(None),
        }
    }

    /// Wait until the venue's minimum inter-request interval has passed.
    pub async fn pace(&self) {
        let mut last = self.last.lock().await;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.min_interval {
                tokio::time::sleep(self.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

/// Paced GET returning a JSON-decoded body.
pub(crate) async fn get_json<T: DeserializeOwned>(
    http: &reqwest::Client,
    pacer: &RequestPacer,
    url: &str,
    query: &[(&str, String)],
) -> std::result::Result<T, reqwest::Error> {
    pacer.pace().await;
    http.get(url)
        .query(query)
        .send()
        .await?
        .error_for_status()?
        .json::<T>()
        .await
}

/// Construct the adapter for one exchange.
pub fn make_client(
    exchange: ExchangeId,
    http: reqwest::Client,
    rate_limit: Duration,
) -> Arc<dyn ExchangeClient> {
    match exchange {
        ExchangeId::Binance => Arc::new(binance::BinanceClient::new(http, rate_limit)),
        ExchangeId::Bybit => Arc::new(bybit::BybitClient::new(http, rate_limit)),
        ExchangeId::Gateio => Arc::new(gateio::GateioClient::new(http, rate_limit)),
        ExchangeId::Kucoin => Arc::new(kucoin::KucoinClient::new(http, rate_limit)),
        ExchangeId::Mexc => Arc::new(mexc::MexcClient::new(http, rate_limit)),
        ExchangeId::Okx => Arc::new(okx::OkxClient::new(http, rate_limit)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(last: Option<&str>, bid: Option<&str>, ask: Option<&str>) -> RawTicker {
        RawTicker::Binance(binance::Ticker24h {
            symbol: "BTCUSDT".into(),
            last_price: last.map(String::from),
            bid_price: bid.map(String::from),
            ask_price: ask.map(String::from),
            open_price: None,
            high_price: None,
            low_price: None,
            volume: None,
            quote_volume: None,
        })
    }

    fn btc() -> Instrument {
        Instrument::parse("BTC/USDT").unwrap()
    }

    #[test]
    fn normalize_discards_missing_last_price() {
        let ticker = raw(None, Some("100"), Some("101"));
        assert!(normalize(&ticker, ExchangeId::Binance, &btc(), None, 0).is_none());
        let ticker = raw(Some("0"), None, None);
        assert!(normalize(&ticker, ExchangeId::Binance, &btc(), None, 0).is_none());
    }

    #[test]
    fn normalize_defaults_bid_ask_to_last() {
        let ticker = raw(Some("100.5"), None, None);
        let norm = normalize(&ticker, ExchangeId::Binance, &btc(), None, 42).unwrap();
        assert_eq!(norm.last_price, 100.5);
        assert_eq!(norm.bid, 100.5);
        assert_eq!(norm.ask, 100.5);
        assert_eq!(norm.observed_at_ms, 42);
    }

    #[test]
    fn normalize_derives_quote_volume_from_base() {
        let ticker = RawTicker::Binance(binance::Ticker24h {
            symbol: "BTCUSDT".into(),
            last_price: Some("100".into()),
            bid_price: None,
            ask_price: None,
            open_price: Some("80".into()),
            high_price: None,
            low_price: None,
            volume: Some("10".into()),
            quote_volume: None,
        });
        let norm = normalize(&ticker, ExchangeId::Binance, &btc(), Some(0.001), 0).unwrap();
        assert_eq!(norm.quote_volume, Some(1_000.0));
        assert_eq!(norm.taker_fee_rate, Some(0.001));
        let change = norm.change_percent.unwrap();
        assert!((change - 25.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn pacer_spaces_consecutive_calls() {
        let pacer = RequestPacer::new(Duration::from_millis(30));
        let start = Instant::now();
        pacer.pace().await;
        pacer.pace().await;
        assert!(start.elapsed() >= Duration::from_millis(30));
    }
}
