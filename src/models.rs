//! Shared data structures used throughout the application.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use crate::errors::AppError;

/// A tradeable base/quote pair, stored case-normalized as `BASE/QUOTE`.
///
/// Equality is exact after normalization, so `btc/usdt` and `BTC/USDT`
/// refer to the same instrument.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Instrument(String);

impl Instrument {
    /// Parse and normalize an instrument string like `"BTC/USDT"`.
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        let normalized = raw.trim().to_uppercase();
        match normalized.split_once('/') {
            Some((base, quote)) if !base.is_empty() && !quote.is_empty() && !quote.contains('/') => {
                Ok(Self(normalized))
            }
            _ => Err(AppError::InvalidInstrument(raw.to_string())),
        }
    }

    pub fn base(&self) -> &str {
        // Normalization guarantees exactly one '/' with non-empty sides.
        self.0.split_once('/').map(|(b, _)| b).unwrap_or(&self.0)
    }

    pub fn quote(&self) -> &str {
        self.0.split_once('/').map(|(_, q)| q).unwrap_or("")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Instrument {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// The fixed set of supported exchanges.
///
/// Variants are declared in lexicographic order so the derived `Ord`
/// matches ordering by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExchangeId {
    Binance,
    Bybit,
    Gateio,
    Kucoin,
    Mexc,
    Okx,
}

impl ExchangeId {
    pub const ALL: [ExchangeId; 6] = [
        ExchangeId::Binance,
        ExchangeId::Bybit,
        ExchangeId::Gateio,
        ExchangeId::Kucoin,
        ExchangeId::Mexc,
        ExchangeId::Okx,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ExchangeId::Binance => "binance",
            ExchangeId::Bybit => "bybit",
            ExchangeId::Gateio => "gateio",
            ExchangeId::Kucoin => "kucoin",
            ExchangeId::Mexc => "mexc",
            ExchangeId::Okx => "okx",
        }
    }
}

impl fmt::Display for ExchangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExchangeId {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "binance" => Ok(ExchangeId::Binance),
            "bybit" => Ok(ExchangeId::Bybit),
            "gateio" => Ok(ExchangeId::Gateio),
            "kucoin" => Ok(ExchangeId::Kucoin),
            "mexc" => Ok(ExchangeId::Mexc),
            "okx" => Ok(ExchangeId::Okx),
            other => Err(AppError::UnknownExchange(other.to_string())),
        }
    }
}

/// Cache key: one entry per (exchange, instrument).
pub type TickerKey = (ExchangeId, Instrument);

/// Canonical per-(exchange, instrument) price snapshot.
///
/// Immutable once constructed; a new fetch produces a new value that
/// replaces the prior cache entry for the same key.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedTicker {
    pub exchange: ExchangeId,
    pub instrument: Instrument,
    pub last_price: f64,
    /// Best bid; falls back to `last_price` when the venue omits it.
    pub bid: f64,
    /// Best ask; falls back to `last_price` when the venue omits it.
    pub ask: f64,
    pub open_price: Option<f64>,
    pub high_price: Option<f64>,
    pub low_price: Option<f64>,
    pub base_volume: Option<f64>,
    /// 24h quote-currency turnover; derived as `base_volume * last_price`
    /// when the venue does not report it natively.
    pub quote_volume: Option<f64>,
    pub change_percent: Option<f64>,
    /// Taker fee as a fraction, e.g. 0.001 for 0.1%.
    pub taker_fee_rate: Option<f64>,
    pub observed_at_ms: u64,
}

impl NormalizedTicker {
    pub fn key(&self) -> TickerKey {
        (self.exchange, self.instrument.clone())
    }
}

/// Parse a comma-separated exchange list, silently dropping unknown names.
pub fn parse_exchange_list(raw: &str) -> Vec<ExchangeId> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for token in raw.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        match token.parse::<ExchangeId>() {
            Ok(ex) => {
                if seen.insert(ex) {
                    out.push(ex);
                }
            }
            Err(_) => {
                tracing::warn!(exchange = token, "[CONFIG] unknown exchange ignored");
            }
        }
    }
    out
}

/// Parse a comma-separated instrument list, silently dropping invalid entries.
pub fn parse_instrument_list(raw: &str) -> Vec<Instrument> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for token in raw.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        match Instrument::parse(token) {
            Ok(inst) => {
                if seen.insert(inst.clone()) {
                    out.push(inst);
                }
            }
            Err(_) => {
                tracing::warn!(instrument = token, "[CONFIG] invalid instrument ignored");
            }
        }
    }
    out
}
