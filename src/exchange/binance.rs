//! Binance spot REST client.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::time::Duration;

use super::{ExchangeClient, RawFields, RawTicker, RequestPacer, get_json, num};
use crate::errors::{AppError, Result};
use crate::models::{ExchangeId, Instrument};

const BASE_URL: &str = "https://api.binance.com";
const TAKER_FEE: f64 = 0.001;

/// Binance 24h ticker statistics, as returned by `/api/v3/ticker/24hr`.
/// All numeric fields arrive as strings.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticker24h {
    pub symbol: String,
    pub last_price: Option<String>,
    pub bid_price: Option<String>,
    pub ask_price: Option<String>,
    pub open_price: Option<String>,
    pub high_price: Option<String>,
    pub low_price: Option<String>,
    /// 24h base-asset volume.
    pub volume: Option<String>,
    pub quote_volume: Option<String>,
}

impl Ticker24h {
    pub(crate) fn fields(&self) -> RawFields {
        RawFields {
            last: num(&self.last_price),
            bid: num(&self.bid_price),
            ask: num(&self.ask_price),
            open: num(&self.open_price),
            high: num(&self.high_price),
            low: num(&self.low_price),
            base_volume: num(&self.volume),
            quote_volume: num(&self.quote_volume),
            ..RawFields::default()
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ExchangeInfo {
    pub symbols: Vec<SymbolInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SymbolInfo {
    pub symbol: String,
    pub status: String,
    pub base_asset: String,
    pub quote_asset: String,
}

impl SymbolInfo {
    /// Binance reports `TRADING`; MEXC's mirror of this endpoint has used
    /// `ENABLED` and `1` for the same state.
    pub(crate) fn is_trading(&self) -> bool {
        matches!(self.status.as_str(), "TRADING" | "ENABLED" | "1")
    }
}

pub struct BinanceClient {
    http: reqwest::Client,
    pacer: RequestPacer,
    base_url: String,
}

impl BinanceClient {
    pub fn new(http: reqwest::Client, rate_limit: Duration) -> Self {
        Self {
            http,
            pacer: RequestPacer::new(rate_limit),
            base_url: BASE_URL.to_string(),
        }
    }

    fn native_symbol(instrument: &Instrument) -> String {
        format!("{}{}", instrument.base(), instrument.quote())
    }
}

#[async_trait]
impl ExchangeClient for BinanceClient {
    fn id(&self) -> ExchangeId {
        ExchangeId::Binance
    }

    fn taker_fee_rate(&self) -> Option<f64> {
        Some(TAKER_FEE)
    }

    async fn list_instruments(&self) -> Result<HashSet<Instrument>> {
        let url = format!("{}/api/v3/exchangeInfo", self.base_url);
        let info: ExchangeInfo = get_json(&self.http, &self.pacer, &url, &[])
            .await
            .map_err(|e| AppError::MarketsUnavailable {
                exchange: self.id(),
                cause: e.to_string(),
            })?;
        Ok(info
            .symbols
            .iter()
            .filter(|s| s.is_trading())
            .filter_map(|s| Instrument::parse(&format!("{}/{}", s.base_asset, s.quote_asset)).ok())
            .collect())
    }

    async fn fetch_tickers(
        &self,
        instruments: &HashSet<Instrument>,
    ) -> Result<HashMap<Instrument, RawTicker>> {
        let by_native: HashMap<String, Instrument> = instruments
            .iter()
            .map(|i| (Self::native_symbol(i), i.clone()))
            .collect();
        let symbols: Vec<&String> = by_native.keys().collect();
        let symbols_param = serde_json::to_string(&symbols)?;

        let url = format!("{}/api/v3/ticker/24hr", self.base_url);
        let tickers: Vec<Ticker24h> =
            get_json(&self.http, &self.pacer, &url, &[("symbols", symbols_param)])
                .await
                .map_err(|e| AppError::TickerFetchFailed {
                    exchange: self.id(),
                    cause: e.to_string(),
                })?;

        Ok(tickers
            .into_iter()
            .filter_map(|t| {
                let instrument = by_native.get(&t.symbol)?.clone();
                Some((instrument, RawTicker::Binance(t)))
            })
            .collect())
    }

    async fn fetch_ticker(&self, instrument: &Instrument) -> Result<RawTicker> {
        let url = format!("{}/api/v3/ticker/24hr", self.base_url);
        let query = [("symbol", Self::native_symbol(instrument))];
        let ticker: Ticker24h = get_json(&self.http, &self.pacer, &url, &query)
            .await
            .map_err(|e| AppError::TickerFetchFailed {
                exchange: self.id(),
                cause: e.to_string(),
            })?;
        Ok(RawTicker::Binance(ticker))
    }
}
