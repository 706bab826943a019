//! KuCoin spot REST client.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::time::Duration;

use super::{ExchangeClient, RawFields, RawTicker, RequestPacer, get_json, num};
use crate::errors::{AppError, Result};
use crate::models::{ExchangeId, Instrument};

const BASE_URL: &str = "https://api.kucoin.com";
const TAKER_FEE: f64 = 0.001;

/// KuCoin wraps every reply in `{"code": "...", "data": ...}`.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

/// One entry of `/api/v1/market/allTickers` (also the `data` payload of
/// `/api/v1/market/stats`).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TickerItem {
    #[serde(default)]
    pub symbol: Option<String>,
    pub last: Option<String>,
    /// Best bid.
    pub buy: Option<String>,
    /// Best ask.
    pub sell: Option<String>,
    pub high: Option<String>,
    pub low: Option<String>,
    /// 24h base volume.
    pub vol: Option<String>,
    /// 24h quote turnover.
    pub vol_value: Option<String>,
    /// 24h change as a fraction, e.g. "0.0153".
    pub change_rate: Option<String>,
    /// KuCoin reports the taker fee on the ticker itself.
    pub taker_fee_rate: Option<String>,
}

impl TickerItem {
    pub(crate) fn fields(&self) -> RawFields {
        RawFields {
            last: num(&self.last),
            bid: num(&self.buy),
            ask: num(&self.sell),
            high: num(&self.high),
            low: num(&self.low),
            base_volume: num(&self.vol),
            quote_volume: num(&self.vol_value),
            change_pct: num(&self.change_rate).map(|r| r * 100.0),
            taker_fee_rate: num(&self.taker_fee_rate),
            ..RawFields::default()
        }
    }
}

#[derive(Debug, Deserialize)]
struct AllTickers {
    ticker: Vec<TickerItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SymbolInfo {
    symbol: String,
    base_currency: String,
    quote_currency: String,
    enable_trading: bool,
}

pub struct KucoinClient {
    http: reqwest::Client,
    pacer: RequestPacer,
    base_url: String,
}

impl KucoinClient {
    pub fn new(http: reqwest::Client, rate_limit: Duration) -> Self {
        Self {
            http,
            pacer: RequestPacer::new(rate_limit),
            base_url: BASE_URL.to_string(),
        }
    }

    fn native_symbol(instrument: &Instrument) -> String {
        format!("{}-{}", instrument.base(), instrument.quote())
    }
}

#[async_trait]
impl ExchangeClient for KucoinClient {
    fn id(&self) -> ExchangeId {
        ExchangeId::Kucoin
    }

    fn taker_fee_rate(&self) -> Option<f64> {
        Some(TAKER_FEE)
    }

    async fn list_instruments(&self) -> Result<HashSet<Instrument>> {
        let url = format!("{}/api/v2/symbols", self.base_url);
        let symbols: Envelope<Vec<SymbolInfo>> = get_json(&self.http, &self.pacer, &url, &[])
            .await
            .map_err(|e| AppError::MarketsUnavailable {
                exchange: self.id(),
                cause: e.to_string(),
            })?;
        Ok(symbols
            .data
            .iter()
            .filter(|s| s.enable_trading)
            .filter_map(|s| {
                Instrument::parse(&format!("{}/{}", s.base_currency, s.quote_currency)).ok()
            })
            .collect())
    }

    async fn fetch_tickers(
        &self,
        instruments: &HashSet<Instrument>,
    ) -> Result<HashMap<Instrument, RawTicker>> {
        // KuCoin has no filtered batch endpoint; fetch the full board and
        // keep the requested subset.
        let by_native: HashMap<String, Instrument> = instruments
            .iter()
            .map(|i| (Self::native_symbol(i), i.clone()))
            .collect();

        let url = format!("{}/api/v1/market/allTickers", self.base_url);
        let board: Envelope<AllTickers> = get_json(&self.http, &self.pacer, &url, &[])
            .await
            .map_err(|e| AppError::TickerFetchFailed {
                exchange: self.id(),
                cause: e.to_string(),
            })?;

        Ok(board
            .data
            .ticker
            .into_iter()
            .filter_map(|t| {
                let instrument = by_native.get(t.symbol.as_deref()?)?.clone();
                Some((instrument, RawTicker::Kucoin(t)))
            })
            .collect())
    }

    async fn fetch_ticker(&self, instrument: &Instrument) -> Result<RawTicker> {
        let url = format!("{}/api/v1/market/stats", self.base_url);
        let query = [("symbol", Self::native_symbol(instrument))];
        let stats: Envelope<TickerItem> = get_json(&self.http, &self.pacer, &url, &query)
            .await
            .map_err(|e| AppError::TickerFetchFailed {
                exchange: self.id(),
                cause: e.to_string(),
            })?;
        Ok(RawTicker::Kucoin(stats.data))
    }
}
