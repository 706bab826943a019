//! Gate.io spot REST client (v4 API).

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::time::Duration;

use super::{ExchangeClient, RawFields, RawTicker, RequestPacer, get_json, num};
use crate::errors::{AppError, Result};
use crate::models::{ExchangeId, Instrument};

const BASE_URL: &str = "https://api.gateio.ws";
const TAKER_FEE: f64 = 0.002;

/// One entry of `/api/v4/spot/tickers`. Gate.io uses snake_case natively.
#[derive(Debug, Clone, Deserialize)]
pub struct TickerItem {
    pub currency_pair: String,
    pub last: Option<String>,
    pub highest_bid: Option<String>,
    pub lowest_ask: Option<String>,
    pub high_24h: Option<String>,
    pub low_24h: Option<String>,
    pub base_volume: Option<String>,
    pub quote_volume: Option<String>,
    /// Already a percentage, e.g. "1.75".
    pub change_percentage: Option<String>,
}

impl TickerItem {
    pub(crate) fn fields(&self) -> RawFields {
        RawFields {
            last: num(&self.last),
            bid: num(&self.highest_bid),
            ask: num(&self.lowest_ask),
            high: num(&self.high_24h),
            low: num(&self.low_24h),
            base_volume: num(&self.base_volume),
            quote_volume: num(&self.quote_volume),
            change_pct: num(&self.change_percentage),
            ..RawFields::default()
        }
    }
}

#[derive(Debug, Deserialize)]
struct CurrencyPair {
    base: String,
    quote: String,
    trade_status: String,
}

pub struct GateioClient {
    http: reqwest::Client,
    pacer: RequestPacer,
    base_url: String,
}

impl GateioClient {
    pub fn new(http: reqwest::Client, rate_limit: Duration) -> Self {
        Self {
            http,
            pacer: RequestPacer::new(rate_limit),
            base_url: BASE_URL.to_string(),
        }
    }

    fn native_symbol(instrument: &Instrument) -> String {
        format!("{}_{}", instrument.base(), instrument.quote())
    }
}

#[async_trait]
impl ExchangeClient for GateioClient {
    fn id(&self) -> ExchangeId {
        ExchangeId::Gateio
    }

    fn taker_fee_rate(&self) -> Option<f64> {
        Some(TAKER_FEE)
    }

    async fn list_instruments(&self) -> Result<HashSet<Instrument>> {
        let url = format!("{}/api/v4/spot/currency_pairs", self.base_url);
        let pairs: Vec<CurrencyPair> = get_json(&self.http, &self.pacer, &url, &[])
            .await
            .map_err(|e| AppError::MarketsUnavailable {
                exchange: self.id(),
                cause: e.to_string(),
            })?;
        Ok(pairs
            .iter()
            .filter(|p| p.trade_status == "tradable")
            .filter_map(|p| Instrument::parse(&format!("{}/{}", p.base, p.quote)).ok())
            .collect())
    }

    async fn fetch_tickers(
        &self,
        instruments: &HashSet<Instrument>,
    ) -> Result<HashMap<Instrument, RawTicker>> {
        // Full-board endpoint; keep the requested subset.
        let by_native: HashMap<String, Instrument> = instruments
            .iter()
            .map(|i| (Self::native_symbol(i), i.clone()))
            .collect();

        let url = format!("{}/api/v4/spot/tickers", self.base_url);
        let tickers: Vec<TickerItem> = get_json(&self.http, &self.pacer, &url, &[])
            .await
            .map_err(|e| AppError::TickerFetchFailed {
                exchange: self.id(),
                cause: e.to_string(),
            })?;

        Ok(tickers
            .into_iter()
            .filter_map(|t| {
                let instrument = by_native.get(&t.currency_pair)?.clone();
                Some((instrument, RawTicker::Gateio(t)))
            })
            .collect())
    }

    async fn fetch_ticker(&self, instrument: &Instrument) -> Result<RawTicker> {
        let url = format!("{}/api/v4/spot/tickers", self.base_url);
        let query = [("currency_pair", Self::native_symbol(instrument))];
        let mut tickers: Vec<TickerItem> = get_json(&self.http, &self.pacer, &url, &query)
            .await
            .map_err(|e| AppError::TickerFetchFailed {
                exchange: self.id(),
                cause: e.to_string(),
            })?;
        tickers
            .pop()
            .map(RawTicker::Gateio)
            .ok_or_else(|| AppError::TickerFetchFailed {
                exchange: self.id(),
                cause: format!("empty ticker reply for {instrument}"),
            })
    }
}
