//! Bybit spot REST client (v5 market API).

use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::{HashMap, HashSet};
use std::time::Duration;

use super::{ExchangeClient, RawFields, RawTicker, RequestPacer, get_json, num};
use crate::errors::{AppError, Result};
use crate::models::{ExchangeId, Instrument};

const BASE_URL: &str = "https://api.bybit.com";
const TAKER_FEE: f64 = 0.001;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Response<T> {
    ret_code: i64,
    ret_msg: String,
    result: T,
}

#[derive(Debug, Deserialize)]
struct ResultList<T> {
    list: Vec<T>,
}

/// One entry of `/v5/market/tickers?category=spot`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TickerItem {
    pub symbol: String,
    pub last_price: Option<String>,
    #[serde(rename = "bid1Price")]
    pub bid1_price: Option<String>,
    #[serde(rename = "ask1Price")]
    pub ask1_price: Option<String>,
    /// Price 24h ago; stands in for the open of the rolling window.
    pub prev_price24h: Option<String>,
    pub high_price24h: Option<String>,
    pub low_price24h: Option<String>,
    pub volume24h: Option<String>,
    pub turnover24h: Option<String>,
    /// 24h change as a fraction.
    pub price24h_pcnt: Option<String>,
}

impl TickerItem {
    pub(crate) fn fields(&self) -> RawFields {
        RawFields {
            last: num(&self.last_price),
            bid: num(&self.bid1_price),
            ask: num(&self.ask1_price),
            open: num(&self.prev_price24h),
            high: num(&self.high_price24h),
            low: num(&self.low_price24h),
            base_volume: num(&self.volume24h),
            quote_volume: num(&self.turnover24h),
            change_pct: num(&self.price24h_pcnt).map(|r| r * 100.0),
            ..RawFields::default()
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InstrumentInfo {
    base_coin: String,
    quote_coin: String,
    status: String,
}

pub struct BybitClient {
    http: reqwest::Client,
    pacer: RequestPacer,
    base_url: String,
}

impl BybitClient {
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

    /// Paced GET that also unwraps Bybit's retCode envelope.
    async fn get_result<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> std::result::Result<T, String> {
        let url = format!("{}{}", self.base_url, path);
        let resp: Response<T> = get_json(&self.http, &self.pacer, &url, query)
            .await
            .map_err(|e| e.to_string())?;
        if resp.ret_code != 0 {
            return Err(format!("retCode {}: {}", resp.ret_code, resp.ret_msg));
        }
        Ok(resp.result)
    }
}

#[async_trait]
impl ExchangeClient for BybitClient {
    fn id(&self) -> ExchangeId {
        ExchangeId::Bybit
    }

    fn taker_fee_rate(&self) -> Option<f64> {
        Some(TAKER_FEE)
    }

    async fn list_instruments(&self) -> Result<HashSet<Instrument>> {
        let query = [
            ("category", "spot".to_string()),
            ("limit", "1000".to_string()),
        ];
        let result: ResultList<InstrumentInfo> = self
            .get_result("/v5/market/instruments-info", &query)
            .await
            .map_err(|cause| AppError::MarketsUnavailable {
                exchange: self.id(),
                cause,
            })?;
        Ok(result
            .list
            .iter()
            .filter(|i| i.status == "Trading")
            .filter_map(|i| Instrument::parse(&format!("{}/{}", i.base_coin, i.quote_coin)).ok())
            .collect())
    }

    async fn fetch_tickers(
        &self,
        instruments: &HashSet<Instrument>,
    ) -> Result<HashMap<Instrument, RawTicker>> {
        // The spot tickers endpoint has no multi-symbol filter; fetch the
        // full board and keep the requested subset.
        let by_native: HashMap<String, Instrument> = instruments
            .iter()
            .map(|i| (Self::native_symbol(i), i.clone()))
            .collect();

        let query = [("category", "spot".to_string())];
        let result: ResultList<TickerItem> = self
            .get_result("/v5/market/tickers", &query)
            .await
            .map_err(|cause| AppError::TickerFetchFailed {
                exchange: self.id(),
                cause,
            })?;

        Ok(result
            .list
            .into_iter()
            .filter_map(|t| {
                let instrument = by_native.get(&t.symbol)?.clone();
                Some((instrument, RawTicker::Bybit(t)))
            })
            .collect())
    }

    async fn fetch_ticker(&self, instrument: &Instrument) -> Result<RawTicker> {
        let query = [
            ("category", "spot".to_string()),
            ("symbol", Self::native_symbol(instrument)),
        ];
        let mut result: ResultList<TickerItem> = self
            .get_result("/v5/market/tickers", &query)
            .await
            .map_err(|cause| AppError::TickerFetchFailed {
                exchange: self.id(),
                cause,
            })?;
        result
            .list
            .pop()
            .map(RawTicker::Bybit)
            .ok_or_else(|| AppError::TickerFetchFailed {
                exchange: self.id(),
                cause: format!("empty ticker list for {instrument}"),
            })
    }
}
