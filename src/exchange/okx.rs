//! OKX spot REST client (v5 market API).

use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::{HashMap, HashSet};
use std::time::Duration;

use super::{ExchangeClient, RawFields, RawTicker, RequestPacer, get_json, num};
use crate::errors::{AppError, Result};
use crate::models::{ExchangeId, Instrument};

const BASE_URL: &str = "https://www.okx.com";
const TAKER_FEE: f64 = 0.001;

#[derive(Debug, Deserialize)]
struct Response<T> {
    code: String,
    #[serde(default)]
    msg: String,
    data: Vec<T>,
}

/// One entry of `/api/v5/market/tickers?instType=SPOT`.
#[derive(Debug, Clone, Deserialize)]
pub struct TickerItem {
    #[serde(rename = "instId")]
    pub inst_id: String,
    pub last: Option<String>,
    #[serde(rename = "bidPx")]
    pub bid_px: Option<String>,
    #[serde(rename = "askPx")]
    pub ask_px: Option<String>,
    #[serde(rename = "open24h")]
    pub open_24h: Option<String>,
    #[serde(rename = "high24h")]
    pub high_24h: Option<String>,
    #[serde(rename = "low24h")]
    pub low_24h: Option<String>,
    /// 24h base volume.
    #[serde(rename = "vol24h")]
    pub vol_24h: Option<String>,
    /// 24h quote-currency volume (for spot).
    #[serde(rename = "volCcy24h")]
    pub vol_ccy_24h: Option<String>,
}

impl TickerItem {
    pub(crate) fn fields(&self) -> RawFields {
        RawFields {
            last: num(&self.last),
            bid: num(&self.bid_px),
            ask: num(&self.ask_px),
            open: num(&self.open_24h),
            high: num(&self.high_24h),
            low: num(&self.low_24h),
            base_volume: num(&self.vol_24h),
            quote_volume: num(&self.vol_ccy_24h),
            ..RawFields::default()
        }
    }
}

#[derive(Debug, Deserialize)]
struct InstrumentInfo {
    #[serde(rename = "baseCcy")]
    base_ccy: String,
    #[serde(rename = "quoteCcy")]
    quote_ccy: String,
    state: String,
}

pub struct OkxClient {
    http: reqwest::Client,
    pacer: RequestPacer,
    base_url: String,
}

impl OkxClient {
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

    async fn get_data<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> std::result::Result<Vec<T>, String> {
        let url = format!("{}{}", self.base_url, path);
        let resp: Response<T> = get_json(&self.http, &self.pacer, &url, query)
            .await
            .map_err(|e| e.to_string())?;
        if resp.code != "0" {
            return Err(format!("code {}: {}", resp.code, resp.msg));
        }
        Ok(resp.data)
    }
}

#[async_trait]
impl ExchangeClient for OkxClient {
    fn id(&self) -> ExchangeId {
        ExchangeId::Okx
    }

    fn taker_fee_rate(&self) -> Option<f64> {
        Some(TAKER_FEE)
    }

    async fn list_instruments(&self) -> Result<HashSet<Instrument>> {
        let query = [("instType", "SPOT".to_string())];
        let instruments: Vec<InstrumentInfo> = self
            .get_data("/api/v5/public/instruments", &query)
            .await
            .map_err(|cause| AppError::MarketsUnavailable {
                exchange: self.id(),
                cause,
            })?;
        Ok(instruments
            .iter()
            .filter(|i| i.state == "live")
            .filter_map(|i| Instrument::parse(&format!("{}/{}", i.base_ccy, i.quote_ccy)).ok())
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

        let query = [("instType", "SPOT".to_string())];
        let tickers: Vec<TickerItem> = self
            .get_data("/api/v5/market/tickers", &query)
            .await
            .map_err(|cause| AppError::TickerFetchFailed {
                exchange: self.id(),
                cause,
            })?;

        Ok(tickers
            .into_iter()
            .filter_map(|t| {
                let instrument = by_native.get(&t.inst_id)?.clone();
                Some((instrument, RawTicker::Okx(t)))
            })
            .collect())
    }

    async fn fetch_ticker(&self, instrument: &Instrument) -> Result<RawTicker> {
        let query = [("instId", Self::native_symbol(instrument))];
        let mut tickers: Vec<TickerItem> = self
            .get_data("/api/v5/market/ticker", &query)
            .await
            .map_err(|cause| AppError::TickerFetchFailed {
                exchange: self.id(),
                cause,
            })?;
        tickers
            .pop()
            .map(RawTicker::Okx)
            .ok_or_else(|| AppError::TickerFetchFailed {
                exchange: self.id(),
                cause: format!("empty ticker data for {instrument}"),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_tickers_shape() {
        let raw = r#"{
            "code": "0",
            "msg": "",
            "data": [{
                "instType": "SPOT",
                "instId": "BTC-USDT",
                "last": "64100.5",
                "bidPx": "64100.1",
                "askPx": "64100.9",
                "open24h": "63000",
                "high24h": "64800",
                "low24h": "62900",
                "vol24h": "1234.5",
                "volCcy24h": "79000000.2",
                "ts": "1700000000000"
            }]
        }"#;
        let resp: Response<TickerItem> = serde_json::from_str(raw).expect("json should parse");
        assert_eq!(resp.code, "0");
        let fields = resp.data[0].fields();
        assert_eq!(fields.last, Some(64_100.5));
        assert_eq!(fields.bid, Some(64_100.1));
        assert_eq!(fields.base_volume, Some(1_234.5));
    }

    #[test]
    fn parse_instruments_filters_state() {
        let raw = r#"{
            "code": "0",
            "data": [
                {"instId": "BTC-USDT", "baseCcy": "BTC", "quoteCcy": "USDT", "state": "live"},
                {"instId": "OLD-USDT", "baseCcy": "OLD", "quoteCcy": "USDT", "state": "suspend"}
            ]
        }"#;
        let resp: Response<InstrumentInfo> = serde_json::from_str(raw).expect("json should parse");
        let live: Vec<_> = resp.data.iter().filter(|i| i.state == "live").collect();
        assert_eq!(live.len(), 1);
    }
}
