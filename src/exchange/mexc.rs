//! MEXC spot REST client.
//!
//! MEXC's spot API mirrors Binance's v3 wire shapes, so the serde
//! structs are shared with the Binance adapter. Endpoint behavior
//! differs: the 24h ticker endpoint has no multi-symbol filter, so the
//! batched path fetches the full board.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::time::Duration;

use super::binance::{ExchangeInfo, Ticker24h};
use super::{ExchangeClient, RawTicker, RequestPacer, get_json};
use crate::errors::{AppError, Result};
use crate::models::{ExchangeId, Instrument};

const BASE_URL: &str = "https://api.mexc.com";
const TAKER_FEE: f64 = 0.0005;

pub struct MexcClient {
    http: reqwest::Client,
    pacer: RequestPacer,
    base_url: String,
}

impl MexcClient {
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
impl ExchangeClient for MexcClient {
    fn id(&self) -> ExchangeId {
        ExchangeId::Mexc
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

        let url = format!("{}/api/v3/ticker/24hr", self.base_url);
        let tickers: Vec<Ticker24h> = get_json(&self.http, &self.pacer, &url, &[])
            .await
            .map_err(|e| AppError::TickerFetchFailed {
                exchange: self.id(),
                cause: e.to_string(),
            })?;

        Ok(tickers
            .into_iter()
            .filter_map(|t| {
                let instrument = by_native.get(&t.symbol)?.clone();
                Some((instrument, RawTicker::Mexc(t)))
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
        Ok(RawTicker::Mexc(ticker))
    }
}
