//! Fetch orchestration: keeps the ticker cache fresh across exchanges.
//!
//! One logical task per exchange; tasks share no mutable state except
//! the cache, whose per-key last-write-wins writes need no cross-exchange
//! locking. Per-exchange failures are absorbed here and reported as soft
//! outcomes; only the everything-failed case escalates.

use dashmap::DashMap;
use futures::future::join_all;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::cache::{MarketCache, TickerCache};
use crate::errors::{AppError, Result};
use crate::exchange::{ExchangeClient, normalize};
use crate::models::{ExchangeId, Instrument};
use crate::utils::{RetryPolicy, now_millis, with_retry};

/// Per-exchange result of one `ensure_fresh` cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchOutcome {
    /// Every requested, supported instrument is covered by fresh data
    /// (or there was nothing to fetch).
    Ok,
    /// Some instruments were refreshed, some were not.
    Partial,
    /// No data could be obtained; stale cache entries are retained.
    Failed,
}

pub struct FetchOrchestrator {
    clients: HashMap<ExchangeId, Arc<dyn ExchangeClient>>,
    cache: Arc<TickerCache>,
    markets: MarketCache,
    retry: RetryPolicy,
    fallback_delay: Duration,
    /// Single-flight gates: at most one in-flight refresh per exchange,
    /// whether triggered by the poll loop or an on-demand query.
    inflight: DashMap<ExchangeId, Arc<Mutex<()>>>,
}

impl FetchOrchestrator {
    pub fn new(
        clients: HashMap<ExchangeId, Arc<dyn ExchangeClient>>,
        cache: Arc<TickerCache>,
        market_ttl: Duration,
        retry: RetryPolicy,
        fallback_delay: Duration,
    ) -> Self {
        Self {
            clients,
            cache,
            markets: MarketCache::new(market_ttl),
            retry,
            fallback_delay,
            inflight: DashMap::new(),
        }
    }

    /// Bring cached tickers for the requested (exchange, instrument)
    /// pairs within `ttl`, tolerating partial exchange outages.
    ///
    /// Fails only with `AllSourcesUnavailable`, when every requested
    /// exchange failed outright.
    pub async fn ensure_fresh(
        &self,
        exchanges: &[ExchangeId],
        instruments: &HashSet<Instrument>,
        ttl: Duration,
    ) -> Result<HashMap<ExchangeId, FetchOutcome>> {
        let targets: Vec<ExchangeId> = exchanges
            .iter()
            .copied()
            .filter(|e| self.clients.contains_key(e))
            .collect();

        let tasks = targets
            .iter()
            .map(|&exchange| self.refresh_exchange(exchange, instruments, ttl));
        let outcomes = join_all(tasks).await;

        let report: HashMap<ExchangeId, FetchOutcome> =
            targets.into_iter().zip(outcomes).collect();
        if !report.is_empty() && report.values().all(|o| *o == FetchOutcome::Failed) {
            return Err(AppError::AllSourcesUnavailable);
        }
        Ok(report)
    }

    async fn refresh_exchange(
        &self,
        exchange: ExchangeId,
        instruments: &HashSet<Instrument>,
        ttl: Duration,
    ) -> FetchOutcome {
        let Some(client) = self.clients.get(&exchange) else {
            return FetchOutcome::Failed;
        };

        let gate = self
            .inflight
            .entry(exchange)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = gate.lock().await;

        let supported = self
            .supported_instruments(client.as_ref(), exchange, instruments)
            .await;
        if supported.is_empty() {
            return FetchOutcome::Ok;
        }

        // Re-checked after acquiring the gate: a coalesced trigger that
        // waited on another refresh usually finds everything fresh here.
        let now = now_millis();
        if supported
            .iter()
            .all(|i| self.cache.is_fresh_at(exchange, i, ttl, now))
        {
            debug!(%exchange, "[FETCH] all requested tickers fresh, skipping");
            return FetchOutcome::Ok;
        }

        let fee = client.taker_fee_rate();
        match with_retry(self.retry, || client.fetch_tickers(&supported)).await {
            Ok(raw_tickers) => {
                let mut written = 0usize;
                for (instrument, raw) in &raw_tickers {
                    if let Some(ticker) = normalize(raw, exchange, instrument, fee, now_millis()) {
                        self.cache.put(ticker);
                        written += 1;
                    }
                }
                debug!(%exchange, written, requested = supported.len(), "[FETCH] batch refresh done");
                // The venue may silently omit instruments it is not
                // quoting, and normalization drops tickers without a
                // usable last price.
                if written < supported.len() {
                    FetchOutcome::Partial
                } else {
                    FetchOutcome::Ok
                }
            }
            Err(e) => {
                warn!(%exchange, error = %e, "[FETCH] batch fetch exhausted retries, trying per-instrument fallback");
                self.fallback_refresh(client.as_ref(), exchange, &supported, fee)
                    .await
            }
        }
    }

    /// Sequential per-instrument fallback with a small inter-request
    /// delay. One bad instrument never blocks the others; cancelling the
    /// exchange task abandons the loop at the next await.
    async fn fallback_refresh(
        &self,
        client: &dyn ExchangeClient,
        exchange: ExchangeId,
        supported: &HashSet<Instrument>,
        fee: Option<f64>,
    ) -> FetchOutcome {
        let mut ordered: Vec<&Instrument> = supported.iter().collect();
        ordered.sort();
        let total = ordered.len();
        let mut written = 0usize;

        for (idx, instrument) in ordered.iter().enumerate() {
            match client.fetch_ticker(instrument).await {
                Ok(raw) => {
                    if let Some(ticker) = normalize(&raw, exchange, instrument, fee, now_millis())
                    {
                        self.cache.put(ticker);
                        written += 1;
                    }
                }
                Err(e) => {
                    warn!(%exchange, %instrument, error = %e, "[FETCH] fallback fetch failed, skipping");
                }
            }
            if idx + 1 < total {
                tokio::time::sleep(self.fallback_delay).await;
            }
        }

        if written == 0 {
            FetchOutcome::Failed
        } else if written < total {
            FetchOutcome::Partial
        } else {
            FetchOutcome::Ok
        }
    }

    /// Requested instruments actually listed on the exchange, via the
    /// long-TTL market catalog. Catalog failure degrades the exchange to
    /// an empty supported set for this cycle.
    async fn supported_instruments(
        &self,
        client: &dyn ExchangeClient,
        exchange: ExchangeId,
        requested: &HashSet<Instrument>,
    ) -> HashSet<Instrument> {
        let catalog = match self.markets.get(exchange) {
            Some(catalog) => catalog,
            None => match client.list_instruments().await {
                Ok(catalog) => {
                    debug!(%exchange, markets = catalog.len(), "[FETCH] market catalog loaded");
                    self.markets.put(exchange, catalog.clone());
                    catalog
                }
                Err(e) => {
                    warn!(%exchange, error = %e, "[FETCH] market catalog unavailable, treating as zero supported instruments");
                    return HashSet::new();
                }
            },
        };
        requested.intersection(&catalog).cloned().collect()
    }
}
