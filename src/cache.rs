//! In-process stores for normalized tickers and market catalogs.
//!
//! Both stores are injectable (`Arc`-shared) rather than process globals,
//! so the orchestrator and the opportunity engine can be tested against
//! isolated instances with controlled timestamps.

use dashmap::DashMap;
use std::collections::{HashMap, HashSet};
use std::time::Duration;

use crate::models::{ExchangeId, Instrument, NormalizedTicker, TickerKey};
use crate::utils::now_millis;

/// Bounded-staleness store of the latest ticker per (exchange, instrument).
///
/// Writes are unconditional last-write-wins overwrites; freshness is
/// judged by callers against the TTL they care about. Entries are never
/// evicted on fetch failure; stale data beats no data, and consumers can
/// see the age through `observed_at_ms`.
#[derive(Debug, Default)]
pub struct TickerCache {
    inner: DashMap<TickerKey, NormalizedTicker>,
}

impl TickerCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, exchange: ExchangeId, instrument: &Instrument) -> Option<NormalizedTicker> {
        self.inner
            .get(&(exchange, instrument.clone()))
            .map(|e| e.value().clone())
    }

    /// Replace (never merge) the entry for the ticker's key.
    pub fn put(&self, ticker: NormalizedTicker) {
        self.inner.insert(ticker.key(), ticker);
    }

    /// All entries for one exchange.
    pub fn snapshot(&self, exchange: ExchangeId) -> HashMap<Instrument, NormalizedTicker> {
        self.inner
            .iter()
            .filter(|e| e.key().0 == exchange)
            .map(|e| (e.key().1.clone(), e.value().clone()))
            .collect()
    }

    /// Consistent read of the requested (exchange, instrument) slice.
    pub fn snapshot_for(
        &self,
        exchanges: &[ExchangeId],
        instruments: &HashSet<Instrument>,
    ) -> HashMap<TickerKey, NormalizedTicker> {
        let mut out = HashMap::new();
        for &exchange in exchanges {
            for instrument in instruments {
                if let Some(ticker) = self.get(exchange, instrument) {
                    out.insert((exchange, instrument.clone()), ticker);
                }
            }
        }
        out
    }

    /// True if the entry exists and is no older than `ttl` at `now_ms`.
    pub fn is_fresh_at(
        &self,
        exchange: ExchangeId,
        instrument: &Instrument,
        ttl: Duration,
        now_ms: u64,
    ) -> bool {
        self.get(exchange, instrument)
            .map(|t| now_ms.saturating_sub(t.observed_at_ms) <= ttl.as_millis() as u64)
            .unwrap_or(false)
    }

    pub fn is_fresh(&self, exchange: ExchangeId, instrument: &Instrument, ttl: Duration) -> bool {
        self.is_fresh_at(exchange, instrument, ttl, now_millis())
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

/// Per-exchange market catalog with its own, much longer TTL.
///
/// Catalogs change infrequently, so they are cached separately from
/// ticker freshness.
#[derive(Debug)]
pub struct MarketCache {
    inner: DashMap<ExchangeId, (u64, HashSet<Instrument>)>,
    ttl: Duration,
}

impl MarketCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: DashMap::new(),
            ttl,
        }
    }

    pub fn get_at(&self, exchange: ExchangeId, now_ms: u64) -> Option<HashSet<Instrument>> {
        self.inner.get(&exchange).and_then(|e| {
            let (loaded_at, catalog) = e.value();
            if now_ms.saturating_sub(*loaded_at) <= self.ttl.as_millis() as u64 {
                Some(catalog.clone())
            } else {
                None
            }
        })
    }

    pub fn get(&self, exchange: ExchangeId) -> Option<HashSet<Instrument>> {
        self.get_at(exchange, now_millis())
    }

    pub fn put_at(&self, exchange: ExchangeId, catalog: HashSet<Instrument>, now_ms: u64) {
        self.inner.insert(exchange, (now_ms, catalog));
    }

    pub fn put(&self, exchange: ExchangeId, catalog: HashSet<Instrument>) {
        self.put_at(exchange, catalog, now_millis());
    }
}
