//! Core-facing façade tying cache, orchestrator and engine together.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::arbitrage::{QueryRequest, QueryResult, find_opportunities};
use crate::cache::TickerCache;
use crate::config::AppConfig;
use crate::errors::Result;
use crate::models::{ExchangeId, Instrument, NormalizedTicker, TickerKey};
use crate::orchestrator::{FetchOrchestrator, FetchOutcome};
use crate::utils::now_millis;

pub struct ScannerService {
    orchestrator: FetchOrchestrator,
    cache: Arc<TickerCache>,
    config: AppConfig,
}

impl ScannerService {
    pub fn new(
        orchestrator: FetchOrchestrator,
        cache: Arc<TickerCache>,
        config: AppConfig,
    ) -> Self {
        Self {
            orchestrator,
            cache,
            config,
        }
    }

    /// Query over the configured defaults.
    pub fn default_request(&self) -> QueryRequest {
        QueryRequest {
            instruments: self.config.instruments.iter().cloned().collect(),
            exchanges: self.config.exchanges.clone(),
            min_quote_volume: self.config.min_quote_volume,
            min_spread_pct: self.config.min_spread_pct,
            limit: self.config.max_limit,
        }
    }

    /// Refresh any cached ticker older than `ttl` for the given scope.
    pub async fn ensure_fresh(
        &self,
        exchanges: &[ExchangeId],
        instruments: &HashSet<Instrument>,
        ttl: Duration,
    ) -> Result<HashMap<ExchangeId, FetchOutcome>> {
        self.orchestrator.ensure_fresh(exchanges, instruments, ttl).await
    }

    /// Run the opportunity engine over whatever the cache currently
    /// holds. Never fails; an empty result is a valid outcome.
    pub fn query(&self, request: &QueryRequest) -> QueryResult {
        let snapshot = self
            .cache
            .snapshot_for(&request.exchanges, &request.instruments);
        find_opportunities(&snapshot, request, now_millis())
    }

    /// Read-only view of the cached tickers for the given scope,
    /// regardless of freshness.
    pub fn ticker_snapshot(
        &self,
        exchanges: &[ExchangeId],
        instruments: &HashSet<Instrument>,
    ) -> HashMap<TickerKey, NormalizedTicker> {
        self.cache.snapshot_for(exchanges, instruments)
    }

    /// Refresh the request's scope at the configured TTL, then query.
    /// Fails only when every requested venue failed outright.
    pub async fn refresh_and_query(&self, request: &QueryRequest) -> Result<QueryResult> {
        self.ensure_fresh(
            &request.exchanges,
            &request.instruments,
            self.config.cache_ttl,
        )
        .await?;
        Ok(self.query(request))
    }
}

/// Spawn the periodic scan task: refresh, evaluate, log.
pub fn spawn_scan_loop(service: Arc<ScannerService>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let request = service.default_request();
            match service.refresh_and_query(&request).await {
                Ok(result) => log_scan(&result),
                Err(e) => error!(error = %e, "[SCAN] scan cycle failed"),
            }
        }
    })
}

fn log_scan(result: &QueryResult) {
    if result.opportunities.is_empty() {
        info!("[SCAN] no opportunities this cycle");
        return;
    }
    info!(
        total = result.total_before_limit,
        shown = result.opportunities.len(),
        "[SCAN] opportunities found"
    );
    for opp in &result.opportunities {
        info!(
            instrument = %opp.instrument,
            buy = %opp.buy_exchange,
            sell = %opp.sell_exchange,
            buy_price = opp.buy_price,
            sell_price = opp.sell_price,
            spread_pct = format!("{:.4}", opp.spread_pct),
            net_pct = format!("{:.4}", opp.net_pct),
            score = format!("{:.4}", opp.score),
            "[SCAN] opportunity"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::{ExchangeClient, RawTicker, binance::Ticker24h};
    use crate::utils::RetryPolicy;
    use async_trait::async_trait;

    fn inst(s: &str) -> Instrument {
        Instrument::parse(s).unwrap()
    }

    /// Fixed-price venue: every instrument trades at `last` with a
    /// one-tick spread around it.
    struct FixedPriceExchange {
        id: ExchangeId,
        last: f64,
    }

    #[async_trait]
    impl ExchangeClient for FixedPriceExchange {
        fn id(&self) -> ExchangeId {
            self.id
        }

        fn taker_fee_rate(&self) -> Option<f64> {
            None
        }

        async fn list_instruments(&self) -> Result<HashSet<Instrument>> {
            Ok([inst("BTC/USDT"), inst("ETH/USDT")].into_iter().collect())
        }

        async fn fetch_tickers(
            &self,
            instruments: &HashSet<Instrument>,
        ) -> Result<HashMap<Instrument, RawTicker>> {
            Ok(instruments
                .iter()
                .map(|i| {
                    let t = Ticker24h {
                        symbol: i.as_str().replace('/', ""),
                        last_price: Some(self.last.to_string()),
                        bid_price: Some((self.last - 1.0).to_string()),
                        ask_price: Some((self.last + 1.0).to_string()),
                        open_price: None,
                        high_price: None,
                        low_price: None,
                        volume: None,
                        quote_volume: Some("1000000".into()),
                    };
                    (i.clone(), RawTicker::Binance(t))
                })
                .collect())
        }

        async fn fetch_ticker(&self, instrument: &Instrument) -> Result<RawTicker> {
            let mut all = self
                .fetch_tickers(&[instrument.clone()].into_iter().collect())
                .await?;
            Ok(all.remove(instrument).unwrap())
        }
    }

    fn test_config() -> AppConfig {
        AppConfig {
            instruments: vec![inst("BTC/USDT"), inst("ETH/USDT")],
            exchanges: vec![ExchangeId::Binance, ExchangeId::Kucoin],
            cache_ttl: Duration::from_secs(2),
            market_ttl: Duration::from_secs(3600),
            retry: RetryPolicy::new(1, Duration::from_millis(1)),
            fallback_delay: Duration::from_millis(1),
            rate_limit: Duration::ZERO,
            http_timeout: Duration::from_secs(10),
            poll_interval: Duration::from_secs(5),
            max_limit: 50,
            min_spread_pct: None,
            min_quote_volume: 0.0,
        }
    }

    fn service_with(clients: HashMap<ExchangeId, Arc<dyn ExchangeClient>>) -> ScannerService {
        let config = test_config();
        let cache = Arc::new(TickerCache::new());
        let orchestrator = FetchOrchestrator::new(
            clients,
            cache.clone(),
            config.market_ttl,
            config.retry,
            config.fallback_delay,
        );
        ScannerService::new(orchestrator, cache, config)
    }

    #[tokio::test]
    async fn refresh_and_query_finds_the_cross_venue_spread() {
        // Kucoin bids above Binance's ask on both instruments.
        let clients: HashMap<ExchangeId, Arc<dyn ExchangeClient>> = HashMap::from([
            (
                ExchangeId::Binance,
                Arc::new(FixedPriceExchange {
                    id: ExchangeId::Binance,
                    last: 100.0,
                }) as Arc<dyn ExchangeClient>,
            ),
            (
                ExchangeId::Kucoin,
                Arc::new(FixedPriceExchange {
                    id: ExchangeId::Kucoin,
                    last: 110.0,
                }) as Arc<dyn ExchangeClient>,
            ),
        ]);
        let service = service_with(clients);

        let request = service.default_request();
        let result = service.refresh_and_query(&request).await.unwrap();

        assert_eq!(result.opportunities.len(), 2);
        for opp in &result.opportunities {
            assert_eq!(opp.buy_exchange, ExchangeId::Binance);
            assert_eq!(opp.sell_exchange, ExchangeId::Kucoin);
            assert_eq!(opp.buy_price, 101.0);
            assert_eq!(opp.sell_price, 109.0);
        }
        // No fee data on either side: net equals gross.
        assert_eq!(
            result.opportunities[0].net_pct,
            result.opportunities[0].spread_pct
        );
    }

    #[tokio::test]
    async fn query_on_an_empty_cache_is_empty_not_an_error() {
        let service = service_with(HashMap::new());
        let result = service.query(&service.default_request());
        assert_eq!(result.total_before_limit, 0);
        assert!(result.opportunities.is_empty());
    }

    #[tokio::test]
    async fn ticker_snapshot_reflects_the_requested_scope() {
        let clients: HashMap<ExchangeId, Arc<dyn ExchangeClient>> = HashMap::from([(
            ExchangeId::Binance,
            Arc::new(FixedPriceExchange {
                id: ExchangeId::Binance,
                last: 100.0,
            }) as Arc<dyn ExchangeClient>,
        )]);
        let service = service_with(clients);

        let instruments: HashSet<Instrument> = [inst("BTC/USDT"), inst("ETH/USDT")]
            .into_iter()
            .collect();
        service
            .ensure_fresh(&[ExchangeId::Binance], &instruments, Duration::from_secs(2))
            .await
            .unwrap();

        let only_btc: HashSet<Instrument> = [inst("BTC/USDT")].into_iter().collect();
        let snapshot = service.ticker_snapshot(&[ExchangeId::Binance], &only_btc);
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot.contains_key(&(ExchangeId::Binance, inst("BTC/USDT"))));
    }
}
