use anyhow::Result;
use arb_scanner::{
    cache::TickerCache,
    config::AppConfig,
    exchange::{self, ExchangeClient},
    models::ExchangeId,
    orchestrator::FetchOrchestrator,
    service::{ScannerService, spawn_scan_loop},
    utils,
};
use std::collections::HashMap;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    utils::init_logging();

    let config = AppConfig::load();
    if config.exchanges.len() < 2 {
        anyhow::bail!("need at least two exchanges to scan for cross-exchange spreads");
    }
    if config.instruments.is_empty() {
        anyhow::bail!("no valid instruments configured");
    }

    tracing::info!(
        exchanges = ?config.exchanges,
        instruments = ?config.instruments,
        cache_ttl_ms = config.cache_ttl.as_millis() as u64,
        poll_interval_secs = config.poll_interval.as_secs(),
        "[INIT] arb-scanner starting"
    );

    let http = reqwest::Client::builder()
        .timeout(config.http_timeout)
        .build()?;

    let clients: HashMap<ExchangeId, Arc<dyn ExchangeClient>> = config
        .exchanges
        .iter()
        .map(|&id| (id, exchange::make_client(id, http.clone(), config.rate_limit)))
        .collect();

    let cache = Arc::new(TickerCache::new());
    let orchestrator = FetchOrchestrator::new(
        clients,
        cache.clone(),
        config.market_ttl,
        config.retry,
        config.fallback_delay,
    );

    let poll_interval = config.poll_interval;
    let service = Arc::new(ScannerService::new(orchestrator, cache, config));

    tracing::info!("[INIT] scan loop started");
    let scan_task = spawn_scan_loop(service, poll_interval);
    scan_task.await?;
    Ok(())
}
