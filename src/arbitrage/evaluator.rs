//! Pure opportunity evaluation over a cache snapshot.
//!
//! No I/O and no mutation: the engine reads an immutable snapshot taken
//! at query start, so concurrent cache writes never produce a
//! half-updated view, and identical inputs always produce the identical
//! ordered output.

use std::collections::HashMap;

use super::types::{Opportunity, QueryRequest, QueryResult};
use crate::models::{ExchangeId, NormalizedTicker, TickerKey};

/// Compute the ranked list of arbitrage opportunities for one request.
///
/// Requests naming fewer than two exchanges, and instruments quoted on
/// fewer than two of them, contribute nothing; that is an empty result,
/// not an error.
pub fn find_opportunities(
    snapshot: &HashMap<TickerKey, NormalizedTicker>,
    req: &QueryRequest,
    now_ms: u64,
) -> QueryResult {
    let mut opportunities = Vec::new();

    // A repeated exchange in the request must not pair with itself.
    let mut exchanges: Vec<ExchangeId> = Vec::with_capacity(req.exchanges.len());
    for &exchange in &req.exchanges {
        if !exchanges.contains(&exchange) {
            exchanges.push(exchange);
        }
    }

    for instrument in &req.instruments {
        let entries: Vec<&NormalizedTicker> = exchanges
            .iter()
            .filter_map(|ex| snapshot.get(&(*ex, instrument.clone())))
            .collect();
        if entries.len() < 2 {
            continue;
        }

        for buy in &entries {
            for sell in &entries {
                if buy.exchange == sell.exchange {
                    continue;
                }
                if let Some(opp) = evaluate_pair(buy, sell, req) {
                    opportunities.push(opp);
                }
            }
        }
    }

    // Deterministic order: score, then spread, then identity.
    opportunities.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| b.spread_pct.total_cmp(&a.spread_pct))
            .then_with(|| a.instrument.cmp(&b.instrument))
            .then_with(|| a.buy_exchange.cmp(&b.buy_exchange))
            .then_with(|| a.sell_exchange.cmp(&b.sell_exchange))
    });

    let total_before_limit = opportunities.len();
    opportunities.truncate(req.limit);

    QueryResult {
        generated_at_ms: now_ms,
        total_before_limit,
        opportunities,
    }
}

/// Evaluate one ordered (buy, sell) pairing against the request filters.
fn evaluate_pair(
    buy: &NormalizedTicker,
    sell: &NormalizedTicker,
    req: &QueryRequest,
) -> Option<Opportunity> {
    let buy_price = buy.ask;
    let sell_price = sell.bid;
    if buy_price <= 0.0 {
        return None;
    }

    let spread_abs = sell_price - buy_price;
    let spread_pct = spread_abs / buy_price * 100.0;
    let passes_spread = match req.min_spread_pct {
        Some(min) => spread_pct >= min,
        None => spread_abs > 0.0,
    };
    if !passes_spread {
        return None;
    }

    let liquidity_floor = match (buy.quote_volume, sell.quote_volume) {
        (Some(b), Some(s)) => b.min(s),
        _ => 0.0,
    };
    if req.min_quote_volume > 0.0 && liquidity_floor < req.min_quote_volume {
        return None;
    }

    // Fee-adjusted margin; sides without fee data contribute zero, so
    // net_pct degrades to the raw spread.
    let fee_pct =
        (buy.taker_fee_rate.unwrap_or(0.0) + sell.taker_fee_rate.unwrap_or(0.0)) * 100.0;
    let net_pct = spread_pct - fee_pct;

    Some(Opportunity {
        instrument: buy.instrument.clone(),
        buy_exchange: buy.exchange,
        sell_exchange: sell.exchange,
        buy_price,
        sell_price,
        spread_abs,
        spread_pct,
        net_pct,
        buy_quote_volume: buy.quote_volume,
        sell_quote_volume: sell.quote_volume,
        liquidity_floor,
        score: score(net_pct, liquidity_floor),
    })
}

/// Ranking value: margin weighted by log-damped liquidity depth, so very
/// large volumes do not linearly dominate small-but-real spreads.
/// Unknown liquidity is scored as if the floor were 1.
fn score(net_pct: f64, liquidity_floor: f64) -> f64 {
    let depth = if liquidity_floor > 0.0 {
        liquidity_floor
    } else {
        1.0
    };
    net_pct * (1.0 + depth).log10()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ExchangeId, Instrument};
    use std::collections::HashSet;

    fn inst(s: &str) -> Instrument {
        Instrument::parse(s).unwrap()
    }

    fn ticker(
        exchange: ExchangeId,
        instrument: &str,
        bid: f64,
        ask: f64,
        quote_volume: Option<f64>,
    ) -> NormalizedTicker {
        NormalizedTicker {
            exchange,
            instrument: inst(instrument),
            last_price: (bid + ask) / 2.0,
            bid,
            ask,
            open_price: None,
            high_price: None,
            low_price: None,
            base_volume: None,
            quote_volume,
            change_percent: None,
            taker_fee_rate: None,
            observed_at_ms: 0,
        }
    }

    fn snapshot(tickers: Vec<NormalizedTicker>) -> HashMap<TickerKey, NormalizedTicker> {
        tickers.into_iter().map(|t| (t.key(), t)).collect()
    }

    fn scenario_a_snapshot() -> HashMap<TickerKey, NormalizedTicker> {
        snapshot(vec![
            ticker(ExchangeId::Binance, "BTC/USDT", 100.0, 101.0, Some(1_000_000.0)),
            ticker(ExchangeId::Kucoin, "BTC/USDT", 103.0, 104.0, Some(500_000.0)),
        ])
    }

    fn btc_request() -> QueryRequest {
        QueryRequest::new(
            HashSet::from([inst("BTC/USDT")]),
            vec![ExchangeId::Binance, ExchangeId::Kucoin],
        )
    }

    #[test]
    fn buy_low_sell_high_across_two_exchanges() {
        let result = find_opportunities(&scenario_a_snapshot(), &btc_request(), 0);

        assert_eq!(result.total_before_limit, 1);
        assert_eq!(result.opportunities.len(), 1);
        let opp = &result.opportunities[0];
        assert_eq!(opp.buy_exchange, ExchangeId::Binance);
        assert_eq!(opp.sell_exchange, ExchangeId::Kucoin);
        assert_eq!(opp.buy_price, 101.0);
        assert_eq!(opp.sell_price, 103.0);
        assert_eq!(opp.spread_abs, 2.0);
        assert!((opp.spread_pct - 1.9801980198).abs() < 1e-6);
        assert_eq!(opp.liquidity_floor, 500_000.0);
        // No fee data on either side: net degrades to raw spread.
        assert_eq!(opp.net_pct, opp.spread_pct);
    }

    #[test]
    fn min_spread_filter_empties_the_result() {
        let mut req = btc_request();
        req.min_spread_pct = Some(5.0);
        let result = find_opportunities(&scenario_a_snapshot(), &req, 0);
        assert_eq!(result.total_before_limit, 0);
        assert!(result.opportunities.is_empty());
    }

    #[test]
    fn min_quote_volume_filters_on_liquidity_floor() {
        let mut req = btc_request();
        req.min_quote_volume = 600_000.0;
        let result = find_opportunities(&scenario_a_snapshot(), &req, 0);
        assert!(result.opportunities.is_empty());

        req.min_quote_volume = 400_000.0;
        let result = find_opportunities(&scenario_a_snapshot(), &req, 0);
        assert_eq!(result.opportunities.len(), 1);
    }

    #[test]
    fn repeated_exchanges_in_the_request_do_not_duplicate_results() {
        let req = QueryRequest::new(
            HashSet::from([inst("BTC/USDT")]),
            vec![ExchangeId::Binance, ExchangeId::Kucoin, ExchangeId::Binance],
        );
        let result = find_opportunities(&scenario_a_snapshot(), &req, 0);
        assert_eq!(result.total_before_limit, 1);
        assert_eq!(result.opportunities.len(), 1);
    }

    #[test]
    fn missing_exchange_entry_excludes_only_that_leg() {
        // Third exchange never delivered data for the instrument; pairs
        // form from the remaining two and the query still succeeds.
        let snap = scenario_a_snapshot();
        let req = QueryRequest::new(
            HashSet::from([inst("BTC/USDT")]),
            vec![ExchangeId::Binance, ExchangeId::Kucoin, ExchangeId::Okx],
        );
        let result = find_opportunities(&snap, &req, 0);
        assert_eq!(result.total_before_limit, 1);
        for opp in &result.opportunities {
            assert_ne!(opp.buy_exchange, ExchangeId::Okx);
            assert_ne!(opp.sell_exchange, ExchangeId::Okx);
        }
    }

    #[test]
    fn limit_truncates_but_reports_full_total() {
        let snap = snapshot(vec![
            ticker(ExchangeId::Binance, "BTC/USDT", 100.0, 101.0, Some(1_000.0)),
            ticker(ExchangeId::Kucoin, "BTC/USDT", 110.0, 111.0, Some(1_000.0)),
            ticker(ExchangeId::Binance, "ETH/USDT", 100.0, 101.0, Some(1_000.0)),
            ticker(ExchangeId::Kucoin, "ETH/USDT", 106.0, 107.0, Some(1_000.0)),
            ticker(ExchangeId::Binance, "SOL/USDT", 100.0, 101.0, Some(1_000.0)),
            ticker(ExchangeId::Kucoin, "SOL/USDT", 103.0, 104.0, Some(1_000.0)),
        ]);
        let mut req = QueryRequest::new(
            HashSet::from([inst("BTC/USDT"), inst("ETH/USDT"), inst("SOL/USDT")]),
            vec![ExchangeId::Binance, ExchangeId::Kucoin],
        );
        req.limit = 1;

        let result = find_opportunities(&snap, &req, 0);
        assert_eq!(result.total_before_limit, 3);
        assert_eq!(result.opportunities.len(), 1);
        // The widest spread wins with equal liquidity.
        assert_eq!(result.opportunities[0].instrument, inst("BTC/USDT"));
    }

    #[test]
    fn scores_are_sorted_descending() {
        let snap = snapshot(vec![
            ticker(ExchangeId::Binance, "BTC/USDT", 100.0, 101.0, Some(5_000.0)),
            ticker(ExchangeId::Kucoin, "BTC/USDT", 104.0, 105.0, Some(800.0)),
            ticker(ExchangeId::Okx, "BTC/USDT", 103.0, 103.5, Some(90_000.0)),
        ]);
        let req = QueryRequest::new(
            HashSet::from([inst("BTC/USDT")]),
            vec![ExchangeId::Binance, ExchangeId::Kucoin, ExchangeId::Okx],
        );
        let result = find_opportunities(&snap, &req, 0);
        assert!(result.opportunities.len() >= 2);
        for pair in result.opportunities.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[test]
    fn no_self_pairing_and_deterministic_output() {
        let snap = snapshot(vec![
            ticker(ExchangeId::Binance, "BTC/USDT", 100.0, 101.0, Some(1_000.0)),
            ticker(ExchangeId::Kucoin, "BTC/USDT", 102.0, 103.0, Some(1_000.0)),
            ticker(ExchangeId::Okx, "BTC/USDT", 104.0, 105.0, Some(1_000.0)),
        ]);
        let req = QueryRequest::new(
            HashSet::from([inst("BTC/USDT")]),
            vec![ExchangeId::Binance, ExchangeId::Kucoin, ExchangeId::Okx],
        );

        let first = find_opportunities(&snap, &req, 0);
        let second = find_opportunities(&snap, &req, 0);
        assert_eq!(first.opportunities, second.opportunities);
        for opp in &first.opportunities {
            assert_ne!(opp.buy_exchange, opp.sell_exchange);
        }
    }

    #[test]
    fn ties_break_lexicographically_by_instrument() {
        // Identical books on two instruments produce identical scores.
        let snap = snapshot(vec![
            ticker(ExchangeId::Binance, "ETH/USDT", 100.0, 101.0, Some(1_000.0)),
            ticker(ExchangeId::Kucoin, "ETH/USDT", 103.0, 104.0, Some(1_000.0)),
            ticker(ExchangeId::Binance, "BTC/USDT", 100.0, 101.0, Some(1_000.0)),
            ticker(ExchangeId::Kucoin, "BTC/USDT", 103.0, 104.0, Some(1_000.0)),
        ]);
        let req = QueryRequest::new(
            HashSet::from([inst("BTC/USDT"), inst("ETH/USDT")]),
            vec![ExchangeId::Binance, ExchangeId::Kucoin],
        );
        let result = find_opportunities(&snap, &req, 0);
        assert_eq!(result.opportunities.len(), 2);
        assert_eq!(result.opportunities[0].instrument, inst("BTC/USDT"));
        assert_eq!(result.opportunities[1].instrument, inst("ETH/USDT"));
    }

    #[test]
    fn negative_spreads_surface_under_a_low_threshold() {
        let mut req = btc_request();
        req.min_spread_pct = Some(-100.0);
        let result = find_opportunities(&scenario_a_snapshot(), &req, 0);
        // Both ordered pairings survive: the profitable one and its
        // negative-spread mirror.
        assert_eq!(result.total_before_limit, 2);
        assert!(result.opportunities.iter().any(|o| o.spread_abs < 0.0));
    }

    #[test]
    fn fees_reduce_net_and_score() {
        let mut cheap = ticker(ExchangeId::Binance, "BTC/USDT", 100.0, 101.0, Some(1_000.0));
        cheap.taker_fee_rate = Some(0.001);
        let mut rich = ticker(ExchangeId::Kucoin, "BTC/USDT", 103.0, 104.0, Some(1_000.0));
        rich.taker_fee_rate = Some(0.001);
        let snap = snapshot(vec![cheap, rich]);

        let result = find_opportunities(&snap, &btc_request(), 0);
        let opp = &result.opportunities[0];
        assert!((opp.net_pct - (opp.spread_pct - 0.2)).abs() < 1e-9);
        assert!(opp.score < opp.spread_pct * (1.0 + 1_000.0f64).log10());
    }

    #[test]
    fn single_exchange_request_yields_empty_result() {
        let snap = scenario_a_snapshot();
        let req = QueryRequest::new(HashSet::from([inst("BTC/USDT")]), vec![ExchangeId::Binance]);
        let result = find_opportunities(&snap, &req, 0);
        assert_eq!(result.total_before_limit, 0);
    }

    #[test]
    fn unknown_liquidity_scores_with_unit_depth() {
        let snap = snapshot(vec![
            ticker(ExchangeId::Binance, "BTC/USDT", 100.0, 101.0, None),
            ticker(ExchangeId::Kucoin, "BTC/USDT", 103.0, 104.0, None),
        ]);
        let result = find_opportunities(&snap, &btc_request(), 0);
        let opp = &result.opportunities[0];
        assert_eq!(opp.liquidity_floor, 0.0);
        assert!((opp.score - opp.net_pct * 2.0f64.log10()).abs() < 1e-9);
    }
}
