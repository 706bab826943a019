//! Request and result types for the opportunity engine.

use serde::Serialize;
use std::collections::HashSet;

use crate::models::{ExchangeId, Instrument};

pub const DEFAULT_LIMIT: usize = 50;

/// Parameters of one opportunity query.
#[derive(Debug, Clone)]
pub struct QueryRequest {
    pub instruments: HashSet<Instrument>,
    pub exchanges: Vec<ExchangeId>,
    /// Liquidity floor in quote currency; applied only when positive.
    pub min_quote_volume: f64,
    /// Spread filter. `None` keeps only positive spreads; an explicit
    /// value is applied uniformly, so a negative threshold surfaces
    /// negative spreads too.
    pub min_spread_pct: Option<f64>,
    pub limit: usize,
}

impl QueryRequest {
    pub fn new(instruments: HashSet<Instrument>, exchanges: Vec<ExchangeId>) -> Self {
        Self {
            instruments,
            exchanges,
            min_quote_volume: 0.0,
            min_spread_pct: None,
            limit: DEFAULT_LIMIT,
        }
    }
}

/// One buy-here/sell-there pairing, computed fresh per query and never
/// cached. The (buy, sell) pairing is ordered; buy and sell are distinct
/// roles.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Opportunity {
    pub instrument: Instrument,
    pub buy_exchange: ExchangeId,
    pub sell_exchange: ExchangeId,
    /// Ask on the buy side: what a buyer pays.
    pub buy_price: f64,
    /// Bid on the sell side: what a seller receives.
    pub sell_price: f64,
    pub spread_abs: f64,
    pub spread_pct: f64,
    /// Spread net of both taker fees; equals `spread_pct` when no fee
    /// data is available.
    pub net_pct: f64,
    pub buy_quote_volume: Option<f64>,
    pub sell_quote_volume: Option<f64>,
    /// `min` of both sides' quote volume, 0 when either is unknown.
    pub liquidity_floor: f64,
    pub score: f64,
}

/// Ordered, truncated query output.
#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    pub generated_at_ms: u64,
    /// Number of surviving opportunities before the limit was applied.
    pub total_before_limit: usize,
    pub opportunities: Vec<Opportunity>,
}
