use thiserror::Error;

use crate::models::ExchangeId;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown exchange: {0}")]
    UnknownExchange(String),

    #[error("Invalid instrument: {0}")]
    InvalidInstrument(String),

    #[error("Market catalog unavailable for {exchange}: {cause}")]
    MarketsUnavailable { exchange: ExchangeId, cause: String },

    #[error("Ticker fetch failed on {exchange}: {cause}")]
    TickerFetchFailed { exchange: ExchangeId, cause: String },

    #[error("All requested exchanges failed to provide tickers")]
    AllSourcesUnavailable,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
