//! Cross-exchange arbitrage opportunity engine.

pub mod evaluator;
pub mod types;

pub use evaluator::find_opportunities;
pub use types::{Opportunity, QueryRequest, QueryResult};
