//! Table layouts of the per-market performance trackers
//!
//! Both markets record the same facts under different column names, so one
//! aggregation routine runs against either by swapping the schema.

use crate::market::Market;

/// Where a market keeps its tracked signals
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketSchema {
    pub market: Market,
    pub table: &'static str,
    /// 30-day look-forward return, stored as a fraction (0.12 = +12%)
    pub return_column: &'static str,
    pub updated_column: &'static str,
    /// SQL predicate that selects rows whose look-forward return is final
    pub completed_predicate: &'static str,
    /// Table of trading principles; `None` when the market doesn't track them
    pub principles_table: Option<&'static str>,
}

pub const DOMESTIC_SCHEMA: MarketSchema = MarketSchema {
    market: Market::Domestic,
    table: "analysis_performance_tracker",
    return_column: "tracked_30d_return",
    updated_column: "updated_at",
    completed_predicate: "tracking_status = 'completed'",
    principles_table: Some("trading_principles"),
};

pub const US_SCHEMA: MarketSchema = MarketSchema {
    market: Market::Us,
    table: "us_analysis_performance_tracker",
    return_column: "return_30d",
    updated_column: "last_updated",
    completed_predicate: "return_30d IS NOT NULL",
    principles_table: None,
};

impl MarketSchema {
    pub fn for_market(market: Market) -> &'static MarketSchema {
        match market {
            Market::Domestic => &DOMESTIC_SCHEMA,
            Market::Us => &US_SCHEMA,
        }
    }
}
