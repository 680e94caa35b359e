//! Stock position tracker
//!
//! Exit decisions for open positions, buy/sell notifications, and the weekly
//! trigger reliability digest for the domestic and US markets.

pub mod config;
pub mod decision_engine;
pub mod insight;
pub mod market;
pub mod messages;
pub mod position;
pub mod telegram;

pub use config::Config;
pub use market::Market;
pub use position::PositionRecord;
