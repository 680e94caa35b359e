pub mod exit_rules;
pub mod position_tracker;

// Re-export main types for convenience
pub use exit_rules::{
    calculate_holding_days, calculate_profit_rate, parse_buy_date, ExitDecisionEngine, ExitPolicy,
    ExitReason, ExitVerdict,
};
pub use position_tracker::{CycleReport, HoldingsMonitor, PositionCheck};
