//! 🚪 Exit Decision Engine
//!
//! Classifies one held position as "sell now" (with a reason) or "continue holding".
//! Rules are checked in a fixed order and the first match wins:
//! stop-loss, target price, short-term horizon rules, then general rules.
//!
//! The engine is pure: no I/O, no shared state. Malformed input degrades to
//! safe defaults (0 holding days, Medium-term horizon) and never panics.

use chrono::{Local, NaiveDateTime};
use log::{debug, info, warn};

use crate::market::Market;
use crate::position::{InvestmentPeriod, PositionRecord, TIMESTAMP_FORMAT};

/// Short-term: minimum holding days before taking profit
pub const SHORT_TERM_GOAL_DAYS: i64 = 15;
/// Short-term: return (%) that counts as goal achieved
pub const SHORT_TERM_GOAL_RATE: f64 = 5.0;
/// Short-term: minimum holding days before cutting a loss
pub const SHORT_TERM_LOSS_DAYS: i64 = 10;
/// Short-term: return (%) at or below which the loss is cut
pub const SHORT_TERM_LOSS_RATE: f64 = -3.0;
/// Any horizon: return (%) at which profit is taken
pub const RETURN_TARGET_RATE: f64 = 10.0;
/// Any horizon: return (%) at or below which the position is closed
pub const LOSS_LIMIT_RATE: f64 = -5.0;
/// Holding days after which any loss is closed
pub const STALE_LOSS_DAYS: i64 = 30;
/// Holding days after which a small gain is realized
pub const STALE_GAIN_DAYS: i64 = 60;
/// Minimum return (%) realized after `STALE_GAIN_DAYS`
pub const STALE_GAIN_RATE: f64 = 3.0;
/// Long-term: holding days after which any loss is cleaned up
pub const LONG_TERM_CLEANUP_DAYS: i64 = 90;

/// Thresholds for the exit rules
#[derive(Debug, Clone, PartialEq)]
pub struct ExitPolicy {
    pub short_term_goal_days: i64,
    pub short_term_goal_rate: f64,
    pub short_term_loss_days: i64,
    pub short_term_loss_rate: f64,
    pub return_target_rate: f64,
    pub loss_limit_rate: f64,
    pub stale_loss_days: i64,
    pub stale_gain_days: i64,
    pub stale_gain_rate: f64,
    pub long_term_cleanup_days: i64,
}

impl Default for ExitPolicy {
    fn default() -> Self {
        Self {
            short_term_goal_days: SHORT_TERM_GOAL_DAYS,
            short_term_goal_rate: SHORT_TERM_GOAL_RATE,
            short_term_loss_days: SHORT_TERM_LOSS_DAYS,
            short_term_loss_rate: SHORT_TERM_LOSS_RATE,
            return_target_rate: RETURN_TARGET_RATE,
            loss_limit_rate: LOSS_LIMIT_RATE,
            stale_loss_days: STALE_LOSS_DAYS,
            stale_gain_days: STALE_GAIN_DAYS,
            stale_gain_rate: STALE_GAIN_RATE,
            long_term_cleanup_days: LONG_TERM_CLEANUP_DAYS,
        }
    }
}

/// Why a position is (or isn't) being exited
#[derive(Debug, Clone, PartialEq)]
pub enum ExitReason {
    StopLoss { stop_loss: f64, market: Market },
    TargetReached { target_price: f64, market: Market },
    ShortTermGoal { days: i64, profit_rate: f64 },
    ShortTermLossProtection { days: i64, profit_rate: f64 },
    ReturnTarget { threshold: f64, profit_rate: f64 },
    LossLimit { threshold: f64, profit_rate: f64 },
    StaleLoss { min_days: i64, days: i64, profit_rate: f64 },
    StaleSmallGain { min_days: i64, min_rate: f64, days: i64, profit_rate: f64 },
    LongTermCleanup { days: i64, profit_rate: f64 },
    Hold,
    /// Input could not be evaluated; treated as hold
    AnalysisError,
}

impl ExitReason {
    pub fn is_sell(&self) -> bool {
        !matches!(self, ExitReason::Hold | ExitReason::AnalysisError)
    }

    /// Short machine-friendly label for logs
    pub fn code(&self) -> &'static str {
        match self {
            ExitReason::StopLoss { .. } => "STOP_LOSS",
            ExitReason::TargetReached { .. } => "TARGET",
            ExitReason::ShortTermGoal { .. } => "SHORT_TERM_GOAL",
            ExitReason::ShortTermLossProtection { .. } => "SHORT_TERM_LOSS",
            ExitReason::ReturnTarget { .. } => "RETURN_TARGET",
            ExitReason::LossLimit { .. } => "LOSS_LIMIT",
            ExitReason::StaleLoss { .. } => "STALE_LOSS",
            ExitReason::StaleSmallGain { .. } => "STALE_GAIN",
            ExitReason::LongTermCleanup { .. } => "LONG_TERM_CLEANUP",
            ExitReason::Hold => "HOLD",
            ExitReason::AnalysisError => "ANALYSIS_ERROR",
        }
    }
}

impl std::fmt::Display for ExitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExitReason::StopLoss { stop_loss, market } => {
                write!(f, "Stop-loss condition reached (Stop-loss: {})", market.format_price(*stop_loss))
            }
            ExitReason::TargetReached { target_price, market } => {
                write!(f, "Target price achieved (Target: {})", market.format_price(*target_price))
            }
            ExitReason::ShortTermGoal { days, profit_rate } => {
                write!(f, "Short-term goal achieved (Held: {} days, Return: {:.2}%)", days, profit_rate)
            }
            ExitReason::ShortTermLossProtection { days, profit_rate } => {
                write!(f, "Short-term loss protection (Held: {} days, Return: {:.2}%)", days, profit_rate)
            }
            ExitReason::ReturnTarget { threshold, profit_rate } => {
                write!(f, "Return {}%+ achieved (Current return: {:.2}%)", threshold, profit_rate)
            }
            ExitReason::LossLimit { threshold, profit_rate } => {
                write!(f, "Loss {}%+ incurred (Current return: {:.2}%)", threshold, profit_rate)
            }
            ExitReason::StaleLoss { min_days, days, profit_rate } => {
                write!(f, "Held {}+ days with loss (Held: {} days, Return: {:.2}%)", min_days, days, profit_rate)
            }
            ExitReason::StaleSmallGain { min_days, min_rate, days, profit_rate } => write!(
                f,
                "Held {}+ days with {}%+ profit (Held: {} days, Return: {:.2}%)",
                min_days, min_rate, days, profit_rate
            ),
            ExitReason::LongTermCleanup { days, profit_rate } => {
                write!(f, "Long-term loss cleanup (Held: {} days, Return: {:.2}%)", days, profit_rate)
            }
            ExitReason::Hold => f.write_str("Continue holding"),
            ExitReason::AnalysisError => f.write_str("Analysis error"),
        }
    }
}

/// Outcome of evaluating one position
#[derive(Debug, Clone, PartialEq)]
pub struct ExitVerdict {
    pub should_sell: bool,
    pub reason: ExitReason,
    pub profit_rate: f64,
    pub days_passed: i64,
}

impl ExitVerdict {
    fn new(reason: ExitReason, profit_rate: f64, days_passed: i64) -> Self {
        Self {
            should_sell: reason.is_sell(),
            reason,
            profit_rate,
            days_passed,
        }
    }

    /// `(should_sell, reason)` pair handed to callers that only need the decision
    pub fn as_decision(&self) -> (bool, String) {
        (self.should_sell, self.reason.to_string())
    }
}

/// Percentage return; 0 when the buy price is not positive
pub fn calculate_profit_rate(buy_price: f64, current_price: f64) -> f64 {
    if buy_price <= 0.0 {
        return 0.0;
    }
    (current_price - buy_price) / buy_price * 100.0
}

pub fn parse_buy_date(buy_date: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(buy_date.trim(), TIMESTAMP_FORMAT).ok()
}

/// Whole days held (truncated); 0 for unparsable or future dates
pub fn calculate_holding_days(buy_date: &str, now: NaiveDateTime) -> i64 {
    parse_buy_date(buy_date)
        .map(|bought| holding_days_between(bought, now))
        .unwrap_or(0)
}

fn holding_days_between(bought: NaiveDateTime, now: NaiveDateTime) -> i64 {
    (now - bought).num_days().max(0)
}

/// Rule evaluator for held positions
#[derive(Debug, Clone, Default)]
pub struct ExitDecisionEngine {
    policy: ExitPolicy,
}

impl ExitDecisionEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(policy: ExitPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &ExitPolicy {
        &self.policy
    }

    /// Evaluate against the local wall clock
    pub fn evaluate(&self, record: &PositionRecord) -> ExitVerdict {
        self.evaluate_at(record, Local::now().naive_local())
    }

    /// Evaluate as of `now`
    pub fn evaluate_at(&self, record: &PositionRecord, now: NaiveDateTime) -> ExitVerdict {
        let prices = [record.buy_price, record.current_price, record.target_price, record.stop_loss];
        if prices.iter().any(|p| !p.is_finite()) {
            warn!("⚠️  {}: non-finite price in record, holding", record.ticker);
            return ExitVerdict::new(ExitReason::AnalysisError, 0.0, 0);
        }

        let profit_rate = calculate_profit_rate(record.buy_price, record.current_price);
        if record.buy_price <= 0.0 {
            warn!("⚠️  {}: buy price {} is not positive, return treated as 0%", record.ticker, record.buy_price);
        }

        let days_passed = match parse_buy_date(&record.buy_date) {
            Some(bought) => holding_days_between(bought, now),
            None => {
                warn!("⚠️  {}: unparsable buy date '{}', holding days = 0", record.ticker, record.buy_date);
                0
            }
        };

        let period = record.investment_period();
        let reason = self.classify(record, period, profit_rate, days_passed);

        if reason.is_sell() {
            info!("🔔 {} SELL [{}] {}", record.ticker, reason.code(), reason);
        } else {
            debug!(
                "{} hold | {} | {} days | {:+.2}%",
                record.ticker, period, days_passed, profit_rate
            );
        }

        ExitVerdict::new(reason, profit_rate, days_passed)
    }

    fn classify(
        &self,
        record: &PositionRecord,
        period: InvestmentPeriod,
        profit_rate: f64,
        days: i64,
    ) -> ExitReason {
        let p = &self.policy;
        let current = record.current_price;

        if record.stop_loss > 0.0 && current <= record.stop_loss {
            return ExitReason::StopLoss { stop_loss: record.stop_loss, market: record.market };
        }

        if record.target_price > 0.0 && current >= record.target_price {
            return ExitReason::TargetReached { target_price: record.target_price, market: record.market };
        }

        if period == InvestmentPeriod::ShortTerm {
            if days >= p.short_term_goal_days && profit_rate >= p.short_term_goal_rate {
                return ExitReason::ShortTermGoal { days, profit_rate };
            }
            if days >= p.short_term_loss_days && profit_rate <= p.short_term_loss_rate {
                return ExitReason::ShortTermLossProtection { days, profit_rate };
            }
        }

        if profit_rate >= p.return_target_rate {
            return ExitReason::ReturnTarget { threshold: p.return_target_rate, profit_rate };
        }

        if profit_rate <= p.loss_limit_rate {
            return ExitReason::LossLimit { threshold: p.loss_limit_rate, profit_rate };
        }

        if days >= p.stale_loss_days && profit_rate < 0.0 {
            return ExitReason::StaleLoss { min_days: p.stale_loss_days, days, profit_rate };
        }

        if days >= p.stale_gain_days && profit_rate >= p.stale_gain_rate {
            return ExitReason::StaleSmallGain {
                min_days: p.stale_gain_days,
                min_rate: p.stale_gain_rate,
                days,
                profit_rate,
            };
        }

        if period == InvestmentPeriod::LongTerm && days >= p.long_term_cleanup_days && profit_rate < 0.0 {
            return ExitReason::LongTermCleanup { days, profit_rate };
        }

        ExitReason::Hold
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::ScenarioSource;
    use chrono::{Duration, NaiveDate};
    use serde_json::json;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, 19)
            .unwrap()
            .and_hms_opt(15, 30, 0)
            .unwrap()
    }

    fn bought_days_ago(days: i64) -> String {
        (now() - Duration::days(days)).format(TIMESTAMP_FORMAT).to_string()
    }

    fn position(buy: f64, current: f64, days: i64, period: Option<&str>) -> PositionRecord {
        PositionRecord {
            ticker: "005930".to_string(),
            buy_price: buy,
            current_price: current,
            buy_date: bought_days_ago(days),
            scenario: match period {
                Some(p) => ScenarioSource::Json(json!({ "investment_period": p })),
                None => ScenarioSource::Absent,
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_stop_loss_fires_first() {
        let mut record = position(100_000.0, 94_000.0, 3, None);
        record.stop_loss = 95_000.0;

        let verdict = ExitDecisionEngine::new().evaluate_at(&record, now());
        assert!(verdict.should_sell);
        assert!(matches!(verdict.reason, ExitReason::StopLoss { .. }));
        let (_, reason) = verdict.as_decision();
        assert!(reason.contains("Stop-loss"));
        assert!(reason.contains("95,000 KRW"));
    }

    #[test]
    fn test_stop_loss_beats_target_when_both_match() {
        let mut record = position(100.0, 100.0, 1, None);
        record.stop_loss = 100.0;
        record.target_price = 100.0;

        let verdict = ExitDecisionEngine::new().evaluate_at(&record, now());
        assert!(matches!(verdict.reason, ExitReason::StopLoss { .. }));
    }

    #[test]
    fn test_target_reached() {
        let mut record = position(100.0, 105.0, 2, None);
        record.target_price = 104.0;
        record.market = Market::Us;

        let verdict = ExitDecisionEngine::new().evaluate_at(&record, now());
        assert!(verdict.should_sell);
        assert_eq!(verdict.reason.to_string(), "Target price achieved (Target: $104.00)");
    }

    #[test]
    fn test_unset_levels_are_ignored() {
        // stop_loss = 0 and target_price = 0 mean "not set"
        let record = position(100.0, 100.0, 1, None);
        let verdict = ExitDecisionEngine::new().evaluate_at(&record, now());
        assert_eq!(verdict.reason, ExitReason::Hold);
    }

    #[test]
    fn test_return_target_regardless_of_holding_period() {
        let engine = ExitDecisionEngine::new();
        for days in [0, 1, 7, 45, 200] {
            for period in [None, Some("Short-term"), Some("Long-term")] {
                let verdict = engine.evaluate_at(&position(100.0, 112.0, days, period), now());
                assert!(verdict.should_sell, "days={} period={:?}", days, period);
            }
        }
        let verdict = engine.evaluate_at(&position(100.0, 110.0, 0, None), now());
        assert!(matches!(verdict.reason, ExitReason::ReturnTarget { .. }));
    }

    #[test]
    fn test_short_term_goal() {
        let engine = ExitDecisionEngine::new();

        let verdict = engine.evaluate_at(&position(100.0, 106.0, 16, Some("Short-term")), now());
        assert!(verdict.should_sell);
        assert!(verdict.reason.to_string().starts_with("Short-term goal achieved"));

        let verdict = engine.evaluate_at(&position(100.0, 106.0, 9, Some("Short-term")), now());
        assert!(!verdict.should_sell);
        assert_eq!(verdict.reason.to_string(), "Continue holding");
    }

    #[test]
    fn test_short_term_rules_only_for_short_term() {
        let verdict = ExitDecisionEngine::new().evaluate_at(&position(100.0, 106.0, 16, Some("Medium-term")), now());
        assert!(!verdict.should_sell);
    }

    #[test]
    fn test_short_term_loss_protection_precedes_general_rules() {
        let engine = ExitDecisionEngine::new();

        let verdict = engine.evaluate_at(&position(100.0, 96.5, 10, Some("Short-term")), now());
        assert!(matches!(verdict.reason, ExitReason::ShortTermLossProtection { .. }));

        // Both short-term loss and the general loss limit match; short-term wins
        let verdict = engine.evaluate_at(&position(100.0, 94.0, 12, Some("Short-term")), now());
        assert!(matches!(verdict.reason, ExitReason::ShortTermLossProtection { .. }));

        let verdict = engine.evaluate_at(&position(100.0, 94.0, 12, None), now());
        assert!(matches!(verdict.reason, ExitReason::LossLimit { .. }));
        assert_eq!(verdict.reason.to_string(), "Loss -5%+ incurred (Current return: -6.00%)");
    }

    #[test]
    fn test_stale_positions() {
        let engine = ExitDecisionEngine::new();

        let verdict = engine.evaluate_at(&position(100.0, 99.0, 30, None), now());
        assert!(matches!(verdict.reason, ExitReason::StaleLoss { days: 30, .. }));

        let verdict = engine.evaluate_at(&position(100.0, 99.0, 29, None), now());
        assert_eq!(verdict.reason, ExitReason::Hold);

        let verdict = engine.evaluate_at(&position(100.0, 104.0, 60, None), now());
        assert!(matches!(verdict.reason, ExitReason::StaleSmallGain { .. }));
        assert_eq!(
            verdict.reason.to_string(),
            "Held 60+ days with 3%+ profit (Held: 60 days, Return: 4.00%)"
        );

        let verdict = engine.evaluate_at(&position(100.0, 102.9, 60, None), now());
        assert_eq!(verdict.reason, ExitReason::Hold);
    }

    #[test]
    fn test_long_term_cleanup_is_shadowed_by_stale_loss() {
        // Any loss at 90+ days already matches the 30-day stale loss rule first
        let engine = ExitDecisionEngine::new();
        let verdict = engine.evaluate_at(&position(100.0, 99.0, 95, Some("Long-term")), now());
        assert!(matches!(verdict.reason, ExitReason::StaleLoss { .. }));

        let policy = ExitPolicy { stale_loss_days: 365, ..Default::default() };
        let verdict = ExitDecisionEngine::with_policy(policy)
            .evaluate_at(&position(100.0, 99.0, 95, Some("Long-term")), now());
        assert!(matches!(verdict.reason, ExitReason::LongTermCleanup { days: 95, .. }));
    }

    #[test]
    fn test_zero_buy_price_does_not_divide() {
        let verdict = ExitDecisionEngine::new().evaluate_at(&position(0.0, 50_000.0, 5, None), now());
        assert_eq!(verdict.profit_rate, 0.0);
        assert!(!verdict.should_sell);

        let mut record = position(0.0, 50_000.0, 5, None);
        record.target_price = 40_000.0;
        let verdict = ExitDecisionEngine::new().evaluate_at(&record, now());
        assert!(matches!(verdict.reason, ExitReason::TargetReached { .. }));
    }

    #[test]
    fn test_bad_buy_date_degrades_to_zero_days() {
        let mut record = position(100.0, 99.0, 40, None);
        record.buy_date = "last tuesday".to_string();

        let verdict = ExitDecisionEngine::new().evaluate_at(&record, now());
        assert_eq!(verdict.days_passed, 0);
        assert_eq!(verdict.reason, ExitReason::Hold);
    }

    #[test]
    fn test_malformed_scenario_uses_medium_term() {
        let mut record = position(100.0, 106.0, 16, None);
        record.scenario = ScenarioSource::Text("{\"investment_period\": \"Short-term\"".to_string());

        let verdict = ExitDecisionEngine::new().evaluate_at(&record, now());
        assert!(!verdict.should_sell);
    }

    #[test]
    fn test_non_finite_price_is_analysis_error() {
        let record = position(100.0, f64::NAN, 5, None);
        let verdict = ExitDecisionEngine::new().evaluate_at(&record, now());
        assert_eq!(verdict.as_decision(), (false, "Analysis error".to_string()));
    }

    #[test]
    fn test_holding_days_truncate() {
        let bought = (now() - Duration::hours(47)).format(TIMESTAMP_FORMAT).to_string();
        assert_eq!(calculate_holding_days(&bought, now()), 1);
        assert_eq!(calculate_holding_days("2026-13-01 00:00:00", now()), 0);

        let future = (now() + Duration::days(3)).format(TIMESTAMP_FORMAT).to_string();
        assert_eq!(calculate_holding_days(&future, now()), 0);
    }

    #[test]
    fn test_calculate_profit_rate() {
        assert_eq!(calculate_profit_rate(100.0, 110.0), 10.0);
        assert_eq!(calculate_profit_rate(0.0, 110.0), 0.0);
        assert_eq!(calculate_profit_rate(-5.0, 110.0), 0.0);
    }
}
