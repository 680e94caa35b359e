//! 💬 Notification Messages
//!
//! Pure rendering of buy/sell decisions into chat-ready text. Every optional
//! field is rendered only when present; missing numbers render as 0.

use log::warn;

use crate::decision_engine::ExitVerdict;
use crate::market::Market;
use crate::position::{KeyLevels, PositionRecord, Scenario, TradingScenarios};

const SECTION_RULE_WIDTH: usize = 40;

/// Everything needed to announce a new buy
#[derive(Debug, Clone)]
pub struct BuyNotice<'a> {
    pub company_name: &'a str,
    pub ticker: &'a str,
    pub market: Market,
    pub current_price: f64,
    pub scenario: &'a Scenario,
    /// Trading-value rank change commentary, if any
    pub rank_change: Option<&'a str>,
}

/// Everything needed to announce a completed sell
#[derive(Debug, Clone)]
pub struct SellNotice<'a> {
    pub company_name: &'a str,
    pub ticker: &'a str,
    pub market: Market,
    pub buy_price: f64,
    pub sell_price: f64,
    pub profit_rate: f64,
    pub holding_days: i64,
    pub sell_reason: &'a str,
}

pub fn format_buy_message(notice: &BuyNotice<'_>) -> String {
    let scenario = notice.scenario;
    let market = notice.market;

    let mut message = format!(
        "📈 New Buy: {}({})\n\
         Buy Price: {}\n\
         Target Price: {}\n\
         Stop Loss: {}\n\
         Investment Period: {}\n\
         Sector: {}\n",
        notice.company_name,
        notice.ticker,
        market.format_price(notice.current_price),
        market.format_price(scenario.target_price.unwrap_or(0.0)),
        market.format_price(scenario.stop_loss.unwrap_or(0.0)),
        scenario.investment_period(),
        scenario.sector.as_deref().unwrap_or("Unknown"),
    );

    if let Some(valuation) = &scenario.valuation_analysis {
        message.push_str(&format!("Valuation: {}\n", valuation));
    }
    if let Some(outlook) = &scenario.sector_outlook {
        message.push_str(&format!("Sector Outlook: {}\n", outlook));
    }
    if let Some(rank_change) = notice.rank_change.filter(|s| !s.trim().is_empty()) {
        message.push_str(&format!("Trading Value Analysis: {}\n", rank_change));
    }

    message.push_str(&format!(
        "Rationale: {}\n",
        scenario.rationale.as_deref().unwrap_or("No information")
    ));

    if let Some(trading) = scenario.trading_scenarios.as_ref().filter(|t| !t.is_empty()) {
        message.push_str(&format_trading_scenarios(trading, market, notice.current_price));
    }

    message
}

/// Buy message straight from a record; an unreadable scenario renders as empty
pub fn format_buy_message_for(record: &PositionRecord, rank_change: Option<&str>) -> String {
    let scenario = record.scenario.resolve().unwrap_or_else(|e| {
        warn!("⚠️  {}: {} - rendering buy message without scenario", record.ticker, e);
        Scenario::default()
    });

    format_buy_message(&BuyNotice {
        company_name: record.display_name(),
        ticker: &record.ticker,
        market: record.market,
        current_price: record.current_price,
        scenario: &scenario,
        rank_change,
    })
}

fn format_trading_scenarios(trading: &TradingScenarios, market: Market, current_price: f64) -> String {
    let rule = "=".repeat(SECTION_RULE_WIDTH);
    let mut message = format!("\n{rule}\n📋 Trading Scenarios\n{rule}\n\n");

    if let Some(levels) = trading.key_levels.as_ref().filter(|l| !l.is_empty()) {
        message.push_str(&format_key_levels(levels, market, current_price));
    }

    if !trading.sell_triggers.is_empty() {
        message.push_str("🔔 Sell Signals:\n");
        for trigger in &trading.sell_triggers {
            message.push_str(&format!("  {} {}\n", signal_icon(trigger), trigger));
        }
        message.push('\n');
    }

    if !trading.hold_conditions.is_empty() {
        message.push_str("✋ Hold Conditions:\n");
        for condition in &trading.hold_conditions {
            message.push_str(&format!("  • {}\n", condition));
        }
        message.push('\n');
    }

    if let Some(context) = &trading.portfolio_context {
        message.push_str(&format!("💼 Portfolio Perspective:\n  {}\n", context));
    }

    message
}

/// Resistance above (far to near), current price, support below (near to far)
fn format_key_levels(levels: &KeyLevels, market: Market, current_price: f64) -> String {
    let mut message = String::from("💰 Key Price Levels:\n");

    if levels.primary_resistance.is_some() || levels.secondary_resistance.is_some() {
        message.push_str("  📈 Resistance:\n");
        if let Some(level) = levels.secondary_resistance {
            message.push_str(&format!("    • 2nd: {}\n", market.format_price(level)));
        }
        if let Some(level) = levels.primary_resistance {
            message.push_str(&format!("    • 1st: {}\n", market.format_price(level)));
        }
    }

    message.push_str(&format!("  ━━ Current Price: {} ━━\n", market.format_price(current_price)));

    if levels.primary_support.is_some() || levels.secondary_support.is_some() {
        message.push_str("  📉 Support:\n");
        if let Some(level) = levels.primary_support {
            message.push_str(&format!("    • 1st: {}\n", market.format_price(level)));
        }
        if let Some(level) = levels.secondary_support {
            message.push_str(&format!("    • 2nd: {}\n", market.format_price(level)));
        }
    }

    if let Some(baseline) = &levels.volume_baseline {
        message.push_str(&format!("  📊 Volume Baseline: {}\n", baseline));
    }

    message.push('\n');
    message
}

/// Icon for a sell-trigger bullet, picked by keyword
pub fn signal_icon(trigger: &str) -> &'static str {
    let lower = trigger.to_lowercase();

    if contains_any(&lower, &["profit", "target", "resistance"]) {
        "✅"
    } else if contains_any(&lower, &["loss", "support", "drop"]) {
        "⛔"
    } else if contains_any(&lower, &["time", "sideways"]) {
        "⏰"
    } else {
        "•"
    }
}

fn contains_any(text: &str, words: &[&str]) -> bool {
    words.iter().any(|w| text.contains(w))
}

pub fn format_sell_message(notice: &SellNotice<'_>) -> String {
    let arrow = if notice.profit_rate > 0.0 {
        "⬆️"
    } else if notice.profit_rate < 0.0 {
        "⬇️"
    } else {
        "➖"
    };

    format!(
        "📉 Sell: {}({})\n\
         Buy Price: {}\n\
         Sell Price: {}\n\
         Return: {} {:.2}%\n\
         Holding Period: {} days\n\
         Sell Reason: {}",
        notice.company_name,
        notice.ticker,
        notice.market.format_price(notice.buy_price),
        notice.market.format_price(notice.sell_price),
        arrow,
        notice.profit_rate.abs(),
        notice.holding_days,
        notice.sell_reason,
    )
}

/// Sell message for a position the engine decided to exit at its current price
pub fn format_sell_message_for(record: &PositionRecord, verdict: &ExitVerdict) -> String {
    let reason = verdict.reason.to_string();
    format_sell_message(&SellNotice {
        company_name: record.display_name(),
        ticker: &record.ticker,
        market: record.market,
        buy_price: record.buy_price,
        sell_price: record.current_price,
        profit_rate: verdict.profit_rate,
        holding_days: verdict.days_passed,
        sell_reason: &reason,
    })
}

/// Signed one-decimal percentage, or `N/A`
pub fn format_percentage(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:+.1}%", v),
        None => "N/A".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::ScenarioSource;
    use serde_json::json;

    fn scenario(value: serde_json::Value) -> Scenario {
        ScenarioSource::Json(value).resolve().unwrap()
    }

    fn buy(scenario: &Scenario) -> String {
        format_buy_message(&BuyNotice {
            company_name: "Samsung Electronics",
            ticker: "005930",
            market: Market::Domestic,
            current_price: 71_000.0,
            scenario,
            rank_change: None,
        })
    }

    #[test]
    fn test_buy_message_minimal() {
        let message = buy(&Scenario::default());
        assert!(message.starts_with("📈 New Buy: Samsung Electronics(005930)\n"));
        assert!(message.contains("Buy Price: 71,000 KRW\n"));
        assert!(message.contains("Target Price: 0 KRW\n"));
        assert!(message.contains("Stop Loss: 0 KRW\n"));
        assert!(message.contains("Investment Period: Medium-term\n"));
        assert!(message.contains("Sector: Unknown\n"));
        assert!(message.ends_with("Rationale: No information\n"));
        assert!(!message.contains("Valuation"));
        assert!(!message.contains("Trading Value Analysis"));
    }

    #[test]
    fn test_empty_trading_scenarios_omits_section() {
        let message = buy(&scenario(json!({ "trading_scenarios": {} })));
        assert!(!message.contains("Trading Scenarios"));
        assert!(!message.contains("====="));

        let message = buy(&scenario(json!({
            "trading_scenarios": { "key_levels": {}, "sell_triggers": [], "hold_conditions": [] }
        })));
        assert!(!message.contains("Trading Scenarios"));
    }

    #[test]
    fn test_buy_message_full() {
        let s = scenario(json!({
            "target_price": 80000,
            "stop_loss": "66,000",
            "investment_period": "Short-term",
            "sector": "Semiconductors",
            "valuation_analysis": "PER below peers",
            "sector_outlook": "Memory upcycle",
            "rationale": "Breakout on volume",
            "trading_scenarios": {
                "key_levels": {
                    "primary_resistance": 75000,
                    "secondary_resistance": "78,000 KRW",
                    "primary_support": 68000,
                    "secondary_support": 66000,
                    "volume_baseline": "15M shares"
                },
                "sell_triggers": [
                    "Take profit near resistance",
                    "Cut if support breaks",
                    "Exit after 2 weeks sideways",
                    "Foreign selling streak"
                ],
                "hold_conditions": ["Volume above baseline"],
                "portfolio_context": "Adds semiconductor exposure"
            }
        }));

        let message = format_buy_message(&BuyNotice {
            company_name: "Samsung Electronics",
            ticker: "005930",
            market: Market::Domestic,
            current_price: 71_000.0,
            scenario: &s,
            rank_change: Some("Rank 12 → 4"),
        });

        assert!(message.contains("Target Price: 80,000 KRW\n"));
        assert!(message.contains("Stop Loss: 66,000 KRW\n"));
        assert!(message.contains("Investment Period: Short-term\n"));
        assert!(message.contains("Valuation: PER below peers\n"));
        assert!(message.contains("Sector Outlook: Memory upcycle\n"));
        assert!(message.contains("Trading Value Analysis: Rank 12 → 4\n"));
        assert!(message.contains("📋 Trading Scenarios"));

        // Levels read top-down: far resistance, near resistance, price, near support, far support
        let order = [
            "• 2nd: 78,000 KRW",
            "• 1st: 75,000 KRW",
            "━━ Current Price: 71,000 KRW ━━",
            "• 1st: 68,000 KRW",
            "• 2nd: 66,000 KRW",
        ];
        let positions: Vec<usize> = order.iter().map(|s| message.find(s).unwrap()).collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));

        assert!(message.contains("📊 Volume Baseline: 15M shares"));
        assert!(message.contains("  ✅ Take profit near resistance\n"));
        assert!(message.contains("  ⛔ Cut if support breaks\n"));
        assert!(message.contains("  ⏰ Exit after 2 weeks sideways\n"));
        assert!(message.contains("  • Foreign selling streak\n"));
        assert!(message.contains("✋ Hold Conditions:\n  • Volume above baseline\n"));
        assert!(message.contains("💼 Portfolio Perspective:\n  Adds semiconductor exposure\n"));
    }

    #[test]
    fn test_key_levels_without_resistance() {
        let message = buy(&scenario(json!({
            "trading_scenarios": { "key_levels": { "primary_support": 68000 } }
        })));
        assert!(message.contains("💰 Key Price Levels:"));
        assert!(!message.contains("Resistance:"));
        assert!(message.contains("📉 Support:"));
    }

    #[test]
    fn test_signal_icon_priority() {
        // "profit" is checked before "loss"
        assert_eq!(signal_icon("Stop loss or profit target"), "✅");
        assert_eq!(signal_icon("Price DROP below 20MA"), "⛔");
        assert_eq!(signal_icon("Time stop"), "⏰");
        assert_eq!(signal_icon("Earnings release"), "•");
    }

    #[test]
    fn test_sell_message() {
        let notice = SellNotice {
            company_name: "Apple",
            ticker: "AAPL",
            market: Market::Us,
            buy_price: 180.0,
            sell_price: 171.0,
            profit_rate: -5.0,
            holding_days: 12,
            sell_reason: "Loss -5%+ incurred (Current return: -5.00%)",
        };
        let message = format_sell_message(&notice);
        assert_eq!(
            message,
            "📉 Sell: Apple(AAPL)\n\
             Buy Price: $180.00\n\
             Sell Price: $171.00\n\
             Return: ⬇️ 5.00%\n\
             Holding Period: 12 days\n\
             Sell Reason: Loss -5%+ incurred (Current return: -5.00%)"
        );

        let flat = format_sell_message(&SellNotice { profit_rate: 0.0, ..notice.clone() });
        assert!(flat.contains("Return: ➖ 0.00%"));
        let up = format_sell_message(&SellNotice { profit_rate: 3.2, ..notice });
        assert!(up.contains("Return: ⬆️ 3.20%"));
    }

    #[test]
    fn test_buy_message_for_bad_scenario() {
        let record = PositionRecord {
            ticker: "000660".to_string(),
            current_price: 120_000.0,
            scenario: ScenarioSource::Text("oops".to_string()),
            ..Default::default()
        };
        let message = format_buy_message_for(&record, None);
        assert!(message.starts_with("📈 New Buy: 000660(000660)"));
        assert!(message.contains("Rationale: No information"));
    }

    #[test]
    fn test_format_percentage() {
        assert_eq!(format_percentage(Some(-7.345)), "-7.3%");
        assert_eq!(format_percentage(Some(12.0)), "+12.0%");
        assert_eq!(format_percentage(None), "N/A");
    }
}
