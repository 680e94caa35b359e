//! 📄 Position Record
//!
//! One buy-to-sell lifecycle of a single ticker, as handed over by the upstream
//! analysis process. Every field that originates from loosely structured text
//! (prices, the scenario blob) is parsed leniently: bad input degrades to a
//! zero/absent value and a warning, never to a deserialization failure.

use log::{debug, warn};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::market::Market;

/// Timestamp format used for `buy_date` and the tracking store columns
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Investment horizon attached to a position by its scenario
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum InvestmentPeriod {
    ShortTerm,
    #[default]
    MediumTerm,
    LongTerm,
}

impl InvestmentPeriod {
    pub fn label(&self) -> &'static str {
        match self {
            InvestmentPeriod::ShortTerm => "Short-term",
            InvestmentPeriod::MediumTerm => "Medium-term",
            InvestmentPeriod::LongTerm => "Long-term",
        }
    }

    /// Parse a horizon label ("Short-term", "short term", "LONG_TERM", ...)
    pub fn parse_label(label: &str) -> Option<Self> {
        let normalized: String = label
            .chars()
            .filter(|c| c.is_ascii_alphabetic())
            .map(|c| c.to_ascii_lowercase())
            .collect();

        match normalized.as_str() {
            "short" | "shortterm" => Some(InvestmentPeriod::ShortTerm),
            "medium" | "mediumterm" | "mid" | "midterm" => Some(InvestmentPeriod::MediumTerm),
            "long" | "longterm" => Some(InvestmentPeriod::LongTerm),
            _ => None,
        }
    }
}

impl std::fmt::Display for InvestmentPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Why a scenario could not be resolved
#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("scenario is missing")]
    Missing,
    #[error("scenario is not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("scenario is not a JSON object")]
    NotAnObject,
}

/// Scenario as it arrives on a record: absent, raw text, or already-structured JSON
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ScenarioSource {
    #[default]
    Absent,
    Text(String),
    Json(Value),
}

impl ScenarioSource {
    /// Parse the source into a structured scenario
    pub fn resolve(&self) -> Result<Scenario, ScenarioError> {
        match self {
            ScenarioSource::Absent => Err(ScenarioError::Missing),
            ScenarioSource::Text(text) if text.trim().is_empty() => Err(ScenarioError::Missing),
            ScenarioSource::Text(text) => {
                let value: Value = serde_json::from_str(text)?;
                Scenario::from_value(value)
            }
            ScenarioSource::Json(value) => Scenario::from_value(value.clone()),
        }
    }
}

impl From<Option<Value>> for ScenarioSource {
    fn from(value: Option<Value>) -> Self {
        match value {
            None | Some(Value::Null) => ScenarioSource::Absent,
            Some(Value::String(text)) => ScenarioSource::Text(text),
            Some(other) => ScenarioSource::Json(other),
        }
    }
}

impl From<ScenarioSource> for Option<Value> {
    fn from(source: ScenarioSource) -> Self {
        match source {
            ScenarioSource::Absent => None,
            ScenarioSource::Text(text) => Some(Value::String(text)),
            ScenarioSource::Json(value) => Some(value),
        }
    }
}

impl Serialize for ScenarioSource {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        Option::<Value>::from(self.clone()).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ScenarioSource {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Option::<Value>::deserialize(deserializer)?.into())
    }
}

/// Analysis scenario behind a buy decision
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default, deserialize_with = "lenient_price")]
    pub target_price: Option<f64>,
    #[serde(default, deserialize_with = "lenient_price")]
    pub stop_loss: Option<f64>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub investment_period: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub sector: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub valuation_analysis: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub sector_outlook: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub rationale: Option<String>,
    #[serde(default, deserialize_with = "lenient_trading_scenarios")]
    pub trading_scenarios: Option<TradingScenarios>,
}

impl Scenario {
    fn from_value(value: Value) -> Result<Self, ScenarioError> {
        if !value.is_object() {
            return Err(ScenarioError::NotAnObject);
        }
        Ok(serde_json::from_value(value)?)
    }

    /// Resolved horizon; unknown or missing labels fall back to Medium-term
    pub fn investment_period(&self) -> InvestmentPeriod {
        match self.investment_period.as_deref() {
            None => InvestmentPeriod::default(),
            Some(label) => InvestmentPeriod::parse_label(label).unwrap_or_else(|| {
                warn!("⚠️  Unknown investment period '{}', using Medium-term", label);
                InvestmentPeriod::default()
            }),
        }
    }
}

/// Structured trading plan attached to a scenario
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TradingScenarios {
    #[serde(default, deserialize_with = "lenient_key_levels")]
    pub key_levels: Option<KeyLevels>,
    #[serde(default, deserialize_with = "lenient_text_list")]
    pub sell_triggers: Vec<String>,
    #[serde(default, deserialize_with = "lenient_text_list")]
    pub hold_conditions: Vec<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub portfolio_context: Option<String>,
}

impl TradingScenarios {
    pub fn is_empty(&self) -> bool {
        self.key_levels.as_ref().map_or(true, KeyLevels::is_empty)
            && self.sell_triggers.is_empty()
            && self.hold_conditions.is_empty()
            && self.portfolio_context.is_none()
    }
}

/// Support/resistance levels around the buy price
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeyLevels {
    #[serde(default, deserialize_with = "lenient_price")]
    pub primary_resistance: Option<f64>,
    #[serde(default, deserialize_with = "lenient_price")]
    pub secondary_resistance: Option<f64>,
    #[serde(default, deserialize_with = "lenient_price")]
    pub primary_support: Option<f64>,
    #[serde(default, deserialize_with = "lenient_price")]
    pub secondary_support: Option<f64>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub volume_baseline: Option<String>,
}

impl KeyLevels {
    pub fn is_empty(&self) -> bool {
        self.primary_resistance.is_none()
            && self.secondary_resistance.is_none()
            && self.primary_support.is_none()
            && self.secondary_support.is_none()
            && self.volume_baseline.is_none()
    }
}

/// Snapshot of one open (or closed) position
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PositionRecord {
    pub ticker: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub company_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_market")]
    pub market: Market,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub buy_price: f64,
    /// `YYYY-MM-DD HH:MM:SS`, kept raw so a bad value degrades in the engine
    #[serde(default, deserialize_with = "lenient_date")]
    pub buy_date: String,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub current_price: f64,
    /// 0 = not set
    #[serde(default, deserialize_with = "lenient_amount")]
    pub target_price: f64,
    /// 0 = not set
    #[serde(default, deserialize_with = "lenient_amount")]
    pub stop_loss: f64,
    #[serde(default)]
    pub scenario: ScenarioSource,
}

impl PositionRecord {
    /// Name shown in notifications, falling back to the ticker
    pub fn display_name(&self) -> &str {
        self.company_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(&self.ticker)
    }

    /// Horizon from the scenario; Medium-term when it can't be determined
    pub fn investment_period(&self) -> InvestmentPeriod {
        match self.scenario.resolve() {
            Ok(scenario) => scenario.investment_period(),
            Err(ScenarioError::Missing) => {
                debug!("{}: no scenario, using Medium-term", self.ticker);
                InvestmentPeriod::default()
            }
            Err(e) => {
                warn!("⚠️  {}: {} - using Medium-term", self.ticker, e);
                InvestmentPeriod::default()
            }
        }
    }
}

/// Extract a price from a number or free text such as `"12,500 KRW"` or `"12,000~12,500"`
///
/// The first numeric run in the text wins.
pub fn parse_price_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        Value::String(s) => parse_price_text(s),
        _ => None,
    }
}

/// A `-` directly before the first digit keeps the value negative
pub fn parse_price_text(text: &str) -> Option<f64> {
    let cleaned: String = text.chars().filter(|c| *c != ',').collect();
    let start = cleaned.find(|c: char| c.is_ascii_digit())?;
    let negative = cleaned[..start].ends_with('-');

    let mut number = String::new();
    let mut seen_dot = false;
    for c in cleaned[start..].chars() {
        if c.is_ascii_digit() {
            number.push(c);
        } else if c == '.' && !seen_dot {
            seen_dot = true;
            number.push(c);
        } else {
            break;
        }
    }

    number
        .trim_end_matches('.')
        .parse::<f64>()
        .ok()
        .map(|v| if negative { -v } else { v })
}

fn lenient_amount<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    let value = Value::deserialize(deserializer)?;
    if value.is_null() {
        return Ok(0.0);
    }
    Ok(parse_price_value(&value).unwrap_or_else(|| {
        warn!("⚠️  Non-numeric price {} treated as 0", value);
        0.0
    }))
}

/// Price levels of 0 mean "not provided"
fn lenient_price<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(parse_price_value(&value).filter(|v| *v > 0.0))
}

fn value_to_text(value: Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn lenient_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(value_to_text(Value::deserialize(deserializer)?))
}

/// Unparsable dates are left for the engine to degrade; non-text becomes its text form or empty
fn lenient_date<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let value = Value::deserialize(deserializer)?;
    if !value.is_null() && !value.is_string() {
        warn!("⚠️  Non-text buy date {} kept as raw text", value);
    }
    Ok(value_to_text(value).unwrap_or_default())
}

/// Unknown markets fall back to the domestic market
fn lenient_market<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Market, D::Error> {
    let value = Value::deserialize(deserializer)?;
    if value.is_null() {
        return Ok(Market::default());
    }
    let normalized = match &value {
        Value::String(s) => Value::String(s.trim().to_lowercase()),
        other => other.clone(),
    };
    Ok(serde_json::from_value::<Market>(normalized).unwrap_or_else(|_| {
        warn!("⚠️  Unknown market {}, using {}", value, Market::default().as_str());
        Market::default()
    }))
}

fn lenient_text_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    let items = match Value::deserialize(deserializer)? {
        Value::Array(items) => items.into_iter().filter_map(value_to_text).collect(),
        other => value_to_text(other).into_iter().collect(),
    };
    Ok(items)
}

fn lenient_key_levels<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<KeyLevels>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    if !value.is_object() {
        return Ok(None);
    }
    Ok(serde_json::from_value::<KeyLevels>(value)
        .ok()
        .filter(|levels| !levels.is_empty()))
}

fn lenient_trading_scenarios<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<TradingScenarios>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    if !value.is_object() {
        return Ok(None);
    }
    Ok(serde_json::from_value::<TradingScenarios>(value).ok())
}
