//! 🌏 Market definitions
//!
//! The two markets positions are tracked in, and how prices in each are rendered.

use serde::{Deserialize, Serialize};

/// Market a position or tracking table belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Market {
    /// Korean exchange, prices in KRW
    #[default]
    #[serde(alias = "kr", alias = "korea")]
    Domestic,
    /// US exchanges, prices in USD
    #[serde(alias = "usa")]
    Us,
}

impl Market {
    pub fn as_str(&self) -> &'static str {
        match self {
            Market::Domestic => "domestic",
            Market::Us => "us",
        }
    }

    /// Display name used in report sections
    pub fn display_name(&self) -> &'static str {
        match self {
            Market::Domestic => "Korean Market",
            Market::Us => "US Market",
        }
    }

    pub fn flag(&self) -> &'static str {
        match self {
            Market::Domestic => "🇰🇷",
            Market::Us => "🇺🇸",
        }
    }

    /// Render a price with the market's currency convention
    ///
    /// KRW has no minor unit, so domestic prices are whole numbers.
    pub fn format_price(&self, value: f64) -> String {
        match self {
            Market::Domestic => format!("{} KRW", group_thousands(value, 0)),
            Market::Us => format!("${}", group_thousands(value, 2)),
        }
    }
}

/// Format a number with `,` thousands separators and a fixed number of decimals
pub fn group_thousands(value: f64, decimals: usize) -> String {
    if !value.is_finite() {
        return value.to_string();
    }

    let formatted = format!("{:.*}", decimals, value.abs());
    let (int_part, frac_part) = match formatted.split_once('.') {
        Some((int_part, frac_part)) => (int_part, Some(frac_part)),
        None => (formatted.as_str(), None),
    };

    let mut grouped = String::with_capacity(formatted.len() + int_part.len() / 3 + 1);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if let Some(frac) = frac_part {
        grouped.push('.');
        grouped.push_str(frac);
    }

    // Don't print "-0" for values that round to zero
    let is_zero = formatted.chars().all(|c| c == '0' || c == '.');
    if value < 0.0 && !is_zero {
        format!("-{}", grouped)
    } else {
        grouped
    }
}
