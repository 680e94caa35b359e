//! 🎯 Trigger Reliability Aggregator
//!
//! Scans the tracking store for both markets over a trailing window and
//! summarizes how the signals that opened (or were skipped as) positions
//! actually played out. Every statistic fails soft: a store error yields that
//! statistic's default and a warning, and the rest of the run continues.

use std::cmp::Ordering;

use anyhow::Result;
use chrono::{Duration, NaiveDateTime};
use log::{info, warn};

use super::schema::{MarketSchema, DOMESTIC_SCHEMA, US_SCHEMA};
use super::store::{SignalSummary, TrackingStore, TriggerStatistic};
use crate::market::Market;
use crate::position::TIMESTAMP_FORMAT;

/// Untraded signals whose return fell below this (%) count as avoided losses
pub const AVOIDED_LOSS_THRESHOLD_PCT: f64 = -5.0;
/// Untraded signals whose return exceeded this (%) count as missed opportunities
pub const MISSED_GAIN_THRESHOLD_PCT: f64 = 10.0;
/// Minimum completed observations before a trigger type can be ranked
pub const MIN_TRIGGER_OBSERVATIONS: u64 = 3;
pub const DEFAULT_WINDOW_DAYS: i64 = 7;

#[derive(Debug, Clone, PartialEq)]
pub struct AggregationConfig {
    pub window_days: i64,
    pub min_observations: u64,
    pub avoided_loss_threshold_pct: f64,
    pub missed_gain_threshold_pct: f64,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            window_days: DEFAULT_WINDOW_DAYS,
            min_observations: MIN_TRIGGER_OBSERVATIONS,
            avoided_loss_threshold_pct: AVOIDED_LOSS_THRESHOLD_PCT,
            missed_gain_threshold_pct: MISSED_GAIN_THRESHOLD_PCT,
        }
    }
}

/// Principle counts (domestic market only)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PrincipleCounts {
    pub new_in_window: u64,
    pub total_active: u64,
}

/// One market's statistics for the window
#[derive(Debug, Clone, PartialEq)]
pub struct MarketInsight {
    pub market: Market,
    pub avoided_losses: SignalSummary,
    pub missed_opportunities: SignalSummary,
    /// Best trigger over all time; `None` if no type has enough observations
    pub best_trigger: Option<TriggerStatistic>,
    /// `None` when the market doesn't track principles
    pub principles: Option<PrincipleCounts>,
}

/// Both markets' statistics for one window
#[derive(Debug, Clone, PartialEq)]
pub struct WeeklyDigest {
    pub window_start: NaiveDateTime,
    pub window_end: NaiveDateTime,
    pub domestic: MarketInsight,
    pub us: MarketInsight,
}

impl WeeklyDigest {
    /// Best trigger across markets; ties go to the domestic market
    pub fn overall_best(&self) -> Option<(Market, &TriggerStatistic)> {
        let domestic = self.domestic.best_trigger.as_ref().map(|t| (Market::Domestic, t));
        let us = self.us.best_trigger.as_ref().map(|t| (Market::Us, t));

        match (domestic, us) {
            (Some(d), Some(u)) => {
                if u.1.cmp_win_rate(d.1) == Ordering::Greater {
                    Some(u)
                } else {
                    Some(d)
                }
            }
            (d, u) => d.or(u),
        }
    }

    /// One-line takeaway for the report
    pub fn narrative(&self) -> String {
        match self.overall_best() {
            Some((market, trigger)) => format!(
                "{} trigger in the {} remains the most reliable ({:.0}% win rate)",
                trigger.trigger_type,
                market.display_name(),
                trigger.win_rate()
            ),
            None => "Still accumulating data, insights coming soon".to_string(),
        }
    }

    pub fn markets(&self) -> [&MarketInsight; 2] {
        [&self.domestic, &self.us]
    }
}

/// Highest win rate wins; equal rates fall back to the lexicographically smallest trigger type
pub fn select_best_trigger(stats: Vec<TriggerStatistic>, min_observations: u64) -> Option<TriggerStatistic> {
    stats
        .into_iter()
        .filter(|s| s.completed >= min_observations && s.completed > 0)
        .fold(None, |best: Option<TriggerStatistic>, candidate| match best {
            None => Some(candidate),
            Some(current) => match candidate.cmp_win_rate(&current) {
                Ordering::Greater => Some(candidate),
                Ordering::Equal if candidate.trigger_type < current.trigger_type => Some(candidate),
                _ => Some(current),
            },
        })
}

pub struct TriggerReliabilityAggregator<'a, S: TrackingStore> {
    store: &'a S,
    config: AggregationConfig,
}

impl<'a, S: TrackingStore> TriggerReliabilityAggregator<'a, S> {
    pub fn new(store: &'a S, config: AggregationConfig) -> Self {
        Self { store, config }
    }

    /// Aggregate both markets for the window ending at `now`
    pub fn aggregate_at(&self, now: NaiveDateTime) -> WeeklyDigest {
        let window_start = self.window_start(now);
        let since = window_start.format(TIMESTAMP_FORMAT).to_string();

        info!("📊 Aggregating trigger reliability since {}", since);

        WeeklyDigest {
            window_start,
            window_end: now,
            domestic: self.aggregate_market(&DOMESTIC_SCHEMA, &since),
            us: self.aggregate_market(&US_SCHEMA, &since),
        }
    }

    /// Start of the trailing window; an out-of-range window falls back to the default length
    fn window_start(&self, now: NaiveDateTime) -> NaiveDateTime {
        Duration::try_days(self.config.window_days)
            .and_then(|window| now.checked_sub_signed(window))
            .unwrap_or_else(|| {
                warn!(
                    "⚠️  Window of {} days is out of range, using {} days",
                    self.config.window_days, DEFAULT_WINDOW_DAYS
                );
                now - Duration::days(DEFAULT_WINDOW_DAYS)
            })
    }

    /// Aggregate one market; `since` is a `YYYY-MM-DD HH:MM:SS` lower bound on update time
    pub fn aggregate_market(&self, schema: &MarketSchema, since: &str) -> MarketInsight {
        let market = schema.market;

        let avoided_losses = fail_soft(
            market,
            "avoided losses",
            self.store
                .avoided_losses(schema, since, self.config.avoided_loss_threshold_pct),
        );

        let missed_opportunities = fail_soft(
            market,
            "missed opportunities",
            self.store
                .missed_opportunities(schema, since, self.config.missed_gain_threshold_pct),
        );

        let best_trigger = select_best_trigger(
            fail_soft(
                market,
                "trigger statistics",
                self.store.trigger_statistics(schema, self.config.min_observations),
            ),
            self.config.min_observations,
        );

        let principles = schema.principles_table.map(|table| PrincipleCounts {
            new_in_window: fail_soft(market, "new principles", self.store.new_principles(table, since)),
            total_active: fail_soft(market, "active principles", self.store.active_principles(table)),
        });

        let insight = MarketInsight {
            market,
            avoided_losses,
            missed_opportunities,
            best_trigger,
            principles,
        };

        info!(
            "📊 {}: avoided {}, missed {}, best trigger {}",
            market.as_str(),
            insight.avoided_losses.count,
            insight.missed_opportunities.count,
            insight
                .best_trigger
                .as_ref()
                .map(|t| format!("{} ({:.0}%)", t.trigger_type, t.win_rate()))
                .unwrap_or_else(|| "none".to_string())
        );

        insight
    }
}

fn fail_soft<T: Default>(market: Market, statistic: &str, result: Result<T>) -> T {
    result.unwrap_or_else(|e| {
        warn!("⚠️  {} {} query failed: {:#}", market.as_str(), statistic, e);
        T::default()
    })
}
