//! 📊 Holdings Monitor - Run exit checks over all open positions
//!
//! Holds the current snapshot of every open position, accepts price refreshes,
//! and evaluates each position once per polling cycle.

use std::collections::BTreeMap;

use chrono::{Local, NaiveDateTime};
use log::{info, warn};

use super::exit_rules::{ExitDecisionEngine, ExitVerdict};
use crate::position::PositionRecord;

/// Verdict for one position in a cycle
#[derive(Debug, Clone)]
pub struct PositionCheck {
    pub record: PositionRecord,
    pub verdict: ExitVerdict,
}

/// Result of one polling cycle
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    pub checks: Vec<PositionCheck>,
}

impl CycleReport {
    /// Positions the engine wants to exit
    pub fn sells(&self) -> impl Iterator<Item = &PositionCheck> {
        self.checks.iter().filter(|c| c.verdict.should_sell)
    }

    pub fn sell_count(&self) -> usize {
        self.sells().count()
    }
}

/// Open positions keyed by ticker
pub struct HoldingsMonitor {
    engine: ExitDecisionEngine,
    positions: BTreeMap<String, PositionRecord>,
}

impl HoldingsMonitor {
    pub fn new(engine: ExitDecisionEngine) -> Self {
        Self {
            engine,
            positions: BTreeMap::new(),
        }
    }

    /// Add or replace a position
    pub fn upsert(&mut self, record: PositionRecord) {
        if self.positions.contains_key(&record.ticker) {
            warn!("⚠️  Replacing existing position for {}", record.ticker);
        }
        self.positions.insert(record.ticker.clone(), record);
    }

    /// Refresh the current price of a held ticker; false if it isn't held
    pub fn update_price(&mut self, ticker: &str, current_price: f64) -> bool {
        match self.positions.get_mut(ticker) {
            Some(record) => {
                record.current_price = current_price;
                true
            }
            None => false,
        }
    }

    /// Remove a position (after exit)
    pub fn remove(&mut self, ticker: &str) -> Option<PositionRecord> {
        self.positions.remove(ticker)
    }

    pub fn count(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Evaluate every position against the local wall clock
    pub fn run_cycle(&self) -> CycleReport {
        self.run_cycle_at(Local::now().naive_local())
    }

    /// Evaluate every position as of `now`
    pub fn run_cycle_at(&self, now: NaiveDateTime) -> CycleReport {
        let checks: Vec<PositionCheck> = self
            .positions
            .values()
            .map(|record| PositionCheck {
                verdict: self.engine.evaluate_at(record, now),
                record: record.clone(),
            })
            .collect();

        let report = CycleReport { checks };
        info!(
            "📊 Exit check cycle: {} positions, {} to sell",
            report.checks.len(),
            report.sell_count()
        );
        report
    }
}
