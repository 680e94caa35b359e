//! 🗄️ Tracking Store
//!
//! Read-only aggregate queries against the SQLite performance-tracking database.
//! Each query stands alone so the aggregator can degrade one statistic at a time.

use std::cmp::Ordering;
use std::path::Path;

use anyhow::{Context, Result};
use log::info;
use rusqlite::{params, Connection, OpenFlags};

use super::schema::MarketSchema;

/// Count and a representative return (%) of skipped signals
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SignalSummary {
    pub count: u64,
    /// Average (avoided losses) or best (missed opportunities) return in percent
    pub return_pct: Option<f64>,
}

/// Completed observations and wins for one trigger type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerStatistic {
    pub trigger_type: String,
    pub completed: u64,
    pub wins: u64,
}

impl TriggerStatistic {
    /// Win rate in percent
    pub fn win_rate(&self) -> f64 {
        if self.completed == 0 {
            return 0.0;
        }
        self.wins as f64 / self.completed as f64 * 100.0
    }

    /// Exact win-rate comparison (cross-multiplied, no float rounding)
    pub fn cmp_win_rate(&self, other: &TriggerStatistic) -> Ordering {
        let lhs = self.wins as u128 * other.completed as u128;
        let rhs = other.wins as u128 * self.completed as u128;
        lhs.cmp(&rhs)
    }
}

/// Queries the aggregator needs from the tracking store
pub trait TrackingStore {
    /// Untraded completed signals updated since `since` whose return fell below `threshold_pct`
    fn avoided_losses(&self, schema: &MarketSchema, since: &str, threshold_pct: f64) -> Result<SignalSummary>;

    /// Untraded completed signals updated since `since` whose return exceeded `threshold_pct`
    fn missed_opportunities(&self, schema: &MarketSchema, since: &str, threshold_pct: f64) -> Result<SignalSummary>;

    /// Per trigger type totals over all time, for types with at least `min_completed` completions
    fn trigger_statistics(&self, schema: &MarketSchema, min_completed: u64) -> Result<Vec<TriggerStatistic>>;

    /// Active principles created since `since`
    fn new_principles(&self, table: &str, since: &str) -> Result<u64>;

    /// All active principles
    fn active_principles(&self, table: &str) -> Result<u64>;
}

/// SQLite-backed tracking store
pub struct SqliteTrackingStore {
    conn: Connection,
}

impl SqliteTrackingStore {
    /// Open an existing database read-only; fails if it's missing or unreadable
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .with_context(|| format!("Failed to open tracking database {}", path.display()))?;

        let store = Self::from_connection(conn);
        store.check_readable()?;
        info!("✅ Tracking store: Connected ({})", path.display());
        Ok(store)
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    fn check_readable(&self) -> Result<()> {
        self.conn
            .query_row("SELECT COUNT(*) FROM sqlite_master", [], |row| row.get::<_, i64>(0))
            .context("Tracking database is not readable")?;
        Ok(())
    }

    fn skipped_signals(
        &self,
        schema: &MarketSchema,
        aggregate: &str,
        comparison: &str,
        since: &str,
        threshold_pct: f64,
    ) -> Result<SignalSummary> {
        let sql = format!(
            "SELECT COUNT(*), {aggregate}({ret} * 100)
             FROM {table}
             WHERE {completed}
               AND was_traded = 0
               AND {ret} {comparison} ?1
               AND {updated} >= ?2",
            aggregate = aggregate,
            ret = schema.return_column,
            table = schema.table,
            completed = schema.completed_predicate,
            comparison = comparison,
            updated = schema.updated_column,
        );

        let (count, return_pct) = self
            .conn
            .query_row(&sql, params![threshold_pct / 100.0, since], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, Option<f64>>(1)?))
            })
            .with_context(|| format!("Query on {} failed", schema.table))?;

        Ok(SignalSummary {
            count: count.max(0) as u64,
            return_pct,
        })
    }
}

impl TrackingStore for SqliteTrackingStore {
    fn avoided_losses(&self, schema: &MarketSchema, since: &str, threshold_pct: f64) -> Result<SignalSummary> {
        self.skipped_signals(schema, "AVG", "<", since, threshold_pct)
    }

    fn missed_opportunities(&self, schema: &MarketSchema, since: &str, threshold_pct: f64) -> Result<SignalSummary> {
        self.skipped_signals(schema, "MAX", ">", since, threshold_pct)
    }

    fn trigger_statistics(&self, schema: &MarketSchema, min_completed: u64) -> Result<Vec<TriggerStatistic>> {
        let sql = format!(
            "SELECT
                trigger_type,
                SUM(CASE WHEN {completed} THEN 1 ELSE 0 END) AS completed,
                SUM(CASE WHEN {completed} AND {ret} > 0 THEN 1 ELSE 0 END) AS wins
             FROM {table}
             WHERE trigger_type IS NOT NULL
             GROUP BY trigger_type
             HAVING completed >= ?1",
            completed = schema.completed_predicate,
            ret = schema.return_column,
            table = schema.table,
        );

        let mut stmt = self
            .conn
            .prepare(&sql)
            .with_context(|| format!("Trigger query on {} failed", schema.table))?;

        let rows = stmt.query_map(params![min_completed as i64], |row| {
            Ok(TriggerStatistic {
                trigger_type: row.get(0)?,
                completed: row.get::<_, i64>(1)?.max(0) as u64,
                wins: row.get::<_, i64>(2)?.max(0) as u64,
            })
        })?;

        let mut stats = Vec::new();
        for row in rows {
            stats.push(row?);
        }
        Ok(stats)
    }

    fn new_principles(&self, table: &str, since: &str) -> Result<u64> {
        let sql = format!("SELECT COUNT(*) FROM {} WHERE is_active = 1 AND created_at >= ?1", table);
        let count: i64 = self
            .conn
            .query_row(&sql, params![since], |row| row.get(0))
            .with_context(|| format!("Query on {} failed", table))?;
        Ok(count.max(0) as u64)
    }

    fn active_principles(&self, table: &str) -> Result<u64> {
        let sql = format!("SELECT COUNT(*) FROM {} WHERE is_active = 1", table);
        let count: i64 = self
            .conn
            .query_row(&sql, [], |row| row.get(0))
            .with_context(|| format!("Query on {} failed", table))?;
        Ok(count.max(0) as u64)
    }
}
