//! Configuration management for the stock tracker
//!
//! Loads configuration from environment variables (via .env file) and provides
//! validated, type-safe access to all service parameters.

use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::decision_engine::exit_rules::{self, ExitPolicy};
use crate::insight::aggregator::{self, AggregationConfig};

/// Upper bound on INSIGHT_WINDOW_DAYS (ten years)
const MAX_WINDOW_DAYS: i64 = 3650;

/// Complete configuration for the tracker
#[derive(Debug, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub telegram: TelegramConfig,
    pub insight: InsightConfig,
    pub exit: ExitConfig,
    pub logging: LoggingConfig,
    /// Print reports instead of dispatching them
    pub dry_run: bool,
}

/// Tracking store location
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// SQLite file holding both markets' performance trackers
    pub tracking_db_path: PathBuf,
}

/// Notification credentials; empty values disable dispatch
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub channel_id: String,
}

impl TelegramConfig {
    pub fn is_configured(&self) -> bool {
        !self.bot_token.trim().is_empty() && !self.channel_id.trim().is_empty()
    }
}

/// Weekly aggregation parameters
#[derive(Debug, Clone)]
pub struct InsightConfig {
    /// Trailing window in days
    pub window_days: i64,
    /// Completed observations a trigger type needs before it can be ranked
    pub min_trigger_observations: u64,
    pub avoided_loss_threshold_pct: f64,
    pub missed_gain_threshold_pct: f64,
}

/// Exit rule thresholds (percent / days)
#[derive(Debug, Clone)]
pub struct ExitConfig {
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

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub log_level: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        // Load .env file if it exists (ignoring error if not found)
        let _ = dotenv::dotenv();

        Ok(Config {
            database: DatabaseConfig {
                tracking_db_path: PathBuf::from(get_env_string(
                    "TRACKING_DB_PATH",
                    "./data/stock_tracking_db.sqlite",
                )),
            },
            telegram: TelegramConfig {
                bot_token: get_env_string("TELEGRAM_BOT_TOKEN", ""),
                channel_id: get_env_string("TELEGRAM_CHANNEL_ID", ""),
            },
            insight: InsightConfig {
                window_days: get_env_parsed("INSIGHT_WINDOW_DAYS", aggregator::DEFAULT_WINDOW_DAYS)?,
                min_trigger_observations: get_env_parsed(
                    "MIN_TRIGGER_OBSERVATIONS",
                    aggregator::MIN_TRIGGER_OBSERVATIONS,
                )?,
                avoided_loss_threshold_pct: get_env_parsed(
                    "AVOIDED_LOSS_THRESHOLD_PCT",
                    aggregator::AVOIDED_LOSS_THRESHOLD_PCT,
                )?,
                missed_gain_threshold_pct: get_env_parsed(
                    "MISSED_GAIN_THRESHOLD_PCT",
                    aggregator::MISSED_GAIN_THRESHOLD_PCT,
                )?,
            },
            exit: ExitConfig {
                short_term_goal_days: get_env_parsed("EXIT_SHORT_TERM_GOAL_DAYS", exit_rules::SHORT_TERM_GOAL_DAYS)?,
                short_term_goal_rate: get_env_parsed("EXIT_SHORT_TERM_GOAL_RATE", exit_rules::SHORT_TERM_GOAL_RATE)?,
                short_term_loss_days: get_env_parsed("EXIT_SHORT_TERM_LOSS_DAYS", exit_rules::SHORT_TERM_LOSS_DAYS)?,
                short_term_loss_rate: get_env_parsed("EXIT_SHORT_TERM_LOSS_RATE", exit_rules::SHORT_TERM_LOSS_RATE)?,
                return_target_rate: get_env_parsed("EXIT_RETURN_TARGET_RATE", exit_rules::RETURN_TARGET_RATE)?,
                loss_limit_rate: get_env_parsed("EXIT_LOSS_LIMIT_RATE", exit_rules::LOSS_LIMIT_RATE)?,
                stale_loss_days: get_env_parsed("EXIT_STALE_LOSS_DAYS", exit_rules::STALE_LOSS_DAYS)?,
                stale_gain_days: get_env_parsed("EXIT_STALE_GAIN_DAYS", exit_rules::STALE_GAIN_DAYS)?,
                stale_gain_rate: get_env_parsed("EXIT_STALE_GAIN_RATE", exit_rules::STALE_GAIN_RATE)?,
                long_term_cleanup_days: get_env_parsed(
                    "EXIT_LONG_TERM_CLEANUP_DAYS",
                    exit_rules::LONG_TERM_CLEANUP_DAYS,
                )?,
            },
            logging: LoggingConfig {
                log_level: get_env_string("LOG_LEVEL", "info"),
            },
            dry_run: get_env_bool("DRY_RUN", false)?,
        })
    }

    pub fn validate(&self) -> Result<()> {
        // Database
        if self.database.tracking_db_path.as_os_str().is_empty() {
            anyhow::bail!("TRACKING_DB_PATH must be set");
        }

        // Aggregation
        if self.insight.window_days <= 0 || self.insight.window_days > MAX_WINDOW_DAYS {
            anyhow::bail!("INSIGHT_WINDOW_DAYS must be between 1 and {}", MAX_WINDOW_DAYS);
        }
        if self.insight.min_trigger_observations == 0 {
            anyhow::bail!("MIN_TRIGGER_OBSERVATIONS must be > 0");
        }
        if self.insight.avoided_loss_threshold_pct >= 0.0 {
            anyhow::bail!("AVOIDED_LOSS_THRESHOLD_PCT must be < 0");
        }
        if self.insight.missed_gain_threshold_pct <= 0.0 {
            anyhow::bail!("MISSED_GAIN_THRESHOLD_PCT must be > 0");
        }

        // Exit thresholds
        let exit = &self.exit;
        if exit.short_term_loss_rate >= 0.0 || exit.short_term_goal_rate <= 0.0 {
            anyhow::bail!("EXIT_SHORT_TERM_LOSS_RATE must be < 0 < EXIT_SHORT_TERM_GOAL_RATE");
        }
        if exit.loss_limit_rate >= 0.0 || exit.return_target_rate <= 0.0 {
            anyhow::bail!("EXIT_LOSS_LIMIT_RATE must be < 0 < EXIT_RETURN_TARGET_RATE");
        }
        if exit.stale_gain_rate < 0.0 {
            anyhow::bail!("EXIT_STALE_GAIN_RATE must be ≥ 0");
        }
        let day_limits = [
            ("EXIT_SHORT_TERM_GOAL_DAYS", exit.short_term_goal_days),
            ("EXIT_SHORT_TERM_LOSS_DAYS", exit.short_term_loss_days),
            ("EXIT_STALE_LOSS_DAYS", exit.stale_loss_days),
            ("EXIT_STALE_GAIN_DAYS", exit.stale_gain_days),
            ("EXIT_LONG_TERM_CLEANUP_DAYS", exit.long_term_cleanup_days),
        ];
        for (key, days) in day_limits {
            if days < 0 {
                anyhow::bail!("{} must be ≥ 0", key);
            }
        }

        // Notifications
        if self.telegram.bot_token.is_empty() {
            log::warn!("TELEGRAM_BOT_TOKEN is empty - notifications will be disabled");
        }
        if self.telegram.channel_id.is_empty() {
            log::warn!("TELEGRAM_CHANNEL_ID is empty - notifications will be disabled");
        }

        Ok(())
    }

    pub fn exit_policy(&self) -> ExitPolicy {
        let exit = &self.exit;
        ExitPolicy {
            short_term_goal_days: exit.short_term_goal_days,
            short_term_goal_rate: exit.short_term_goal_rate,
            short_term_loss_days: exit.short_term_loss_days,
            short_term_loss_rate: exit.short_term_loss_rate,
            return_target_rate: exit.return_target_rate,
            loss_limit_rate: exit.loss_limit_rate,
            stale_loss_days: exit.stale_loss_days,
            stale_gain_days: exit.stale_gain_days,
            stale_gain_rate: exit.stale_gain_rate,
            long_term_cleanup_days: exit.long_term_cleanup_days,
        }
    }

    pub fn aggregation_config(&self) -> AggregationConfig {
        AggregationConfig {
            window_days: self.insight.window_days,
            min_observations: self.insight.min_trigger_observations,
            avoided_loss_threshold_pct: self.insight.avoided_loss_threshold_pct,
            missed_gain_threshold_pct: self.insight.missed_gain_threshold_pct,
        }
    }
}

// Helper functions for environment variable parsing

fn get_env_string(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn get_env_parsed<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid {} value: {}", key, raw)),
        _ => Ok(default),
    }
}

fn get_env_bool(key: &str, default: bool) -> Result<bool> {
    match env::var(key) {
        Ok(raw) => match raw.trim().to_lowercase().as_str() {
            "" => Ok(default),
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => anyhow::bail!("Invalid {} value: {}", key, raw),
        },
        Err(_) => Ok(default),
    }
}
