//! 📈 Stock Tracker CLI
//!
//! `report` (default): aggregate the weekly trigger digest and dispatch it.
//! `check <positions.json>`: run one exit-check cycle over a positions file.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use log::{error, info, warn};

use stock_tracker::config::Config;
use stock_tracker::decision_engine::{ExitDecisionEngine, HoldingsMonitor};
use stock_tracker::insight::{
    compose_report, DispatchOutcome, ReportEmitter, SqliteTrackingStore, TriggerReliabilityAggregator, WeeklyDigest,
};
use stock_tracker::messages::format_sell_message_for;
use stock_tracker::position::PositionRecord;
use stock_tracker::telegram::{NotificationSink, TelegramClient};

const EXIT_GENERATION_FAILED: u8 = 1;
const EXIT_DISPATCH_FAILED: u8 = 2;

#[derive(Parser, Debug)]
#[command(name = "stock-tracker", version, about = "Exit decisions and weekly trigger insight")]
struct Cli {
    /// Print messages without sending them
    #[arg(long, global = true)]
    dry_run: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate and send the weekly trigger insight report
    Report,
    /// Evaluate open positions from a JSON file and notify sells
    Check {
        /// JSON array of position records
        positions: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match Config::from_env().context("Failed to load configuration") {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ {:#}", e);
            return ExitCode::from(EXIT_GENERATION_FAILED);
        }
    };
    config.dry_run |= cli.dry_run;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(config.logging.log_level.as_str()))
        .init();

    if let Err(e) = config.validate() {
        error!("❌ Invalid configuration: {:#}", e);
        return ExitCode::from(EXIT_GENERATION_FAILED);
    }
    info!("✅ Configuration: Loaded (dry run: {})", config.dry_run);

    let emitter = build_emitter(&config);

    let result = match cli.command.unwrap_or(Command::Report) {
        Command::Report => run_report(&config, &emitter).await,
        Command::Check { positions } => run_check(&config, &emitter, &positions).await,
    };

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(EXIT_DISPATCH_FAILED),
        Err(e) => {
            error!("❌ {:#}", e);
            ExitCode::from(EXIT_GENERATION_FAILED)
        }
    }
}

fn build_emitter(config: &Config) -> ReportEmitter {
    if config.dry_run {
        return ReportEmitter::dry_run();
    }

    let sink: Option<Arc<dyn NotificationSink>> = match TelegramClient::new(config.telegram.bot_token.clone()) {
        Ok(client) => Some(Arc::new(client) as Arc<dyn NotificationSink>),
        Err(e) => {
            warn!("⚠️  Telegram client unavailable: {}", e);
            None
        }
    };

    ReportEmitter::new(sink, config.telegram.channel_id.clone(), false)
}

/// Returns `Ok(false)` when the report was generated but could not be dispatched
async fn run_report(config: &Config, emitter: &ReportEmitter) -> Result<bool> {
    let db_path = config.database.tracking_db_path.clone();
    let aggregation = config.aggregation_config();

    let digest = tokio::task::spawn_blocking(move || -> Result<WeeklyDigest> {
        let store = SqliteTrackingStore::open(&db_path)?;
        Ok(TriggerReliabilityAggregator::new(&store, aggregation).aggregate_at(Local::now().naive_local()))
    })
    .await
    .context("Aggregation task failed")?
    .context("Failed to generate weekly report")?;

    let report = compose_report(&digest);
    println!("{}", report);

    Ok(!emitter.emit(&report).await.is_failure())
}

async fn run_check(config: &Config, emitter: &ReportEmitter, path: &Path) -> Result<bool> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read positions file {}", path.display()))?;
    let records: Vec<PositionRecord> = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse positions file {}", path.display()))?;

    let mut monitor = HoldingsMonitor::new(ExitDecisionEngine::with_policy(config.exit_policy()));
    for record in records {
        monitor.upsert(record);
    }

    let cycle = monitor.run_cycle();
    let mut all_sent = true;
    for check in cycle.sells() {
        let message = format_sell_message_for(&check.record, &check.verdict);
        println!("{}\n", message);
        if emitter.emit(&message).await == DispatchOutcome::Failed {
            all_sent = false;
        }
    }

    Ok(all_sent)
}
