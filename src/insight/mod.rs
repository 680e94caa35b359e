pub mod aggregator;
pub mod report;
pub mod schema;
pub mod store;

pub use aggregator::{
    select_best_trigger, AggregationConfig, MarketInsight, PrincipleCounts, TriggerReliabilityAggregator,
    WeeklyDigest,
};
pub use report::{compose_report, DispatchOutcome, ReportEmitter};
pub use schema::{MarketSchema, DOMESTIC_SCHEMA, US_SCHEMA};
pub use store::{SignalSummary, SqliteTrackingStore, TrackingStore, TriggerStatistic};
