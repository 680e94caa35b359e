//! 📋 Weekly Report Emitter
//!
//! Renders a `WeeklyDigest` into the fixed-section report and hands it to the
//! notification sink (or just returns it in dry-run mode).

use std::sync::Arc;

use log::{error, info};

use super::aggregator::{MarketInsight, WeeklyDigest};
use crate::messages::format_percentage;
use crate::telegram::NotificationSink;

const SECTION_RULE: &str = "━━━━━━━━━━━━━━━━━━━━";

/// What happened to a report handed to the emitter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Sent,
    DryRun,
    Failed,
}

impl DispatchOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, DispatchOutcome::Failed)
    }
}

/// Render the full weekly report
pub fn compose_report(digest: &WeeklyDigest) -> String {
    let mut report = format!(
        "📋 Weekly Trigger Insight ({} ~ {})\n",
        digest.window_start.format("%-m/%-d"),
        digest.window_end.format("%-m/%-d"),
    );

    for insight in digest.markets() {
        report.push('\n');
        report.push_str(&market_section(insight));
    }

    report.push_str(&format!("\n💡 Key takeaway this week: {}", digest.narrative()));
    report
}

fn market_section(insight: &MarketInsight) -> String {
    let market = insight.market;
    format!(
        "{} {}\n\
         {}\n\
         🛡️ Avoided losses: {}\n\
         ❌ Missed opportunities: {}\n\
         📊 Most accurate trigger: {}\n\
         📌 New principles: {}\n",
        market.flag(),
        market.display_name(),
        SECTION_RULE,
        summary_line(insight.avoided_losses.count, "avg", insight.avoided_losses.return_pct),
        summary_line(insight.missed_opportunities.count, "best", insight.missed_opportunities.return_pct),
        trigger_line(insight),
        principles_line(insight),
    )
}

/// `3` or `3 (avg -7.2%)`; a missing or zero return is left out
fn summary_line(count: u64, label: &str, return_pct: Option<f64>) -> String {
    match return_pct.filter(|v| *v != 0.0) {
        Some(pct) => format!("{} ({} {})", count, label, format_percentage(Some(pct))),
        None => count.to_string(),
    }
}

fn trigger_line(insight: &MarketInsight) -> String {
    match &insight.best_trigger {
        Some(trigger) => format!(
            "{} (win rate {:.0}%, {}/{})",
            trigger.trigger_type,
            trigger.win_rate(),
            trigger.wins,
            trigger.completed
        ),
        None => "Accumulating data".to_string(),
    }
}

fn principles_line(insight: &MarketInsight) -> String {
    match insight.principles {
        Some(p) => format!("{} added ({} total)", p.new_in_window, p.total_active),
        None => "Not tracked".to_string(),
    }
}

/// Hands finished reports to the notification sink
pub struct ReportEmitter {
    sink: Option<Arc<dyn NotificationSink>>,
    destination: String,
    dry_run: bool,
}

impl ReportEmitter {
    pub fn new(sink: Option<Arc<dyn NotificationSink>>, destination: String, dry_run: bool) -> Self {
        Self { sink, destination, dry_run }
    }

    /// Emitter that never dispatches
    pub fn dry_run() -> Self {
        Self::new(None, String::new(), true)
    }

    /// Dispatch a rendered message; failures are logged and reported, not retried
    pub async fn emit(&self, report: &str) -> DispatchOutcome {
        if self.dry_run {
            info!("📝 Dry run mode - message not sent");
            return DispatchOutcome::DryRun;
        }

        let Some(sink) = &self.sink else {
            error!("❌ No notification sink configured (TELEGRAM_BOT_TOKEN / TELEGRAM_CHANNEL_ID)");
            return DispatchOutcome::Failed;
        };

        match sink.send(&self.destination, report).await {
            Ok(()) => {
                info!("📤 Message sent to {}", self.destination);
                DispatchOutcome::Sent
            }
            Err(e) => {
                error!("❌ Failed to send message to {}: {}", self.destination, e);
                DispatchOutcome::Failed
            }
        }
    }

    /// Compose and dispatch in one step; returns the rendered report too
    pub async fn emit_digest(&self, digest: &WeeklyDigest) -> (String, DispatchOutcome) {
        let report = compose_report(digest);
        let outcome = self.emit(&report).await;
        (report, outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::insight::aggregator::PrincipleCounts;
    use crate::insight::store::{SignalSummary, TriggerStatistic};
    use crate::market::Market;
    use crate::telegram::NotifyError;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::sync::Mutex;

    fn digest() -> WeeklyDigest {
        let end = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap().and_hms_opt(9, 0, 0).unwrap();
        let start = NaiveDate::from_ymd_opt(2026, 10, 12).unwrap().and_hms_opt(9, 0, 0).unwrap();
        WeeklyDigest {
            window_start: start,
            window_end: end,
            domestic: MarketInsight {
                market: Market::Domestic,
                avoided_losses: SignalSummary { count: 3, return_pct: Some(-7.24) },
                missed_opportunities: SignalSummary { count: 1, return_pct: Some(15.31) },
                best_trigger: Some(TriggerStatistic { trigger_type: "Volume Surge".into(), completed: 6, wins: 4 }),
                principles: Some(PrincipleCounts { new_in_window: 2, total_active: 9 }),
            },
            us: MarketInsight {
                market: Market::Us,
                avoided_losses: SignalSummary::default(),
                missed_opportunities: SignalSummary { count: 0, return_pct: None },
                best_trigger: None,
                principles: None,
            },
        }
    }

    #[test]
    fn test_compose_report() {
        let report = compose_report(&digest());
        let expected = "📋 Weekly Trigger Insight (10/12 ~ 10/19)\n\
            \n\
            🇰🇷 Korean Market\n\
            ━━━━━━━━━━━━━━━━━━━━\n\
            🛡️ Avoided losses: 3 (avg -7.2%)\n\
            ❌ Missed opportunities: 1 (best +15.3%)\n\
            📊 Most accurate trigger: Volume Surge (win rate 67%, 4/6)\n\
            📌 New principles: 2 added (9 total)\n\
            \n\
            🇺🇸 US Market\n\
            ━━━━━━━━━━━━━━━━━━━━\n\
            🛡️ Avoided losses: 0\n\
            ❌ Missed opportunities: 0\n\
            📊 Most accurate trigger: Accumulating data\n\
            📌 New principles: Not tracked\n\
            \n\
            💡 Key takeaway this week: Volume Surge trigger in the Korean Market remains the most reliable (67% win rate)";
        assert_eq!(report, expected);
    }

    #[test]
    fn test_compose_report_without_data() {
        let mut d = digest();
        d.domestic.best_trigger = None;
        let report = compose_report(&d);
        assert!(report.ends_with("💡 Key takeaway this week: Still accumulating data, insights coming soon"));
    }

    #[derive(Default)]
    struct RecordingSink {
        sent: Mutex<Vec<(String, String)>>,
        fail: bool,
    }

    #[async_trait]
    impl NotificationSink for RecordingSink {
        async fn send(&self, destination: &str, text: &str) -> Result<(), NotifyError> {
            if self.fail {
                return Err(NotifyError::Api { status: 400, body: "chat not found".into() });
            }
            self.sent.lock().unwrap().push((destination.to_string(), text.to_string()));
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_emit_sends_to_destination() {
        let sink = Arc::new(RecordingSink::default());
        let emitter = ReportEmitter::new(Some(sink.clone() as Arc<dyn NotificationSink>), "@insights".to_string(), false);

        let (report, outcome) = emitter.emit_digest(&digest()).await;
        assert_eq!(outcome, DispatchOutcome::Sent);

        let sent = sink.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0], ("@insights".to_string(), report));
    }

    #[tokio::test]
    async fn test_dry_run_never_dispatches() {
        let sink = Arc::new(RecordingSink::default());
        let emitter = ReportEmitter::new(Some(sink.clone() as Arc<dyn NotificationSink>), "@insights".to_string(), true);

        assert_eq!(emitter.emit("report").await, DispatchOutcome::DryRun);
        assert!(sink.sent.lock().unwrap().is_empty());
        assert_eq!(ReportEmitter::dry_run().emit("report").await, DispatchOutcome::DryRun);
    }

    #[tokio::test]
    async fn test_dispatch_failure_is_reported() {
        let sink = Arc::new(RecordingSink { fail: true, ..Default::default() });
        let emitter = ReportEmitter::new(Some(sink as Arc<dyn NotificationSink>), "@insights".to_string(), false);
        assert!(emitter.emit("report").await.is_failure());

        let emitter = ReportEmitter::new(None, String::new(), false);
        assert_eq!(emitter.emit("report").await, DispatchOutcome::Failed);
    }
}
