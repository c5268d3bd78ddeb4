//! Scheduled cost and success-rate monitors.
//!
//! Periodic checks over the parser log: daily OpenAI spend against the
//! configured thresholds, and the trailing-24h parse success rate.
//! Breaches are delivered through the alert sink; monitor failures are
//! logged and never take the service down.

use crate::config::MonitorConfig;
use crate::parser_log::{ParserLogStore, ReviewStatus};
use crate::reports::cost_tracking::days_in_month;
use crate::telegram::TelegramClient;
use chrono::{Datelike, Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Where monitor alerts are delivered.
pub enum AlertSink {
    /// A Telegram chat, reached through the bot itself.
    Telegram {
        client: Arc<TelegramClient>,
        chat_id: i64,
    },
    /// No chat configured; alerts surface as error-level log lines.
    Log,
}

impl AlertSink {
    pub fn from_config(config: &MonitorConfig, client: Arc<TelegramClient>) -> Self {
        match config.alert_chat_id {
            Some(chat_id) => AlertSink::Telegram { client, chat_id },
            None => {
                warn!("No alert chat configured, monitor alerts will only be logged");
                AlertSink::Log
            }
        }
    }

    pub async fn deliver(&self, subject: &str, body: &str) {
        match self {
            AlertSink::Telegram { client, chat_id } => {
                let text = format!("*{}*\n\n{}", subject, body);
                if let Err(failure) = client.send_message(*chat_id, &text).await {
                    // The alert itself already goes through the retry
                    // policy; at this point the content must not be lost.
                    error!("Failed to deliver alert '{}': {}; {}", subject, failure, body);
                }
            }
            AlertSink::Log => error!("{}: {}", subject, body),
        }
    }
}

/// One pass of the daily cost monitor.
#[derive(Debug, Clone, PartialEq)]
pub struct CostCheck {
    pub total_cost: f64,
    pub total_parses: u64,
    pub projected_monthly: f64,
    pub avg_cost_per_parse: f64,
    pub alert_needed: bool,
}

/// Today's spend, its monthly projection, and whether either threshold
/// is breached.
pub fn check_daily_cost(store: &dyn ParserLogStore, config: &MonitorConfig) -> CostCheck {
    let now = Utc::now();
    let today = now.date_naive();

    let start = today.and_time(chrono::NaiveTime::MIN).and_utc();
    let entries = store.entries_between(start, now);

    let total_parses = entries.len() as u64;
    let total_cost: f64 = entries
        .iter()
        .filter_map(|entry| entry.estimated_cost_usd)
        .sum();

    let current_day = f64::from(today.day());
    let projected_monthly = if total_cost > 0.0 {
        (total_cost / current_day) * f64::from(days_in_month(today))
    } else {
        0.0
    };

    let avg_cost_per_parse = if total_parses > 0 {
        total_cost / total_parses as f64
    } else {
        0.0
    };

    CostCheck {
        total_cost,
        total_parses,
        projected_monthly,
        avg_cost_per_parse,
        alert_needed: total_cost > config.daily_cost_threshold_usd
            || projected_monthly > config.monthly_cost_threshold_usd,
    }
}

pub async fn run_daily_cost_monitor(
    store: &dyn ParserLogStore,
    config: &MonitorConfig,
    sink: &AlertSink,
) {
    let check = check_daily_cost(store, config);

    if check.alert_needed {
        let subject = format!("💰 FLRTS OpenAI Cost Alert: ${:.2} today", check.total_cost);
        let body = format!(
            "Today's Total Cost: ${:.2}\n\
             Projected Monthly Cost: ${:.2}\n\
             Daily Threshold: ${:.2}\n\
             Monthly Threshold: ${:.2}\n\
             Total Parses Today: {}\n\
             Average Cost per Parse: ${:.4}\n\n\
             Suggested Actions:\n\
             - Review high-cost parses in the Cost Tracking report\n\
             - Optimize prompts to reduce token usage\n\
             - Consider gpt-4o-mini for non-critical parses\n\
             - Check for retry loops or excessive API calls",
            check.total_cost,
            check.projected_monthly,
            config.daily_cost_threshold_usd,
            config.monthly_cost_threshold_usd,
            check.total_parses,
            check.avg_cost_per_parse,
        );
        sink.deliver(&subject, &body).await;
        info!(
            "Cost alert sent: ${:.2} today, projected ${:.2} monthly",
            check.total_cost, check.projected_monthly
        );
    } else {
        info!(
            "Cost monitoring: ${:.2} today, projected ${:.2} monthly - no alert needed",
            check.total_cost, check.projected_monthly
        );
    }
}

/// One pass of the success-rate monitor.
#[derive(Debug, Clone, PartialEq)]
pub struct SuccessRateCheck {
    pub total_parses: u64,
    pub accepted: u64,
    pub rejected: u64,
    pub pending: u64,
    /// `None` when nothing was reviewed in the window.
    pub success_rate: Option<f64>,
    pub alert_needed: bool,
}

/// Trailing-24h review outcomes and whether the accept rate fell below
/// the threshold. Pending parses count toward volume, not the rate.
pub fn check_success_rate(store: &dyn ParserLogStore, config: &MonitorConfig) -> SuccessRateCheck {
    let now = Utc::now();
    let entries = store.entries_between(now - ChronoDuration::hours(24), now);

    let mut accepted = 0u64;
    let mut rejected = 0u64;
    let mut pending = 0u64;
    for entry in &entries {
        match entry.review {
            ReviewStatus::Accepted => accepted += 1,
            ReviewStatus::Rejected => rejected += 1,
            ReviewStatus::Pending => pending += 1,
        }
    }

    let reviewed = accepted + rejected;
    let success_rate = if reviewed > 0 {
        Some(accepted as f64 / reviewed as f64 * 100.0)
    } else {
        None
    };

    SuccessRateCheck {
        total_parses: entries.len() as u64,
        accepted,
        rejected,
        pending,
        success_rate,
        alert_needed: success_rate
            .map(|rate| rate < config.success_rate_threshold_pct)
            .unwrap_or(false),
    }
}

pub async fn run_success_rate_monitor(
    store: &dyn ParserLogStore,
    config: &MonitorConfig,
    sink: &AlertSink,
) {
    let check = check_success_rate(store, config);

    let Some(success_rate) = check.success_rate else {
        info!("Success rate monitor: no completed parses in last 24 hours, skipping alert");
        return;
    };

    if check.alert_needed {
        let subject = format!("🚨 FLRTS Parser Success Rate Alert: {:.1}%", success_rate);
        let body = format!(
            "Current Success Rate: {:.1}% (Threshold: {}%)\n\n\
             Last 24 Hours:\n\
             - Total Parses: {}\n\
             - Accepted: {}\n\
             - Rejected: {}\n\
             - Pending: {}\n\n\
             Suggested Actions:\n\
             1. Review failed parses in the parser log\n\
             2. Analyze rejection patterns\n\
             3. Update parser prompts if needed\n\
             4. Check for context data issues (users/sites)",
            success_rate,
            config.success_rate_threshold_pct,
            check.total_parses,
            check.accepted,
            check.rejected,
            check.pending,
        );
        sink.deliver(&subject, &body).await;
    }

    info!(
        "Success rate monitor: success_rate={:.1}%, threshold={}%, alert_sent={}",
        success_rate, config.success_rate_threshold_pct, check.alert_needed
    );
}

/// Run both monitors on the configured interval. The first pass runs at
/// startup.
pub fn spawn(
    store: Arc<dyn ParserLogStore>,
    config: MonitorConfig,
    sink: Arc<AlertSink>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let period = Duration::from_secs(config.check_interval_hours.max(1) * 3600);
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            run_daily_cost_monitor(store.as_ref(), &config, &sink).await;
            run_success_rate_monitor(store.as_ref(), &config, &sink).await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser_log::{InMemoryParserLogStore, ParserLogEntry};

    fn costed_entry(cost: f64) -> ParserLogEntry {
        let mut entry = ParserLogEntry::new();
        entry.model_name = Some("gpt-4o-mini".to_string());
        // Insert recalculates cost from tokens; set tokens so the stored
        // cost lands on the requested value (rate: 0.0000006 per prompt
        // token).
        entry.prompt_tokens = Some((cost / 0.000_000_6).round() as u32);
        entry.completion_tokens = Some(0);
        entry
    }

    fn reviewed_entry(review: ReviewStatus) -> ParserLogEntry {
        let mut entry = ParserLogEntry::new();
        entry.review = review;
        entry
    }

    #[test]
    fn test_cost_check_under_threshold() {
        let store = InMemoryParserLogStore::new();
        store.insert(costed_entry(1.0)).unwrap();

        let config = MonitorConfig::default();
        let check = check_daily_cost(&store, &config);
        assert_eq!(check.total_parses, 1);
        assert!((check.total_cost - 1.0).abs() < 0.01);
        // $1 on any day of the month projects under the $300 monthly bar.
        assert!(!check.alert_needed);
    }

    #[test]
    fn test_cost_check_breaches_daily_threshold() {
        let store = InMemoryParserLogStore::new();
        store.insert(costed_entry(11.0)).unwrap();

        let config = MonitorConfig::default();
        let check = check_daily_cost(&store, &config);
        assert!(check.alert_needed);
        assert!(check.projected_monthly > 0.0);
    }

    #[test]
    fn test_cost_check_empty_store() {
        let store = InMemoryParserLogStore::new();
        let check = check_daily_cost(&store, &MonitorConfig::default());
        assert_eq!(check.total_parses, 0);
        assert_eq!(check.projected_monthly, 0.0);
        assert_eq!(check.avg_cost_per_parse, 0.0);
        assert!(!check.alert_needed);
    }

    #[test]
    fn test_success_rate_skips_without_reviews() {
        let store = InMemoryParserLogStore::new();
        store.insert(reviewed_entry(ReviewStatus::Pending)).unwrap();

        let check = check_success_rate(&store, &MonitorConfig::default());
        assert_eq!(check.success_rate, None);
        assert!(!check.alert_needed);
        assert_eq!(check.pending, 1);
    }

    #[test]
    fn test_success_rate_below_threshold_alerts() {
        let store = InMemoryParserLogStore::new();
        store.insert(reviewed_entry(ReviewStatus::Accepted)).unwrap();
        store.insert(reviewed_entry(ReviewStatus::Rejected)).unwrap();
        store.insert(reviewed_entry(ReviewStatus::Rejected)).unwrap();

        let check = check_success_rate(&store, &MonitorConfig::default());
        // 1 of 3 reviewed: 33.3% < 80%.
        assert!(check.alert_needed);
        assert!(check.success_rate.unwrap() < 40.0);
    }

    #[test]
    fn test_success_rate_healthy() {
        let store = InMemoryParserLogStore::new();
        for _ in 0..9 {
            store.insert(reviewed_entry(ReviewStatus::Accepted)).unwrap();
        }
        store.insert(reviewed_entry(ReviewStatus::Rejected)).unwrap();

        let check = check_success_rate(&store, &MonitorConfig::default());
        assert_eq!(check.success_rate, Some(90.0));
        assert!(!check.alert_needed);
    }
}
