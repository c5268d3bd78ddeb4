//! Configuration data structures for the FLRTS gateway.
//!
//! This module defines the schema for the application settings: HTTP
//! server parameters, Telegram credentials, the outbound retry schedule,
//! logging, monitoring thresholds, and report caching.

use crate::utils::logging::Environment;
use crate::utils::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

/// The root configuration object for the gateway.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// HTTP server settings (host, port).
    #[serde(default)]
    pub server: ServerConfig,

    /// Telegram Bot API credentials and endpoints.
    #[serde(default)]
    pub telegram: TelegramConfig,

    /// Retry schedule for outbound API calls.
    #[serde(default)]
    pub retry: RetryConfig,

    /// Logging and environment settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Cost and success-rate monitoring thresholds.
    #[serde(default)]
    pub monitor: MonitorConfig,

    /// Report execution settings.
    #[serde(default)]
    pub reports: ReportsConfig,
}

/// Settings for the built-in HTTP server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// The IP address or hostname the server should bind to.
    /// Default: `127.0.0.1`
    #[serde(default = "default_host")]
    pub host: String,

    /// The port number the server should listen on.
    /// Default: `8080`
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Telegram Bot API settings.
///
/// Credentials are injected here at construction; nothing reads them from
/// ambient process state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Bot token issued by BotFather. Only ever logged masked.
    #[serde(default)]
    pub bot_token: String,

    /// Shared secret Telegram echoes back in the
    /// `X-Telegram-Bot-Api-Secret-Token` webhook header.
    #[serde(default)]
    pub webhook_secret: String,

    /// Base URL for the Bot API.
    /// Default: `https://api.telegram.org`
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Connection and request timeout in seconds.
    /// Default: `10`
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Optional endpoint completed tasks are synced to. When unset the
    /// sync job logs and succeeds without an outbound call.
    #[serde(default)]
    pub task_sync_url: Option<String>,
}

/// Retry schedule for outbound API calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum attempts per operation (at least one always runs).
    /// Default: `3`
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry, in seconds.
    /// Default: `1.0`
    #[serde(default = "default_base_delay")]
    pub base_delay_seconds: f64,

    /// Multiplier applied to the delay after each failed attempt.
    /// Default: `2.0`
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Upper bound on any single delay, in seconds. `None` disables the
    /// explicit cap.
    /// Default: `60.0`
    #[serde(default = "default_max_delay")]
    pub max_delay_seconds: Option<f64>,
}

impl RetryConfig {
    /// Build the runtime policy from this configuration.
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            base_delay: Duration::from_secs_f64(self.base_delay_seconds.max(0.0)),
            backoff_multiplier: self.backoff_multiplier,
            max_delay: self
                .max_delay_seconds
                .map(|secs| Duration::from_secs_f64(secs.max(0.0))),
        }
    }
}

/// Settings for application logging and output format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Minimum log level (`trace`, `debug`, `info`, `warn`, `error`).
    /// Default: `info`
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format for logs (`pretty`, `json`).
    /// Default: `pretty`
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Deployment environment. Debug output is suppressed in `test` and
    /// `production`.
    /// Default: `development`
    #[serde(default)]
    pub environment: Environment,
}

/// Thresholds for the scheduled cost and success-rate monitors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Alert when today's parse cost exceeds this amount.
    /// Default: `10.0`
    #[serde(default = "default_daily_cost_threshold")]
    pub daily_cost_threshold_usd: f64,

    /// Alert when the projected monthly cost exceeds this amount.
    /// Default: `300.0`
    #[serde(default = "default_monthly_cost_threshold")]
    pub monthly_cost_threshold_usd: f64,

    /// Alert when the 24h parse success rate drops below this percentage.
    /// Default: `80.0`
    #[serde(default = "default_success_rate_threshold")]
    pub success_rate_threshold_pct: f64,

    /// Chat the monitors deliver alerts to. When unset, alerts degrade to
    /// error-level log lines.
    #[serde(default)]
    pub alert_chat_id: Option<i64>,

    /// Hours between monitor runs.
    /// Default: `24`
    #[serde(default = "default_check_interval")]
    pub check_interval_hours: u64,
}

impl MonitorConfig {
    /// Clamp out-of-range thresholds, warning about each adjustment.
    pub fn clamp_thresholds(&mut self) {
        if self.daily_cost_threshold_usd < 0.0 {
            warn!(
                "Invalid daily cost threshold {}, clamping to 0.0",
                self.daily_cost_threshold_usd
            );
            self.daily_cost_threshold_usd = 0.0;
        }
        if self.monthly_cost_threshold_usd < 0.0 {
            warn!(
                "Invalid monthly cost threshold {}, clamping to 0.0",
                self.monthly_cost_threshold_usd
            );
            self.monthly_cost_threshold_usd = 0.0;
        }
        if self.success_rate_threshold_pct < 0.0 {
            warn!(
                "Invalid success rate threshold {}, clamping to 0.0",
                self.success_rate_threshold_pct
            );
            self.success_rate_threshold_pct = 0.0;
        } else if self.success_rate_threshold_pct > 100.0 {
            warn!(
                "Invalid success rate threshold {}, clamping to 100.0",
                self.success_rate_threshold_pct
            );
            self.success_rate_threshold_pct = 100.0;
        }
    }
}

/// Settings for report execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportsConfig {
    /// Seconds a computed report result stays cached.
    /// Default: `300`
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_seconds: u64,
}

// Default trait implementations linking to custom logic

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            webhook_secret: String::new(),
            api_base_url: default_api_base_url(),
            timeout_seconds: default_timeout(),
            task_sync_url: None,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_seconds: default_base_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            max_delay_seconds: default_max_delay(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            environment: Environment::default(),
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            daily_cost_threshold_usd: default_daily_cost_threshold(),
            monthly_cost_threshold_usd: default_monthly_cost_threshold(),
            success_rate_threshold_pct: default_success_rate_threshold(),
            alert_chat_id: None,
            check_interval_hours: default_check_interval(),
        }
    }
}

impl Default for ReportsConfig {
    fn default() -> Self {
        Self {
            cache_ttl_seconds: default_cache_ttl(),
        }
    }
}

// Helper functions for serde defaults and shared constants
fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_api_base_url() -> String {
    "https://api.telegram.org".to_string()
}

fn default_timeout() -> u64 {
    10
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay() -> f64 {
    1.0
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_max_delay() -> Option<f64> {
    Some(60.0)
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_daily_cost_threshold() -> f64 {
    10.0
}

fn default_monthly_cost_threshold() -> f64 {
    300.0
}

fn default_success_rate_threshold() -> f64 {
    80.0
}

fn default_check_interval() -> u64 {
    24
}

fn default_cache_ttl() -> u64 {
    300
}
