//! Structured logging with environment-aware verbosity.
//!
//! This module configures the `tracing` ecosystem for the gateway,
//! supporting multiple output formats, and enforces the deployment rule
//! that debug-level output is suppressed in the `test` and `production`
//! environments so operational log sinks stay quiet.

use crate::config::LoggingConfig;
use crate::error::Result;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Deployment environment the gateway runs in.
///
/// An enumerated type rather than raw string comparison, so a typo in
/// configuration cannot silently re-enable verbose logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Staging,
    Test,
    Production,
}

impl Default for Environment {
    fn default() -> Self {
        Environment::Development
    }
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Staging => "staging",
            Environment::Test => "test",
            Environment::Production => "production",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for Environment {
    fn from(value: &str) -> Self {
        // Unknown or unset values fall back to development, matching the
        // default for an unconfigured deployment.
        match value.trim().to_ascii_lowercase().as_str() {
            "test" => Environment::Test,
            "production" | "prod" => Environment::Production,
            "staging" => Environment::Staging,
            _ => Environment::Development,
        }
    }
}

impl FromStr for Environment {
    type Err = std::convert::Infallible;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Environment::from(value))
    }
}

impl<'de> Deserialize<'de> for Environment {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Ok(Environment::from(value.as_str()))
    }
}

/// Whether debug-level output is emitted for the given environment.
///
/// Suppressed in `test` and `production`; emitted everywhere else
/// (development, staging, anything unrecognized).
pub fn debug_logging_enabled(environment: Environment) -> bool {
    !matches!(environment, Environment::Test | Environment::Production)
}

/// Filter directive honoring the environment's debug suppression rule.
///
/// A configured `debug`/`trace` level is capped at `info` when the
/// environment suppresses debug output.
pub fn effective_level(config: &LoggingConfig) -> String {
    if debug_logging_enabled(config.environment) {
        return config.level.clone();
    }
    match config.level.as_str() {
        "trace" | "debug" => "info".to_string(),
        other => other.to_string(),
    }
}

/// Initializes the global tracing subscriber for the gateway.
///
/// Supports two output formats:
/// - `json`: Structured JSON logs for production ingestion.
/// - `pretty` (default): Human-readable, colorized output for development.
///
/// Log levels are controlled via the `RUST_LOG` environment variable or
/// the provided `LoggingConfig`, subject to the debug suppression rule.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(effective_level(config)));

    match config.format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }

    Ok(())
}
