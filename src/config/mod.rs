// Configuration module

mod models;

pub use models::*;

use crate::error::{AppError, Result};
use config::{Config, Environment as EnvVars, File};
use std::path::{Path, PathBuf};

impl AppConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Environment variables (highest)
    /// 2. Config file (explicit path, or the default location)
    /// 3. Defaults (lowest)
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file_source = match path {
            // An explicitly requested file must exist.
            Some(explicit) => File::from(explicit).required(true),
            None => File::with_name(&Self::default_config_path()).required(false),
        };

        let config = Config::builder()
            // Start with defaults
            .add_source(Config::try_from(&Self::default())?)
            .add_source(file_source)
            // Override with environment variables (prefix: FLRTS_)
            .add_source(EnvVars::with_prefix("FLRTS").separator("__"))
            .build()
            .map_err(|e| AppError::Config(e.to_string()))?;

        let mut loaded: Self = config
            .try_deserialize()
            .map_err(|e| AppError::Config(e.to_string()))?;

        loaded.monitor.clamp_thresholds();
        Ok(loaded)
    }

    fn default_config_path() -> String {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".flrts-gateway")
            .join("config.toml")
            .to_string_lossy()
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.telegram.api_base_url, "https://api.telegram.org");
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.monitor.daily_cost_threshold_usd, 10.0);
        assert_eq!(config.reports.cache_ttl_seconds, 300);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::with_suffix(".toml").unwrap();
        writeln!(
            file,
            r#"
[telegram]
bot_token = "123456:AAH-test-token-value"
webhook_secret = "hook-secret-value"

[retry]
max_attempts = 5

[monitor]
success_rate_threshold_pct = 150.0
"#
        )
        .unwrap();

        let config = AppConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.telegram.bot_token, "123456:AAH-test-token-value");
        assert_eq!(config.retry.max_attempts, 5);
        // Out-of-range thresholds are clamped at load.
        assert_eq!(config.monitor.success_rate_threshold_pct, 100.0);
        // Untouched sections keep their defaults.
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_missing_explicit_file_errors() {
        let result = AppConfig::load(Some(Path::new("/nonexistent/flrts.toml")));
        assert!(result.is_err());
    }
}
