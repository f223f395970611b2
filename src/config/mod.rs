//! Configuration management.
//!
//! This module handles:
//! - Environment variable loading (with `.env` support)
//! - Default values for every setting
//! - Validation of baseline thresholds and retention
//!
//! # Example
//!
//! ```
//! use metrics_baseline::config::Config;
//!
//! // Use Config::from_env() in production
//! let config = Config {
//!     database_path: ":memory:".to_string(),
//!     ..Config::default()
//! };
//!
//! assert!(config.is_in_memory());
//! assert_eq!(config.baseline_config().window_days, 7);
//! ```

mod validation;

pub use validation::{validate_config, MAX_RETENTION_DAYS, MAX_WINDOW_DAYS};

use crate::baseline::BaselineConfig;
use crate::error::ConfigError;

/// Default database path.
pub const DEFAULT_DATABASE_PATH: &str = "./data/metrics.db";

/// Database path that selects a transient in-memory store.
pub const IN_MEMORY_DATABASE: &str = ":memory:";

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Default baseline window in days.
pub const DEFAULT_WINDOW_DAYS: u32 = 7;

/// Default minimum samples for a baseline.
pub const DEFAULT_MIN_DATA_POINTS: u64 = 10;

/// Default warning threshold, in percent.
pub const DEFAULT_DEVIATION_THRESHOLD: f64 = 20.0;

/// Default critical threshold, in percent.
pub const DEFAULT_CRITICAL_THRESHOLD: f64 = 50.0;

/// Default baseline percentile.
pub const DEFAULT_BASELINE_PERCENTILE: f64 = 95.0;

/// Default snapshot retention in days.
pub const DEFAULT_RETENTION_DAYS: u32 = 30;

/// Application configuration.
///
/// Use [`Config::from_env`] to load configuration from environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Database path, or `:memory:`.
    pub database_path: String,
    /// Log level (error, warn, info, debug, trace).
    pub log_level: String,
    /// Days of history that feed a baseline.
    pub baseline_window_days: u32,
    /// Minimum samples before a baseline exists.
    pub baseline_min_data_points: u64,
    /// Warning threshold in percent.
    pub baseline_deviation_threshold: f64,
    /// Critical threshold in percent.
    pub baseline_critical_threshold: f64,
    /// Percentile used as the baseline value.
    pub baseline_percentile: f64,
    /// Snapshots older than this many days are removed by `prune`.
    pub retention_days: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: DEFAULT_DATABASE_PATH.into(),
            log_level: DEFAULT_LOG_LEVEL.into(),
            baseline_window_days: DEFAULT_WINDOW_DAYS,
            baseline_min_data_points: DEFAULT_MIN_DATA_POINTS,
            baseline_deviation_threshold: DEFAULT_DEVIATION_THRESHOLD,
            baseline_critical_threshold: DEFAULT_CRITICAL_THRESHOLD,
            baseline_percentile: DEFAULT_BASELINE_PERCENTILE,
            retention_days: DEFAULT_RETENTION_DAYS,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Optional environment variables (with defaults):
    /// - `METRICS_DATABASE_PATH`: `SQLite` file, or `:memory:` (default: `./data/metrics.db`)
    /// - `LOG_LEVEL`: Logging level (default: `info`)
    /// - `BASELINE_WINDOW_DAYS`: History window (default: `7`)
    /// - `BASELINE_MIN_DATA_POINTS`: Minimum samples (default: `10`)
    /// - `BASELINE_DEVIATION_THRESHOLD`: Warning percent (default: `20`)
    /// - `BASELINE_CRITICAL_THRESHOLD`: Critical percent (default: `50`)
    /// - `BASELINE_PERCENTILE`: Baseline percentile (default: `95`)
    /// - `METRICS_RETENTION_DAYS`: Retention for `prune` (default: `30`)
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if a variable does not parse or
    /// fails validation (see [`validate_config`]).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors)
        let _ = dotenvy::dotenv();

        let database_path = std::env::var("METRICS_DATABASE_PATH")
            .unwrap_or_else(|_| DEFAULT_DATABASE_PATH.into());
        let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| DEFAULT_LOG_LEVEL.into());

        let config = Self {
            database_path,
            log_level,
            baseline_window_days: parse_env_u32("BASELINE_WINDOW_DAYS", DEFAULT_WINDOW_DAYS)?,
            baseline_min_data_points: parse_env_u64(
                "BASELINE_MIN_DATA_POINTS",
                DEFAULT_MIN_DATA_POINTS,
            )?,
            baseline_deviation_threshold: parse_env_f64(
                "BASELINE_DEVIATION_THRESHOLD",
                DEFAULT_DEVIATION_THRESHOLD,
            )?,
            baseline_critical_threshold: parse_env_f64(
                "BASELINE_CRITICAL_THRESHOLD",
                DEFAULT_CRITICAL_THRESHOLD,
            )?,
            baseline_percentile: parse_env_f64("BASELINE_PERCENTILE", DEFAULT_BASELINE_PERCENTILE)?,
            retention_days: parse_env_u32("METRICS_RETENTION_DAYS", DEFAULT_RETENTION_DAYS)?,
        };

        validate_config(&config)?;
        Ok(config)
    }

    /// Whether the store lives only for this process.
    #[must_use]
    pub fn is_in_memory(&self) -> bool {
        self.database_path == IN_MEMORY_DATABASE
    }

    /// Baseline settings for [`crate::baseline::BaselineEngine`].
    #[must_use]
    pub const fn baseline_config(&self) -> BaselineConfig {
        BaselineConfig {
            window_days: self.baseline_window_days,
            min_data_points: self.baseline_min_data_points,
            deviation_threshold_percent: self.baseline_deviation_threshold,
            critical_threshold_percent: self.baseline_critical_threshold,
            baseline_percentile: self.baseline_percentile,
        }
    }
}

/// Parse an environment variable as u64, using a default if not set.
fn parse_env_u64(name: &str, default: u64) -> Result<u64, ConfigError> {
    std::env::var(name).map_or(Ok(default), |val| {
        val.trim().parse().map_err(|_| ConfigError::InvalidValue {
            var: name.into(),
            reason: "must be a positive integer".into(),
        })
    })
}

/// Parse an environment variable as u32, using a default if not set.
fn parse_env_u32(name: &str, default: u32) -> Result<u32, ConfigError> {
    std::env::var(name).map_or(Ok(default), |val| {
        val.trim().parse().map_err(|_| ConfigError::InvalidValue {
            var: name.into(),
            reason: "must be a positive integer".into(),
        })
    })
}

/// Parse an environment variable as f64, using a default if not set.
fn parse_env_f64(name: &str, default: f64) -> Result<f64, ConfigError> {
    std::env::var(name).map_or(Ok(default), |val| {
        val.trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| ConfigError::InvalidValue {
                var: name.into(),
                reason: "must be a number".into(),
            })
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    const VARS: [&str; 8] = [
        "METRICS_DATABASE_PATH",
        "LOG_LEVEL",
        "BASELINE_WINDOW_DAYS",
        "BASELINE_MIN_DATA_POINTS",
        "BASELINE_DEVIATION_THRESHOLD",
        "BASELINE_CRITICAL_THRESHOLD",
        "BASELINE_PERCENTILE",
        "METRICS_RETENTION_DAYS",
    ];

    /// Helper to set up a clean test environment.
    fn setup_test_env() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_config_from_env_with_defaults() {
        setup_test_env();

        let config = Config::from_env().expect("should load config");
        assert_eq!(config, Config::default());
        assert_eq!(config.database_path, "./data/metrics.db");
        assert!(!config.is_in_memory());
        assert_eq!(config.baseline_config(), BaselineConfig::default());
    }

    #[test]
    #[serial]
    fn test_config_from_env_with_all_vars() {
        setup_test_env();
        env::set_var("METRICS_DATABASE_PATH", ":memory:");
        env::set_var("LOG_LEVEL", "debug");
        env::set_var("BASELINE_WINDOW_DAYS", "14");
        env::set_var("BASELINE_MIN_DATA_POINTS", "25");
        env::set_var("BASELINE_DEVIATION_THRESHOLD", "10");
        env::set_var("BASELINE_CRITICAL_THRESHOLD", "35.5");
        env::set_var("BASELINE_PERCENTILE", "99");
        env::set_var("METRICS_RETENTION_DAYS", "90");

        let config = Config::from_env().expect("should load config");
        setup_test_env();

        assert!(config.is_in_memory());
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.retention_days, 90);
        let baseline = config.baseline_config();
        assert_eq!(baseline.window_days, 14);
        assert_eq!(baseline.min_data_points, 25);
        assert_eq!(baseline.deviation_threshold_percent, 10.0);
        assert_eq!(baseline.critical_threshold_percent, 35.5);
        assert_eq!(baseline.baseline_percentile, 99.0);
    }

    #[test]
    #[serial]
    fn test_config_unparseable_value() {
        setup_test_env();
        env::set_var("BASELINE_WINDOW_DAYS", "a week");

        let result = Config::from_env();
        setup_test_env();

        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { var, .. }) if var == "BASELINE_WINDOW_DAYS"
        ));
    }

    #[test]
    #[serial]
    fn test_config_rejects_nan_threshold() {
        setup_test_env();
        env::set_var("BASELINE_DEVIATION_THRESHOLD", "NaN");

        let result = Config::from_env();
        setup_test_env();

        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { var, .. }) if var == "BASELINE_DEVIATION_THRESHOLD"
        ));
    }

    #[test]
    #[serial]
    fn test_config_out_of_range_is_validated() {
        setup_test_env();
        env::set_var("BASELINE_PERCENTILE", "150");

        let result = Config::from_env();
        setup_test_env();

        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { var, .. }) if var == "BASELINE_PERCENTILE"
        ));
    }
}
