//! Configuration validation.
//!
//! This module provides validation logic for configuration values,
//! ensuring they are within acceptable ranges.

use super::Config;
use crate::error::ConfigError;

/// Maximum allowed baseline window in days.
pub const MAX_WINDOW_DAYS: u32 = 365;

/// Maximum allowed retention in days.
pub const MAX_RETENTION_DAYS: u32 = 3650;

const LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

/// Validate configuration values.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidValue`] if any value is out of range:
/// - `METRICS_DATABASE_PATH` must not be empty
/// - `LOG_LEVEL` must be a known level
/// - `BASELINE_WINDOW_DAYS` must be between 1 and 365
/// - `METRICS_RETENTION_DAYS` must be between 1 and 3650
/// - the baseline thresholds must pass [`crate::baseline::BaselineConfig::validate`]
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.database_path.trim().is_empty() {
        return Err(ConfigError::InvalidValue {
            var: "METRICS_DATABASE_PATH".into(),
            reason: "must not be empty".into(),
        });
    }

    if !LOG_LEVELS.contains(&config.log_level.to_ascii_lowercase().as_str()) {
        return Err(ConfigError::InvalidValue {
            var: "LOG_LEVEL".into(),
            reason: format!("must be one of {}", LOG_LEVELS.join(", ")),
        });
    }

    if config.baseline_window_days > MAX_WINDOW_DAYS {
        return Err(ConfigError::InvalidValue {
            var: "BASELINE_WINDOW_DAYS".into(),
            reason: format!("must be between 1 and {MAX_WINDOW_DAYS}"),
        });
    }

    if config.retention_days == 0 || config.retention_days > MAX_RETENTION_DAYS {
        return Err(ConfigError::InvalidValue {
            var: "METRICS_RETENTION_DAYS".into(),
            reason: format!("must be between 1 and {MAX_RETENTION_DAYS}"),
        });
    }

    config.baseline_config().validate()
}
