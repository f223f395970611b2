//! Error types for the metrics engine.
//!
//! This module defines a hierarchical error system:
//! - [`AppError`]: Top-level application errors
//! - [`MetricsError`]: Errors surfaced by the aggregator and baseline engine
//! - [`StorageError`]: Database operation errors
//! - [`ExportError`]: Dashboard export errors
//! - [`ConfigError`]: Configuration errors
//!
//! All errors implement `Send + Sync` for async compatibility.
//!
//! "Not enough data" is never an error: baselines and deviation checks
//! return `Option` for that state.

use thiserror::Error;

/// Top-level application error.
///
/// This is the main error type returned by the binary entry point.
/// It wraps all subsystem errors for unified error handling.
#[derive(Debug, Error)]
pub enum AppError {
    /// Metrics engine error.
    #[error("Metrics error: {0}")]
    Metrics(#[from] MetricsError),

    /// Export error.
    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Errors surfaced to callers of the aggregator and baseline engine.
///
/// Instrumented code should treat [`MetricsError::StorageUnavailable`] as
/// best-effort: log it and carry on (see [`crate::metrics::MetricsHandle`]).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MetricsError {
    /// The call site passed a bad name, value, tag, or percentile.
    #[error("Invalid metric value for '{name}': {reason}")]
    InvalidMetricValue {
        /// The metric name as given by the caller.
        name: String,
        /// Why the input was rejected.
        reason: String,
    },

    /// The backing store failed on the read or write path.
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(#[from] StorageError),
}

impl MetricsError {
    /// Build an [`MetricsError::InvalidMetricValue`].
    #[must_use]
    pub fn invalid(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidMetricValue {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Returns true if this error was caused by the caller's input.
    #[must_use]
    pub const fn is_caller_error(&self) -> bool {
        matches!(self, Self::InvalidMetricValue { .. })
    }
}

/// Storage errors.
///
/// These errors represent failures in database operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// Failed to connect to the database.
    #[error("Database connection failed: {message}")]
    ConnectionFailed {
        /// Description of the connection failure.
        message: String,
    },

    /// A database query failed.
    #[error("Query failed: {query} - {message}")]
    QueryFailed {
        /// The query that failed (may be truncated).
        query: String,
        /// Description of the failure.
        message: String,
    },

    /// Database migration failed.
    #[error("Migration failed: {version} - {message}")]
    MigrationFailed {
        /// The migration version that failed.
        version: String,
        /// Description of the failure.
        message: String,
    },

    /// Internal storage error (corrupt row, undecodable column).
    #[error("Internal storage error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

/// Export errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExportError {
    /// Writing the export file failed.
    #[error("Failed to write {path}: {message}")]
    Io {
        /// Target path.
        path: String,
        /// Description of the I/O failure.
        message: String,
    },

    /// The snapshot could not be serialized.
    #[error("Serialization failed: {message}")]
    Serialize {
        /// Description of the serialization failure.
        message: String,
    },

    /// Gathering the snapshot failed.
    #[error(transparent)]
    Metrics(#[from] MetricsError),
}

/// Configuration errors.
///
/// These errors represent failures in configuration loading and validation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Required configuration is missing.
    #[error("Missing required: {var}")]
    MissingRequired {
        /// The missing variable name.
        var: String,
    },

    /// Configuration value is invalid.
    #[error("Invalid value for {var}: {reason}")]
    InvalidValue {
        /// The variable name.
        var: String,
        /// Why the value is invalid.
        reason: String,
    },
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use static_assertions::assert_impl_all;

    // Type assertions - verify all errors implement required traits
    assert_impl_all!(AppError: Send, Sync, std::error::Error);
    assert_impl_all!(MetricsError: Send, Sync, std::error::Error, Clone);
    assert_impl_all!(StorageError: Send, Sync, std::error::Error, Clone);
    assert_impl_all!(ExportError: Send, Sync, std::error::Error, Clone);
    assert_impl_all!(ConfigError: Send, Sync, std::error::Error, Clone);

    #[test]
    fn test_invalid_metric_value_display() {
        let err = MetricsError::invalid("recording.duration_ms", "value must be finite");
        assert_eq!(
            err.to_string(),
            "Invalid metric value for 'recording.duration_ms': value must be finite"
        );
        assert!(err.is_caller_error());
    }

    #[test]
    fn test_storage_unavailable_from_storage_error() {
        let err: MetricsError = StorageError::ConnectionFailed {
            message: "disk full".into(),
        }
        .into();
        assert!(!err.is_caller_error());
        assert_eq!(
            err.to_string(),
            "Storage unavailable: Database connection failed: disk full"
        );
    }

    #[test]
    fn test_export_error_is_transparent_for_metrics() {
        let err: ExportError = MetricsError::invalid("x", "bad").into();
        assert_eq!(err.to_string(), "Invalid metric value for 'x': bad");
    }

    #[test]
    fn test_export_io_display() {
        let err = ExportError::Io {
            path: "/tmp/out.json".into(),
            message: "permission denied".into(),
        };
        assert_eq!(
            err.to_string(),
            "Failed to write /tmp/out.json: permission denied"
        );
    }

    #[test]
    fn test_app_error_display_config() {
        let err = AppError::Config(ConfigError::InvalidValue {
            var: "BASELINE_PERCENTILE".into(),
            reason: "must be between 0 and 100".into(),
        });
        assert_eq!(
            err.to_string(),
            "Configuration error: Invalid value for BASELINE_PERCENTILE: must be between 0 and 100"
        );
    }

    #[test]
    fn test_app_error_storage_reaches_through_metrics() {
        let err: AppError = MetricsError::from(StorageError::MigrationFailed {
            version: "001".into(),
            message: "syntax error".into(),
        })
        .into();
        assert!(matches!(
            err,
            AppError::Metrics(MetricsError::StorageUnavailable(_))
        ));
        assert_eq!(
            err.to_string(),
            "Metrics error: Storage unavailable: Migration failed: 001 - syntax error"
        );
    }
}
