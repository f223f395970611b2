//! Trait definitions for mockable dependencies.
//!
//! This module defines traits for:
//! - [`MetricStore`]: Time-series storage abstraction
//! - [`TimeProvider`]: Time abstraction for testing
//!
//! # Mocking
//!
//! All traits are annotated with `#[cfg_attr(test, mockall::automock)]`
//! which generates mock implementations automatically for testing.
//!
//! # Example
//!
//! ```
//! use metrics_baseline::traits::{ManualTimeProvider, TimeProvider};
//! use chrono::{Duration, TimeZone, Utc};
//!
//! let start = Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap();
//! let clock = ManualTimeProvider::new(start);
//! clock.advance(Duration::minutes(5));
//! assert_eq!(clock.now(), start + Duration::minutes(5));
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use crate::error::StorageError;
use crate::metrics::{MetricQuery, MetricSnapshot, MetricStats};

/// Append-only metric time-series store.
///
/// Row queries honour [`MetricQuery::limit`]; reducers (`values`, `stats`)
/// always see every matching row.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MetricStore: Send + Sync {
    /// Append one snapshot, returning its row id.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the insert fails.
    async fn append(&self, snapshot: &MetricSnapshot) -> Result<i64, StorageError>;

    /// Append many snapshots atomically, returning how many were written.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if any insert fails; nothing is written then.
    async fn append_batch(&self, snapshots: &[MetricSnapshot]) -> Result<u64, StorageError>;

    /// Matching snapshots, oldest first, truncated to the query limit.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the database operation fails.
    async fn query(&self, query: &MetricQuery) -> Result<Vec<MetricSnapshot>, StorageError>;

    /// Every matching value, unordered and untruncated.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the database operation fails.
    async fn values(&self, query: &MetricQuery) -> Result<Vec<f64>, StorageError>;

    /// Count/sum/min/max of every matching value.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the database operation fails.
    async fn stats(&self, query: &MetricQuery) -> Result<MetricStats, StorageError>;

    /// Most recent matching snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the database operation fails.
    async fn latest(&self, query: &MetricQuery) -> Result<Option<MetricSnapshot>, StorageError>;

    /// Every distinct metric name.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the database operation fails.
    async fn metric_names(&self) -> Result<BTreeSet<String>, StorageError>;

    /// Tag keys seen on `name`, with every value seen per key.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the database operation fails.
    async fn tag_values(
        &self,
        name: &str,
    ) -> Result<BTreeMap<String, BTreeSet<String>>, StorageError>;

    /// Delete snapshots older than `cutoff`, returning how many were removed.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the database operation fails.
    async fn prune_before(&self, cutoff: DateTime<Utc>) -> Result<u64, StorageError>;
}

/// Time provider trait for deterministic testing.
///
/// This trait abstracts time operations to allow for
/// deterministic testing by providing fixed timestamps.
#[cfg_attr(test, mockall::automock)]
pub trait TimeProvider: Send + Sync {
    /// Get the current time.
    fn now(&self) -> DateTime<Utc>;
}

/// Real time provider using system clock.
///
/// This is the production implementation that returns the actual current time.
#[derive(Debug, Clone, Copy, Default)]
pub struct RealTimeProvider;

impl TimeProvider for RealTimeProvider {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Hand-driven clock.
///
/// Clones share the same instant, so a test can hold one copy while the
/// aggregator and baseline engine hold others.
#[derive(Debug, Clone)]
pub struct ManualTimeProvider {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualTimeProvider {
    /// Start the clock at `start`.
    #[must_use]
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    /// Jump to `instant`.
    pub fn set(&self, instant: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = instant;
    }

    /// Move the clock forward (or back, for negative durations).
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }
}

impl TimeProvider for ManualTimeProvider {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::float_cmp
)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use static_assertions::assert_impl_all;

    assert_impl_all!(RealTimeProvider: Send, Sync, Clone, Copy, Default);
    assert_impl_all!(ManualTimeProvider: Send, Sync, Clone);

    #[test]
    fn test_real_time_provider_now() {
        let provider = RealTimeProvider;
        let before = Utc::now();
        let now = provider.now();
        let after = Utc::now();
        assert!(now >= before);
        assert!(now <= after);
    }

    #[test]
    fn test_manual_time_provider_is_shared_between_clones() {
        let start = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let clock = ManualTimeProvider::new(start);
        let other = clock.clone();

        clock.advance(Duration::hours(2));
        assert_eq!(other.now(), start + Duration::hours(2));

        other.set(start);
        assert_eq!(clock.now(), start);
    }

    #[test]
    fn test_mock_time_provider() {
        let fixed = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let mut mock = MockTimeProvider::new();
        mock.expect_now().return_const(fixed);
        assert_eq!(mock.now(), fixed);
    }
}
