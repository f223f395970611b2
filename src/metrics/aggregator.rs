//! The metrics aggregator: validated writes and reducer queries.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, SubsecRound, Utc};

use super::query::MetricQuery;
use super::stats::{compute_percentiles, MetricStats, Percentiles};
use super::types::{MetricKind, MetricSnapshot, Tags};
use super::validation::{validate_percentile, TagPolicy};
use crate::error::MetricsError;
use crate::storage::SqliteStorage;
use crate::traits::{MetricStore, RealTimeProvider, TimeProvider};

/// Owns the time-series store.
///
/// Construct one per process and hand clones to producers, the baseline
/// engine and the dashboard. Clones share the same store, clock and tag
/// policy.
#[derive(Clone)]
pub struct MetricsAggregator {
    store: Arc<dyn MetricStore>,
    clock: Arc<dyn TimeProvider>,
    policy: Arc<TagPolicy>,
}

impl std::fmt::Debug for MetricsAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsAggregator")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl MetricsAggregator {
    /// Wrap a store, using the system clock and a permissive tag policy.
    #[must_use]
    pub fn new(store: Arc<dyn MetricStore>) -> Self {
        Self {
            store,
            clock: Arc::new(RealTimeProvider),
            policy: Arc::new(TagPolicy::new()),
        }
    }

    /// Open (or create) a file-backed store.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::StorageUnavailable`] if the database cannot
    /// be opened or migrated.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, MetricsError> {
        let storage = SqliteStorage::new(path).await?;
        Ok(Self::new(Arc::new(storage)))
    }

    /// Create an aggregator over a fresh in-memory store.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::StorageUnavailable`] if `SQLite` cannot start.
    pub async fn in_memory() -> Result<Self, MetricsError> {
        let storage = SqliteStorage::new_in_memory().await?;
        Ok(Self::new(Arc::new(storage)))
    }

    /// Replace the clock used for timestamps and windows.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn TimeProvider>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the tag policy applied to writes.
    #[must_use]
    pub fn with_policy(mut self, policy: TagPolicy) -> Self {
        self.policy = Arc::new(policy);
        self
    }

    /// Current time according to this aggregator's clock, truncated to the
    /// microsecond precision the store keeps.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now().trunc_subsecs(6)
    }

    // ------------------------------------------------------------------------
    // Write path
    // ------------------------------------------------------------------------

    /// Record a counter increment.
    ///
    /// # Errors
    ///
    /// [`MetricsError::InvalidMetricValue`] for a bad name/tag or a
    /// non-finite or negative increment; [`MetricsError::StorageUnavailable`]
    /// if the insert fails.
    pub async fn record_counter(
        &self,
        name: &str,
        increment: f64,
        tags: &Tags,
    ) -> Result<(), MetricsError> {
        self.record_now(MetricKind::Counter, name, increment, tags)
            .await
    }

    /// Record a point-in-time gauge value.
    ///
    /// # Errors
    ///
    /// See [`MetricsAggregator::record_counter`].
    pub async fn record_gauge(&self, name: &str, value: f64, tags: &Tags) -> Result<(), MetricsError> {
        self.record_now(MetricKind::Gauge, name, value, tags).await
    }

    /// Record one histogram sample.
    ///
    /// # Errors
    ///
    /// See [`MetricsAggregator::record_counter`].
    pub async fn record_histogram(
        &self,
        name: &str,
        value: f64,
        tags: &Tags,
    ) -> Result<(), MetricsError> {
        self.record_now(MetricKind::Histogram, name, value, tags)
            .await
    }

    /// Record a pre-reduced summary value.
    ///
    /// # Errors
    ///
    /// See [`MetricsAggregator::record_counter`].
    pub async fn record_summary(
        &self,
        name: &str,
        value: f64,
        tags: &Tags,
    ) -> Result<(), MetricsError> {
        self.record_now(MetricKind::Summary, name, value, tags)
            .await
    }

    /// Record a fully formed snapshot, keeping its own timestamp and metadata.
    ///
    /// # Errors
    ///
    /// See [`MetricsAggregator::record_counter`].
    pub async fn record(&self, snapshot: MetricSnapshot) -> Result<(), MetricsError> {
        self.validate(&snapshot)?;
        self.store.append(&snapshot).await?;
        Ok(())
    }

    /// Record many snapshots atomically. Nothing is written if any snapshot
    /// is invalid or the store fails.
    ///
    /// # Errors
    ///
    /// See [`MetricsAggregator::record_counter`].
    pub async fn record_batch(&self, snapshots: &[MetricSnapshot]) -> Result<u64, MetricsError> {
        for snapshot in snapshots {
            self.validate(snapshot)?;
        }
        Ok(self.store.append_batch(snapshots).await?)
    }

    async fn record_now(
        &self,
        kind: MetricKind,
        name: &str,
        value: f64,
        tags: &Tags,
    ) -> Result<(), MetricsError> {
        let snapshot =
            MetricSnapshot::new(kind, name, value, self.now()).with_tags(tags.clone());
        self.record(snapshot).await
    }

    fn validate(&self, snapshot: &MetricSnapshot) -> Result<(), MetricsError> {
        self.policy
            .check(&snapshot.name, snapshot.value, &snapshot.tags)?;
        if snapshot.kind == MetricKind::Counter && snapshot.value < 0.0 {
            return Err(MetricsError::invalid(
                &snapshot.name,
                format!("counter increment must not be negative, got {}", snapshot.value),
            ));
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Read path
    // ------------------------------------------------------------------------

    /// Matching snapshots, oldest first, truncated to `query.limit`.
    /// No matches is an empty list, not an error.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::StorageUnavailable`] if the read fails.
    pub async fn query(&self, query: &MetricQuery) -> Result<Vec<MetricSnapshot>, MetricsError> {
        Ok(self.store.query(query).await?)
    }

    /// Count/sum/min/max over every match (the limit does not apply).
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::StorageUnavailable`] if the read fails.
    pub async fn stats(&self, query: &MetricQuery) -> Result<MetricStats, MetricsError> {
        Ok(self.store.stats(query).await?)
    }

    /// Sum of matching values; 0.0 when nothing matches.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::StorageUnavailable`] if the read fails.
    pub async fn sum(&self, query: &MetricQuery) -> Result<f64, MetricsError> {
        Ok(self.stats(query).await?.sum)
    }

    /// Mean of matching values; 0.0 when nothing matches.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::StorageUnavailable`] if the read fails.
    pub async fn average(&self, query: &MetricQuery) -> Result<f64, MetricsError> {
        Ok(self.stats(query).await?.average())
    }

    /// Linear-interpolation percentiles over every match; each requested
    /// percentile maps to 0.0 when nothing matches.
    ///
    /// # Errors
    ///
    /// [`MetricsError::InvalidMetricValue`] for a percentile outside
    /// `[0, 100]`; [`MetricsError::StorageUnavailable`] if the read fails.
    pub async fn percentiles(
        &self,
        query: &MetricQuery,
        requested: &[f64],
    ) -> Result<Percentiles, MetricsError> {
        let label = query.name.as_deref().unwrap_or("*");
        for &p in requested {
            validate_percentile(label, p)?;
        }
        let mut values = self.store.values(query).await?;
        Ok(compute_percentiles(&mut values, requested))
    }

    /// Most recent sample of `name` carrying at least `tags`.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::StorageUnavailable`] if the read fails.
    pub async fn latest(
        &self,
        name: &str,
        tags: &Tags,
    ) -> Result<Option<MetricSnapshot>, MetricsError> {
        Ok(self
            .store
            .latest(&MetricQuery::named(name).tags(tags))
            .await?)
    }

    /// Every metric name seen so far.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::StorageUnavailable`] if the read fails.
    pub async fn metric_names(&self) -> Result<BTreeSet<String>, MetricsError> {
        Ok(self.store.metric_names().await?)
    }

    /// Tag keys of `name` and every value seen per key.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::StorageUnavailable`] if the read fails.
    pub async fn tag_values(
        &self,
        name: &str,
    ) -> Result<BTreeMap<String, BTreeSet<String>>, MetricsError> {
        Ok(self.store.tag_values(name).await?)
    }

    /// Delete snapshots older than `cutoff`.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::StorageUnavailable`] if the delete fails.
    pub async fn prune_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, MetricsError> {
        let removed = self.store.prune_before(cutoff).await?;
        tracing::info!(removed, cutoff = %cutoff, "Pruned metric snapshots");
        Ok(removed)
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
    use crate::error::StorageError;
    use crate::metrics::tags;
    use crate::test_utils::{fixed_clock, fixed_time, test_aggregator};
    use crate::traits::MockMetricStore;
    use chrono::Duration;

    #[tokio::test]
    async fn test_real_clock_sample_reads_back_unchanged() {
        let agg = MetricsAggregator::in_memory().await.unwrap();
        agg.record_gauge("cpu", 0.5, &Tags::new()).await.unwrap();

        let stored = agg.latest("cpu", &Tags::new()).await.unwrap().unwrap();
        assert_eq!(stored.timestamp, stored.timestamp.trunc_subsecs(6));
        let same = agg
            .query(&MetricQuery::named("cpu").since(stored.timestamp))
            .await
            .unwrap();
        assert_eq!(same, vec![stored]);
    }

    #[test]
    fn test_now_is_truncated_to_micros() {
        let clock = fixed_clock();
        clock.set(fixed_time() + Duration::nanoseconds(1_234_567));
        let agg = MetricsAggregator::new(Arc::new(MockMetricStore::new()))
            .with_clock(Arc::new(clock));
        assert_eq!(agg.now(), fixed_time() + Duration::microseconds(1_234));
    }

    #[tokio::test]
    async fn test_counter_sum() {
        let (agg, _clock) = test_aggregator().await;
        for _ in 0..7 {
            agg.record_counter("sessions.started", 1.0, &Tags::new())
                .await
                .unwrap();
        }
        let sum = agg.sum(&MetricQuery::named("sessions.started")).await.unwrap();
        assert_eq!(sum, 7.0);
    }

    #[tokio::test]
    async fn test_gauge_average() {
        let (agg, _clock) = test_aggregator().await;
        for v in [1.5, 2.5, 6.0] {
            agg.record_gauge("buffer.fill", v, &Tags::new()).await.unwrap();
        }
        let avg = agg.average(&MetricQuery::named("buffer.fill")).await.unwrap();
        assert!((avg - 10.0 / 3.0).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_tag_filtered_and_unfiltered_sums() {
        let (agg, _clock) = test_aggregator().await;
        agg.record_counter("errors", 1.0, &tags([("type", "network")]))
            .await
            .unwrap();
        agg.record_counter("errors", 1.0, &tags([("type", "disk")]))
            .await
            .unwrap();

        let network = MetricQuery::named("errors").tag("type", "network");
        assert_eq!(agg.sum(&network).await.unwrap(), 1.0);
        assert_eq!(agg.sum(&MetricQuery::named("errors")).await.unwrap(), 2.0);
    }

    #[tokio::test]
    async fn test_percentiles_of_tens() {
        let (agg, _clock) = test_aggregator().await;
        for i in 1..=10 {
            agg.record_histogram("request.duration", f64::from(i) * 10.0, &Tags::new())
                .await
                .unwrap();
        }
        let p = agg
            .percentiles(&MetricQuery::named("request.duration"), &[0.0, 50.0, 100.0])
            .await
            .unwrap();
        assert_eq!(p.get(0.0), Some(10.0));
        assert!((p.get(50.0).unwrap() - 55.0).abs() < 1e-9);
        assert_eq!(p.get(100.0), Some(100.0));
    }

    #[tokio::test]
    async fn test_empty_reducers_return_zero() {
        let (agg, _clock) = test_aggregator().await;
        let q = MetricQuery::named("never.recorded");
        assert_eq!(agg.sum(&q).await.unwrap(), 0.0);
        assert_eq!(agg.average(&q).await.unwrap(), 0.0);
        let p = agg.percentiles(&q, &[50.0, 95.0]).await.unwrap();
        assert_eq!(p.get(50.0), Some(0.0));
        assert_eq!(p.get(95.0), Some(0.0));
        assert!(agg.query(&q).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rejects_invalid_values() {
        let (agg, _clock) = test_aggregator().await;
        let none = Tags::new();

        for result in [
            agg.record_gauge("cpu", f64::NAN, &none).await,
            agg.record_histogram("latency", f64::INFINITY, &none).await,
            agg.record_counter("", 1.0, &none).await,
            agg.record_counter("errors", -1.0, &none).await,
        ] {
            assert!(matches!(
                result,
                Err(MetricsError::InvalidMetricValue { .. })
            ));
        }
        assert!(agg.metric_names().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_policy_rejects_undeclared_tag() {
        let (agg, _clock) = test_aggregator().await;
        let agg = agg.with_policy(TagPolicy::new().allow_keys("errors", ["type"]));

        let err = agg
            .record_counter("errors", 1.0, &tags([("user", "someone")]))
            .await
            .unwrap_err();
        assert!(err.is_caller_error());
    }

    #[tokio::test]
    async fn test_rejects_invalid_percentile() {
        let (agg, _clock) = test_aggregator().await;
        let result = agg
            .percentiles(&MetricQuery::named("x"), &[50.0, 101.0])
            .await;
        assert!(matches!(
            result,
            Err(MetricsError::InvalidMetricValue { .. })
        ));
    }

    #[tokio::test]
    async fn test_timestamps_come_from_clock() {
        let (agg, clock) = test_aggregator().await;
        let t = clock.now();
        agg.record_gauge("cpu", 0.5, &Tags::new()).await.unwrap();
        clock.advance(Duration::hours(1));
        agg.record_gauge("cpu", 0.7, &Tags::new()).await.unwrap();

        let early = agg
            .query(&MetricQuery::named("cpu").until(t + Duration::minutes(1)))
            .await
            .unwrap();
        assert_eq!(early.len(), 1);
        assert_eq!(early[0].timestamp, t);
    }

    #[tokio::test]
    async fn test_record_batch_is_all_or_nothing() {
        let (agg, clock) = test_aggregator().await;
        let now = clock.now();
        let batch = vec![
            MetricSnapshot::new(MetricKind::Gauge, "cpu", 0.1, now),
            MetricSnapshot::new(MetricKind::Gauge, "cpu", f64::NAN, now),
        ];
        assert!(agg.record_batch(&batch).await.is_err());
        assert!(agg.metric_names().await.unwrap().is_empty());

        let written = agg.record_batch(&batch[..1]).await.unwrap();
        assert_eq!(written, 1);
    }

    #[tokio::test]
    async fn test_latest_and_prune() {
        let (agg, clock) = test_aggregator().await;
        let start = clock.now();
        agg.record_gauge("cpu", 0.1, &Tags::new()).await.unwrap();
        clock.advance(Duration::days(2));
        agg.record_gauge("cpu", 0.9, &Tags::new()).await.unwrap();

        let latest = agg.latest("cpu", &Tags::new()).await.unwrap().unwrap();
        assert_eq!(latest.value, 0.9);

        let removed = agg
            .prune_older_than(start + Duration::days(1))
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert_eq!(agg.stats(&MetricQuery::named("cpu")).await.unwrap().count, 1);
    }

    #[tokio::test]
    async fn test_storage_failure_propagates_on_write() {
        let mut store = MockMetricStore::new();
        store.expect_append().returning(|_| {
            Err(StorageError::QueryFailed {
                query: "INSERT metric_snapshots".into(),
                message: "disk I/O error".into(),
            })
        });
        let agg = MetricsAggregator::new(Arc::new(store)).with_clock(Arc::new(fixed_clock()));

        let err = agg
            .record_counter("errors", 1.0, &Tags::new())
            .await
            .unwrap_err();
        assert!(matches!(err, MetricsError::StorageUnavailable(_)));
    }

    #[tokio::test]
    async fn test_storage_failure_propagates_on_read() {
        let mut store = MockMetricStore::new();
        store.expect_stats().returning(|_| {
            Err(StorageError::ConnectionFailed {
                message: "database is locked".into(),
            })
        });
        let agg = MetricsAggregator::new(Arc::new(store));

        let err = agg.sum(&MetricQuery::named("x")).await.unwrap_err();
        assert!(matches!(err, MetricsError::StorageUnavailable(_)));
    }

    #[tokio::test]
    async fn test_invalid_write_never_reaches_store() {
        let mut store = MockMetricStore::new();
        store.expect_append().never();
        let agg = MetricsAggregator::new(Arc::new(store));

        assert!(agg
            .record_gauge("cpu", f64::NAN, &Tags::new())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_concurrent_writers() {
        let (agg, _clock) = test_aggregator().await;
        let mut handles = Vec::new();
        for worker in 0..8 {
            let agg = agg.clone();
            handles.push(tokio::spawn(async move {
                let id = worker.to_string();
                let worker_tag = tags([("worker", id.as_str())]);
                for _ in 0..25 {
                    agg.record_counter("frames.processed", 1.0, &worker_tag)
                        .await
                        .unwrap();
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let total = agg.sum(&MetricQuery::named("frames.processed")).await.unwrap();
        assert_eq!(total, 200.0);
        let workers = agg.tag_values("frames.processed").await.unwrap();
        assert_eq!(workers.get("worker").unwrap().len(), 8);
    }
}
