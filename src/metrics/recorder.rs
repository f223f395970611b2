//! Best-effort recording for instrumented code.
//!
//! Losing a metric is acceptable; failing the operation being measured is
//! not. [`MetricsHandle`] logs and drops every recording error.

use std::future::Future;
use std::time::Instant;

use super::aggregator::MetricsAggregator;
use super::types::Tags;
use crate::error::MetricsError;

/// Cheap, cloneable producer handle.
///
/// ```no_run
/// # async fn demo(aggregator: metrics_baseline::metrics::MetricsAggregator) {
/// use metrics_baseline::metrics::{tags, MetricsHandle};
///
/// let metrics = MetricsHandle::new(aggregator);
/// metrics.incr("recording.started", &tags([("device", "usb")])).await;
/// let bytes = metrics
///     .time("recording.flush_ms", &tags([]), async { 4096_u64 })
///     .await;
/// assert_eq!(bytes, 4096);
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct MetricsHandle {
    aggregator: MetricsAggregator,
}

impl MetricsHandle {
    /// Wrap an aggregator.
    #[must_use]
    pub const fn new(aggregator: MetricsAggregator) -> Self {
        Self { aggregator }
    }

    /// The underlying aggregator.
    #[must_use]
    pub const fn aggregator(&self) -> &MetricsAggregator {
        &self.aggregator
    }

    /// Increment a counter by one.
    pub async fn incr(&self, name: &str, tags: &Tags) {
        self.incr_by(name, 1.0, tags).await;
    }

    /// Increment a counter by `amount`.
    pub async fn incr_by(&self, name: &str, amount: f64, tags: &Tags) {
        let result = self.aggregator.record_counter(name, amount, tags).await;
        log_dropped(name, result);
    }

    /// Set a gauge.
    pub async fn gauge(&self, name: &str, value: f64, tags: &Tags) {
        let result = self.aggregator.record_gauge(name, value, tags).await;
        log_dropped(name, result);
    }

    /// Add a histogram sample.
    pub async fn observe(&self, name: &str, value: f64, tags: &Tags) {
        let result = self.aggregator.record_histogram(name, value, tags).await;
        log_dropped(name, result);
    }

    /// Await `fut` and record its wall time in milliseconds as a histogram
    /// sample. The future's output is returned untouched.
    pub async fn time<F, T>(&self, name: &str, tags: &Tags, fut: F) -> T
    where
        F: Future<Output = T>,
    {
        let started = Instant::now();
        let output = fut.await;
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        self.observe(name, elapsed_ms, tags).await;
        output
    }
}

fn log_dropped(name: &str, result: Result<(), MetricsError>) {
    match result {
        Ok(()) => {}
        Err(e @ MetricsError::InvalidMetricValue { .. }) => {
            tracing::warn!(metric = %name, error = %e, "Dropped invalid metric");
        }
        Err(e @ MetricsError::StorageUnavailable(_)) => {
            tracing::warn!(metric = %name, error = %e, "Dropped metric: storage unavailable");
        }
    }
}
