//! Dashboard snapshot assembly and alert collection.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use futures_util::future::try_join_all;
use serde::{Deserialize, Serialize};

use crate::baseline::{BaselineEngine, DeviationAlert};
use crate::error::MetricsError;
use crate::metrics::{window_start, MetricQuery, MetricsAggregator, Tags};

/// Percentiles shown for every metric.
pub(crate) const REPORT_PERCENTILES: [f64; 3] = [50.0, 95.0, 99.0];

/// Default report window.
pub const DEFAULT_WINDOW_HOURS: u32 = 24;

/// Largest report window the CLI accepts, matching the retention cap.
pub const MAX_WINDOW_HOURS: u32 = crate::config::MAX_RETENTION_DAYS * 24;

/// Per-metric row of a [`DashboardSnapshot`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricReport {
    /// Samples in the window.
    pub count: u64,
    /// Mean over the window.
    pub average: f64,
    /// Median over the window.
    pub p50: f64,
    /// 95th percentile over the window.
    pub p95: f64,
    /// 99th percentile over the window.
    pub p99: f64,
    /// Cached untagged baseline, if any.
    pub baseline: Option<f64>,
    /// Deviation of the latest sample from `baseline`.
    pub deviation_percent: Option<f64>,
}

/// Everything the summary, JSON and CSV outputs are rendered from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardSnapshot {
    /// When the snapshot was taken.
    pub generated_at: DateTime<Utc>,
    /// Look-back window in hours.
    pub time_window_hours: u32,
    /// Reports keyed (and sorted) by metric name.
    pub metrics: BTreeMap<String, MetricReport>,
    /// Active alerts at snapshot time.
    pub alerts: Vec<DeviationAlert>,
}

/// Full breakdown for one metric, used by [`Dashboard::detail`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricDetail {
    /// Metric name.
    pub name: String,
    /// Look-back window in hours.
    pub time_window_hours: u32,
    /// Samples in the window.
    pub count: u64,
    /// Smallest value in the window.
    pub min: f64,
    /// Largest value in the window.
    pub max: f64,
    /// Mean over the window.
    pub average: f64,
    /// Median.
    pub p50: f64,
    /// 95th percentile.
    pub p95: f64,
    /// 99th percentile.
    pub p99: f64,
    /// Most recent sample, regardless of window.
    pub latest: Option<f64>,
    /// Cached untagged baseline.
    pub baseline: Option<f64>,
    /// Deviation of `latest` from `baseline`.
    pub deviation_percent: Option<f64>,
}

/// Read-only view over the aggregator and baseline engine.
///
/// Holds no state of its own; every call reads the current store and the
/// engine's cache.
#[derive(Debug, Clone)]
pub struct Dashboard {
    aggregator: MetricsAggregator,
    engine: Arc<BaselineEngine>,
}

impl Dashboard {
    /// Create a dashboard over `engine` and the aggregator it reads from.
    #[must_use]
    pub fn new(engine: Arc<BaselineEngine>) -> Self {
        Self {
            aggregator: engine.aggregator().clone(),
            engine,
        }
    }

    /// The baseline engine backing this dashboard.
    #[must_use]
    pub fn engine(&self) -> &BaselineEngine {
        &self.engine
    }

    fn window_query(&self, name: &str, hours: u32) -> MetricQuery {
        let start = window_start(self.aggregator.now(), Duration::hours(i64::from(hours)));
        MetricQuery::named(name).since(start)
    }

    /// Build the structure behind `summary` and the exports.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::StorageUnavailable`] if the store fails.
    pub async fn snapshot(&self, hours: u32) -> Result<DashboardSnapshot, MetricsError> {
        let names = self.aggregator.metric_names().await?;
        let reports = try_join_all(names.iter().map(|name| self.report(name, hours))).await?;
        let alerts = self.active_alerts().await?;

        Ok(DashboardSnapshot {
            generated_at: self.aggregator.now(),
            time_window_hours: hours,
            metrics: names.into_iter().zip(reports).collect(),
            alerts,
        })
    }

    async fn report(&self, name: &str, hours: u32) -> Result<MetricReport, MetricsError> {
        let query = self.window_query(name, hours);
        let stats = self.aggregator.stats(&query).await?;
        let percentiles = self
            .aggregator
            .percentiles(&query, &REPORT_PERCENTILES)
            .await?;
        let (baseline, deviation_percent) = self.current_deviation(name).await?;

        Ok(MetricReport {
            count: stats.count,
            average: stats.average(),
            p50: percentiles.get(50.0).unwrap_or(0.0),
            p95: percentiles.get(95.0).unwrap_or(0.0),
            p99: percentiles.get(99.0).unwrap_or(0.0),
            baseline,
            deviation_percent,
        })
    }

    async fn current_deviation(
        &self,
        name: &str,
    ) -> Result<(Option<f64>, Option<f64>), MetricsError> {
        let untagged = Tags::new();
        let Some(baseline) = self.engine.get_baseline(name, &untagged) else {
            return Ok((None, None));
        };
        let latest = self.aggregator.latest(name, &untagged).await?;
        let deviation = latest.and_then(|sample| {
            self.engine
                .deviation_percent(name, sample.value, &untagged)
        });
        Ok((Some(baseline.baseline_value), deviation))
    }

    /// Full statistics for one metric over the window.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::StorageUnavailable`] if the store fails.
    pub async fn metric_detail(&self, name: &str, hours: u32) -> Result<MetricDetail, MetricsError> {
        let query = self.window_query(name, hours);
        let stats = self.aggregator.stats(&query).await?;
        let percentiles = self
            .aggregator
            .percentiles(&query, &REPORT_PERCENTILES)
            .await?;
        let latest = self
            .aggregator
            .latest(name, &Tags::new())
            .await?
            .map(|s| s.value);
        let baseline = self.engine.get_baseline(name, &Tags::new());
        let deviation_percent = latest.and_then(|v| self.engine.deviation_percent(name, v, &Tags::new()));

        Ok(MetricDetail {
            name: name.to_string(),
            time_window_hours: hours,
            count: stats.count,
            min: stats.min,
            max: stats.max,
            average: stats.average(),
            p50: percentiles.get(50.0).unwrap_or(0.0),
            p95: percentiles.get(95.0).unwrap_or(0.0),
            p99: percentiles.get(99.0).unwrap_or(0.0),
            latest,
            baseline: baseline.map(|b| b.baseline_value),
            deviation_percent,
        })
    }

    /// Check the latest sample of every cached baseline and return the
    /// ones that crossed a threshold, most severe first.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::StorageUnavailable`] if the store fails.
    pub async fn active_alerts(&self) -> Result<Vec<DeviationAlert>, MetricsError> {
        let baselines = self.engine.baselines();
        let latest = try_join_all(
            baselines
                .iter()
                .map(|b| self.aggregator.latest(&b.metric_name, &b.tags)),
        )
        .await?;

        let mut alerts: Vec<DeviationAlert> = baselines
            .iter()
            .zip(latest)
            .filter_map(|(baseline, sample)| {
                let sample = sample?;
                self.engine
                    .check_deviation(&baseline.metric_name, sample.value, &baseline.tags)
            })
            .collect();
        alerts.sort_by(|a, b| b.severity.cmp(&a.severity));
        Ok(alerts)
    }
}

/// One-line, user-facing description of a failure.
///
/// Walks to the innermost cause so the line names the real problem rather
/// than the layers it passed through.
#[must_use]
pub fn diagnostic(err: &(dyn std::error::Error + 'static)) -> String {
    let mut root = err;
    while let Some(source) = root.source() {
        root = source;
    }
    format!("metrics unavailable: {root}")
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
    use crate::baseline::Severity;
    use crate::error::{AppError, StorageError};
    use crate::metrics::tags;
    use crate::test_utils::test_aggregator;
    use crate::traits::ManualTimeProvider;

    async fn dashboard() -> (Dashboard, ManualTimeProvider) {
        let (agg, clock) = test_aggregator().await;
        (
            Dashboard::new(Arc::new(BaselineEngine::with_defaults(agg))),
            clock,
        )
    }

    async fn record_tens(dash: &Dashboard, clock: &ManualTimeProvider) {
        for i in 1..=10 {
            dash.aggregator
                .record_histogram("request.duration", f64::from(i) * 10.0, &Tags::new())
                .await
                .unwrap();
            clock.advance(Duration::seconds(1));
        }
    }

    #[tokio::test]
    async fn test_empty_snapshot() {
        let (dash, _clock) = dashboard().await;
        let snap = dash.snapshot(24).await.unwrap();
        assert!(snap.metrics.is_empty());
        assert!(snap.alerts.is_empty());
        assert_eq!(snap.time_window_hours, 24);
    }

    #[tokio::test]
    async fn test_huge_window_does_not_overflow() {
        let (dash, clock) = dashboard().await;
        record_tens(&dash, &clock).await;

        let snap = dash.snapshot(u32::MAX).await.unwrap();
        assert_eq!(snap.metrics["request.duration"].count, 10);
        let detail = dash
            .metric_detail("request.duration", 3_000_000_000)
            .await
            .unwrap();
        assert_eq!(detail.count, 10);
    }

    #[tokio::test]
    async fn test_snapshot_without_baseline() {
        let (dash, clock) = dashboard().await;
        record_tens(&dash, &clock).await;

        let snap = dash.snapshot(24).await.unwrap();
        let report = &snap.metrics["request.duration"];
        assert_eq!(report.count, 10);
        assert!((report.average - 55.0).abs() < 1e-9);
        assert!((report.p50 - 55.0).abs() < 1e-9);
        assert!((report.p95 - 95.5).abs() < 1e-9);
        assert_eq!(report.baseline, None);
        assert_eq!(report.deviation_percent, None);
    }

    #[tokio::test]
    async fn test_snapshot_with_baseline_and_alert() {
        let (dash, clock) = dashboard().await;
        record_tens(&dash, &clock).await;
        dash.engine().update_baselines(None).await.unwrap();

        dash.aggregator
            .record_histogram("request.duration", 200.0, &Tags::new())
            .await
            .unwrap();

        let snap = dash.snapshot(24).await.unwrap();
        let report = &snap.metrics["request.duration"];
        assert_eq!(report.count, 11);
        assert!((report.baseline.unwrap() - 95.5).abs() < 1e-9);
        assert!(report.deviation_percent.unwrap() > 100.0);

        assert_eq!(snap.alerts.len(), 1);
        assert_eq!(snap.alerts[0].severity, Severity::Critical);
        assert_eq!(snap.alerts[0].current_value, 200.0);
    }

    #[tokio::test]
    async fn test_window_excludes_old_samples() {
        let (dash, clock) = dashboard().await;
        record_tens(&dash, &clock).await;
        clock.advance(Duration::hours(25));
        dash.aggregator
            .record_gauge("cpu", 0.5, &Tags::new())
            .await
            .unwrap();

        let snap = dash.snapshot(24).await.unwrap();
        assert_eq!(snap.metrics["request.duration"].count, 0);
        assert_eq!(snap.metrics["request.duration"].average, 0.0);
        assert_eq!(snap.metrics["cpu"].count, 1);

        let wide = dash.snapshot(48).await.unwrap();
        assert_eq!(wide.metrics["request.duration"].count, 10);
    }

    #[tokio::test]
    async fn test_alerts_for_tagged_baseline() {
        let (dash, clock) = dashboard().await;
        let usb = tags([("device", "usb")]);
        for _ in 0..10 {
            dash.aggregator
                .record_gauge("input.level", 10.0, &usb)
                .await
                .unwrap();
        }
        clock.advance(Duration::seconds(1));
        dash.engine()
            .refresh_baseline("input.level", &usb)
            .await
            .unwrap();
        dash.aggregator
            .record_gauge("input.level", 13.0, &usb)
            .await
            .unwrap();

        let alerts = dash.active_alerts().await.unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].severity, Severity::Warning);
        assert_eq!(alerts[0].tags, usb);
    }

    #[tokio::test]
    async fn test_no_alert_within_threshold() {
        let (dash, clock) = dashboard().await;
        record_tens(&dash, &clock).await;
        dash.engine().update_baselines(None).await.unwrap();
        dash.aggregator
            .record_histogram("request.duration", 100.0, &Tags::new())
            .await
            .unwrap();

        assert!(dash.active_alerts().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_metric_detail() {
        let (dash, clock) = dashboard().await;
        record_tens(&dash, &clock).await;

        let detail = dash.metric_detail("request.duration", 24).await.unwrap();
        assert_eq!(detail.count, 10);
        assert_eq!(detail.min, 10.0);
        assert_eq!(detail.max, 100.0);
        assert_eq!(detail.latest, Some(100.0));
        assert!((detail.p99 - 99.1).abs() < 1e-9);
    }

    #[test]
    fn test_diagnostic_names_root_cause() {
        let err = AppError::from(MetricsError::from(StorageError::ConnectionFailed {
            message: "unable to open database file".into(),
        }));
        assert_eq!(
            diagnostic(&err),
            "metrics unavailable: Database connection failed: unable to open database file"
        );
    }

    #[test]
    fn test_diagnostic_single_line_for_leaf_error() {
        let err = StorageError::Internal {
            message: "bad row".into(),
        };
        let line = diagnostic(&err);
        assert!(line.starts_with("metrics unavailable: "));
        assert!(!line.contains('\n'));
    }
}
