//! Fixed-width text rendering.

use std::fmt::Write;

use super::report::{Dashboard, DashboardSnapshot, MetricDetail};
use crate::baseline::{Baseline, DeviationAlert};
use crate::error::MetricsError;
use crate::metrics::Tags;

/// Line shown when the store holds no metrics at all.
pub const EMPTY_MESSAGE: &str = "no metrics recorded";

const NAME_WIDTH: usize = 32;

fn optional(value: Option<f64>, suffix: &str) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.2}{suffix}"))
}

/// Render a snapshot as a summary table.
#[must_use]
pub fn render_summary(snapshot: &DashboardSnapshot) -> String {
    if snapshot.metrics.is_empty() {
        return format!("{EMPTY_MESSAGE}\n");
    }

    let mut out = String::new();
    let _ = writeln!(
        out,
        "Metrics summary, last {}h (generated {})",
        snapshot.time_window_hours,
        snapshot.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    let _ = writeln!(
        out,
        "{:<NAME_WIDTH$} {:>8} {:>12} {:>12} {:>12} {:>12} {:>10}",
        "metric", "count", "average", "p50", "p95", "baseline", "deviation"
    );
    let _ = writeln!(out, "{}", "-".repeat(NAME_WIDTH + 72));

    for (name, report) in &snapshot.metrics {
        let _ = writeln!(
            out,
            "{:<NAME_WIDTH$} {:>8} {:>12.2} {:>12.2} {:>12.2} {:>12} {:>10}",
            name,
            report.count,
            report.average,
            report.p50,
            report.p95,
            optional(report.baseline, ""),
            optional(report.deviation_percent, "%"),
        );
    }

    if !snapshot.alerts.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Active alerts: {}", snapshot.alerts.len());
        out.push_str(&render_alerts(&snapshot.alerts));
    }
    out
}

fn tag_suffix(tags: &Tags) -> String {
    if tags.is_empty() {
        return String::new();
    }
    let pairs: Vec<String> = tags.iter().map(|(k, v)| format!("{k}={v}")).collect();
    format!(" {{{}}}", pairs.join(","))
}

/// One line per alert, or a single "no active alerts" line.
#[must_use]
pub fn render_alerts(alerts: &[DeviationAlert]) -> String {
    if alerts.is_empty() {
        return "no active alerts\n".to_string();
    }
    let mut out = String::new();
    for alert in alerts {
        let _ = writeln!(
            out,
            "  [{}] {}{} current={:.2} baseline={:.2} deviation={:.1}%",
            alert.severity,
            alert.metric_name,
            tag_suffix(&alert.tags),
            alert.current_value,
            alert.baseline_value,
            alert.deviation_percent,
        );
    }
    out
}

/// One line per cached baseline.
#[must_use]
pub fn render_baselines(baselines: &[Baseline]) -> String {
    if baselines.is_empty() {
        return "no baselines computed\n".to_string();
    }
    let mut out = String::new();
    for baseline in baselines {
        let _ = writeln!(
            out,
            "  {}{} p{}={:.4} samples={} computed={}",
            baseline.metric_name,
            tag_suffix(&baseline.tags),
            baseline.percentile,
            baseline.baseline_value,
            baseline.sample_count,
            baseline.computed_at.format("%Y-%m-%d %H:%M:%S UTC"),
        );
    }
    out
}

/// Render the full breakdown of one metric.
#[must_use]
pub fn render_detail(detail: &MetricDetail) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} (last {}h)", detail.name, detail.time_window_hours);
    if detail.count == 0 {
        let _ = writeln!(out, "  no samples in window");
    } else {
        let rows = [
            ("min", detail.min),
            ("max", detail.max),
            ("average", detail.average),
            ("p50", detail.p50),
            ("p95", detail.p95),
            ("p99", detail.p99),
        ];
        let _ = writeln!(out, "  {:<10} {:>14}", "count", detail.count);
        for (label, value) in rows {
            let _ = writeln!(out, "  {label:<10} {value:>14.4}");
        }
    }
    let _ = writeln!(out, "  {:<10} {:>14}", "latest", optional(detail.latest, ""));
    let _ = writeln!(out, "  {:<10} {:>14}", "baseline", optional(detail.baseline, ""));
    let _ = writeln!(
        out,
        "  {:<10} {:>14}",
        "deviation",
        optional(detail.deviation_percent, "%")
    );
    out
}

impl Dashboard {
    /// Summary table over the last `hours`.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::StorageUnavailable`] if the store fails.
    pub async fn summary(&self, hours: u32) -> Result<String, MetricsError> {
        Ok(render_summary(&self.snapshot(hours).await?))
    }

    /// Detail view of one metric over the last `hours`.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::StorageUnavailable`] if the store fails.
    pub async fn detail(&self, name: &str, hours: u32) -> Result<String, MetricsError> {
        Ok(render_detail(&self.metric_detail(name, hours).await?))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::dashboard::MetricReport;
    use crate::test_utils::fixed_time;
    use pretty_assertions::assert_eq;

    fn snapshot(metrics: BTreeMap<String, MetricReport>) -> DashboardSnapshot {
        DashboardSnapshot {
            generated_at: fixed_time(),
            time_window_hours: 24,
            metrics,
            alerts: Vec::new(),
        }
    }

    #[test]
    fn test_empty_summary() {
        assert_eq!(render_summary(&snapshot(BTreeMap::new())), "no metrics recorded\n");
    }

    #[test]
    fn test_summary_rows() {
        let mut metrics = BTreeMap::new();
        metrics.insert(
            "request.duration".to_string(),
            MetricReport {
                count: 10,
                average: 55.0,
                p50: 55.0,
                p95: 95.5,
                p99: 99.1,
                baseline: Some(95.5),
                deviation_percent: Some(4.712),
            },
        );
        metrics.insert(
            "cpu".to_string(),
            MetricReport {
                count: 1,
                average: 0.5,
                p50: 0.5,
                p95: 0.5,
                p99: 0.5,
                baseline: None,
                deviation_percent: None,
            },
        );

        let text = render_summary(&snapshot(metrics));
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Metrics summary, last 24h (generated 2024-03-01 12:00:00 UTC)");
        assert!(lines[1].starts_with("metric "));
        // Rows sorted by name.
        assert!(lines[3].starts_with("cpu "));
        assert!(lines[3].trim_end().ends_with('-'));
        assert!(lines[4].starts_with("request.duration "));
        assert!(lines[4].ends_with("4.71%"));
        assert_eq!(lines[3].len(), lines[4].len());
    }

    #[test]
    fn test_render_alerts() {
        use crate::baseline::Severity;
        use crate::metrics::tags;

        assert_eq!(render_alerts(&[]), "no active alerts\n");
        let alert = DeviationAlert {
            metric_name: "input.level".into(),
            current_value: 13.0,
            baseline_value: 10.0,
            deviation_percent: 30.0,
            severity: Severity::Warning,
            timestamp: fixed_time(),
            tags: tags([("device", "usb")]),
        };
        assert_eq!(
            render_alerts(&[alert]),
            "  [warning] input.level {device=usb} current=13.00 baseline=10.00 deviation=30.0%\n"
        );
    }

    #[test]
    fn test_render_baselines() {
        assert_eq!(render_baselines(&[]), "no baselines computed\n");
        let baseline = Baseline {
            metric_name: "request.duration".into(),
            tags: Tags::new(),
            baseline_value: 95.5,
            percentile: 95.0,
            computed_at: fixed_time(),
            sample_count: 10,
        };
        assert_eq!(
            render_baselines(&[baseline]),
            "  request.duration p95=95.5000 samples=10 computed=2024-03-01 12:00:00 UTC\n"
        );
    }

    #[test]
    fn test_detail_without_samples() {
        let detail = MetricDetail {
            name: "cpu".into(),
            time_window_hours: 6,
            count: 0,
            min: 0.0,
            max: 0.0,
            average: 0.0,
            p50: 0.0,
            p95: 0.0,
            p99: 0.0,
            latest: None,
            baseline: None,
            deviation_percent: None,
        };
        let text = render_detail(&detail);
        assert!(text.starts_with("cpu (last 6h)\n  no samples in window\n"));
        assert!(text.contains("baseline"));
    }

    #[test]
    fn test_detail_rows() {
        let detail = MetricDetail {
            name: "request.duration".into(),
            time_window_hours: 24,
            count: 10,
            min: 10.0,
            max: 100.0,
            average: 55.0,
            p50: 55.0,
            p95: 95.5,
            p99: 99.1,
            latest: Some(100.0),
            baseline: Some(95.5),
            deviation_percent: Some(4.712),
        };
        let text = render_detail(&detail);
        assert!(text.contains("  p99               99.1000\n"));
        assert!(text.contains("  deviation           4.71%\n"));
    }
}
