//! Dashboard workflow: record → summary → export → re-parse.

use std::sync::Arc;

use metrics_baseline::baseline::BaselineEngine;
use metrics_baseline::dashboard::{Dashboard, DashboardSnapshot, CSV_HEADER};
use metrics_baseline::metrics::{MetricsHandle, Tags};
use pretty_assertions::assert_eq;

use super::common::{aggregator, record_series, tens};

async fn dashboard_with_data() -> Dashboard {
    let (agg, clock) = aggregator().await;
    record_series(&agg, &clock, "request.duration", &tens()).await;

    let handle = MetricsHandle::new(agg.clone());
    for _ in 0..3 {
        handle.incr("errors", &Tags::new()).await;
    }

    let engine = Arc::new(BaselineEngine::with_defaults(agg));
    engine.update_baselines(None).await.unwrap();
    handle.observe("request.duration", 200.0, &Tags::new()).await;
    Dashboard::new(engine)
}

#[tokio::test]
async fn test_json_export_matches_snapshot() {
    let dash = dashboard_with_data().await;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("snapshot.json");

    dash.export_json(&path, 24).await.unwrap();
    let parsed: DashboardSnapshot =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    let live = dash.snapshot(24).await.unwrap();

    let parsed_names: Vec<&String> = parsed.metrics.keys().collect();
    let live_names: Vec<&String> = live.metrics.keys().collect();
    assert_eq!(parsed_names, live_names);

    for (name, expected) in &live.metrics {
        let got = &parsed.metrics[name];
        assert_eq!(got.count, expected.count);
        for (a, b) in [
            (got.average, expected.average),
            (got.p50, expected.p50),
            (got.p95, expected.p95),
            (got.p99, expected.p99),
        ] {
            assert!((a - b).abs() < 1e-6, "{name}: {a} != {b}");
        }
        match (got.deviation_percent, expected.deviation_percent) {
            (Some(a), Some(b)) => assert!((a - b).abs() < 1e-6),
            (None, None) => {}
            other => panic!("{name}: deviation mismatch {other:?}"),
        }
    }
    assert_eq!(parsed.alerts.len(), live.alerts.len());
}

#[tokio::test]
async fn test_csv_export_has_row_per_metric() {
    let dash = dashboard_with_data().await;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("snapshot.csv");

    dash.export_csv(&path, 24).await.unwrap();
    let raw = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = raw.lines().collect();

    assert_eq!(lines[0], CSV_HEADER);
    assert_eq!(lines.len(), 3);
    assert!(lines[1].starts_with("errors,3,1.0000,"));
    for line in &lines[1..] {
        assert_eq!(line.split(',').count(), 8, "bad row: {line}");
    }
}

#[tokio::test]
async fn test_summary_and_detail_text() {
    let dash = dashboard_with_data().await;

    let summary = dash.summary(24).await.unwrap();
    assert!(summary.contains("errors"));
    assert!(summary.contains("request.duration"));
    assert!(summary.contains("Active alerts: 1"));

    let detail = dash.detail("request.duration", 24).await.unwrap();
    assert!(detail.starts_with("request.duration (last 24h)\n"));
    assert!(detail.contains("baseline"));

    let alerts = dash.active_alerts().await.unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].metric_name, "request.duration");
}
