//! Failure paths: unavailable storage and bad input.

use std::sync::Arc;

use metrics_baseline::baseline::BaselineEngine;
use metrics_baseline::dashboard::{diagnostic, Dashboard};
use metrics_baseline::error::{ExportError, MetricsError};
use metrics_baseline::metrics::{MetricQuery, MetricsAggregator, MetricsHandle, Tags, TagPolicy};

use super::common::aggregator;

#[tokio::test]
async fn test_unopenable_store_is_storage_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    // A directory where the database file should be.
    let path = dir.path().join("metrics.db");
    std::fs::create_dir(&path).unwrap();

    let err = MetricsAggregator::open(&path).await.unwrap_err();
    assert!(matches!(err, MetricsError::StorageUnavailable(_)));

    let line = diagnostic(&err);
    assert!(line.starts_with("metrics unavailable: "));
    assert!(!line.contains('\n'));
}

#[tokio::test]
async fn test_invalid_inputs_are_rejected_without_writes() {
    let (agg, _clock) = aggregator().await;
    let none = Tags::new();

    for result in [
        agg.record_gauge("cpu", f64::NAN, &none).await,
        agg.record_gauge("cpu", f64::NEG_INFINITY, &none).await,
        agg.record_gauge("", 1.0, &none).await,
    ] {
        let err = result.unwrap_err();
        assert!(err.is_caller_error());
    }
    assert_eq!(agg.stats(&MetricQuery::all()).await.unwrap().count, 0);
}

#[tokio::test]
async fn test_undeclared_tags_are_dropped_by_handle() {
    let (agg, _clock) = aggregator().await;
    let agg = agg.with_policy(TagPolicy::new().allow_keys("errors", ["type"]));
    let handle = MetricsHandle::new(agg.clone());

    let mut tags = Tags::new();
    tags.insert("user_email".into(), "someone".into());
    handle.incr("errors", &tags).await;

    assert!(agg.metric_names().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_export_to_unwritable_path() {
    let (agg, _clock) = aggregator().await;
    let dash = Dashboard::new(Arc::new(BaselineEngine::with_defaults(agg)));
    let dir = tempfile::tempdir().unwrap();

    let err = dash.export_json(dir.path(), 24).await.unwrap_err();
    assert!(matches!(err, ExportError::Io { .. }));
}
