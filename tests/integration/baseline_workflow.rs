//! Baseline workflow: record → update → check.

use std::sync::Arc;

use chrono::Duration;
use metrics_baseline::baseline::{BaselineConfig, BaselineEngine, Severity};
use metrics_baseline::metrics::{tags, Tags};

use super::common::{aggregator, record_series, tens};

#[tokio::test]
async fn test_request_duration_scenario() {
    let (agg, clock) = aggregator().await;
    record_series(&agg, &clock, "request.duration", &tens()).await;

    let engine = BaselineEngine::with_defaults(agg);
    let baseline = engine
        .calculate_baseline("request.duration", &Tags::new())
        .await
        .unwrap()
        .expect("ten samples should produce a baseline");
    assert!(baseline.baseline_value >= 90.0);

    engine.update_baselines(None).await.unwrap();
    let alert = engine
        .check_deviation("request.duration", 200.0, &Tags::new())
        .expect("200 is far above p95");
    assert_eq!(alert.severity, Severity::Critical);
}

#[tokio::test]
async fn test_min_data_points_boundary() {
    let (agg, clock) = aggregator().await;
    record_series(&agg, &clock, "nine", &tens()[..9]).await;
    record_series(&agg, &clock, "ten", &tens()).await;

    let engine = BaselineEngine::with_defaults(agg);
    assert!(engine
        .calculate_baseline("nine", &Tags::new())
        .await
        .unwrap()
        .is_none());
    assert!(engine
        .calculate_baseline("ten", &Tags::new())
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn test_update_twice_is_stable() {
    let (agg, clock) = aggregator().await;
    record_series(&agg, &clock, "request.duration", &tens()).await;
    let engine = BaselineEngine::with_defaults(agg);

    engine.update_baselines(None).await.unwrap();
    let first = engine.baselines();
    engine.update_baselines(None).await.unwrap();
    let second = engine.baselines();

    assert_eq!(first.len(), 1);
    assert_eq!(first[0].baseline_value, second[0].baseline_value);
}

#[tokio::test]
async fn test_classification_table() {
    let (agg, clock) = aggregator().await;
    record_series(&agg, &clock, "flat", &[100.0; 10]).await;
    let engine = BaselineEngine::with_defaults(agg);
    engine.update_baselines(None).await.unwrap();

    let severity = |current: f64| {
        engine
            .check_deviation("flat", current, &Tags::new())
            .map(|a| a.severity)
    };
    assert_eq!(severity(119.0), None);
    assert_eq!(severity(120.0), Some(Severity::Warning));
    assert_eq!(severity(150.0), Some(Severity::Critical));
    assert_eq!(severity(100.0), None);
    assert_eq!(
        engine.deviation_percent("flat", 100.0, &Tags::new()),
        Some(0.0)
    );
}

#[tokio::test]
async fn test_custom_thresholds() {
    let (agg, clock) = aggregator().await;
    record_series(&agg, &clock, "flat", &[100.0; 5]).await;
    let engine = BaselineEngine::new(
        agg,
        BaselineConfig {
            min_data_points: 5,
            deviation_threshold_percent: 5.0,
            critical_threshold_percent: 10.0,
            baseline_percentile: 50.0,
            ..BaselineConfig::default()
        },
    );
    engine.update_baselines(None).await.unwrap();

    let alert = engine
        .check_deviation("flat", 107.0, &Tags::new())
        .unwrap();
    assert_eq!(alert.severity, Severity::Warning);
    assert_eq!(alert.baseline_value, 100.0);
}

#[tokio::test]
async fn test_baselines_follow_the_window() {
    let (agg, clock) = aggregator().await;
    record_series(&agg, &clock, "latency", &[10.0; 10]).await;
    let engine = BaselineEngine::with_defaults(agg.clone());
    engine.update_baselines(None).await.unwrap();
    assert_eq!(
        engine
            .get_baseline("latency", &Tags::new())
            .unwrap()
            .baseline_value,
        10.0
    );

    // A week later the old samples have left the window.
    clock.advance(Duration::days(7));
    record_series(&agg, &clock, "latency", &[30.0; 10]).await;
    engine.update_baselines(None).await.unwrap();
    assert_eq!(
        engine
            .get_baseline("latency", &Tags::new())
            .unwrap()
            .baseline_value,
        30.0
    );
}

#[tokio::test]
async fn test_concurrent_checks_during_update() {
    let (agg, clock) = aggregator().await;
    let device = tags([("device", "usb")]);
    for _ in 0..10 {
        agg.record_gauge("input.level", 50.0, &device).await.unwrap();
    }
    clock.advance(Duration::seconds(1));

    let engine = Arc::new(BaselineEngine::with_defaults(agg));
    engine.refresh_baseline("input.level", &device).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..4 {
        let engine = Arc::clone(&engine);
        let device = device.clone();
        handles.push(tokio::spawn(async move {
            for _ in 0..20 {
                assert!(engine.check_deviation("input.level", 50.0, &device).is_none());
            }
        }));
    }
    engine.update_baselines(None).await.unwrap();
    for handle in handles {
        handle.await.unwrap();
    }
    assert!(engine.get_baseline("input.level", &device).is_some());
}
