//! Shared fixtures for integration tests.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use metrics_baseline::metrics::{MetricsAggregator, Tags};
use metrics_baseline::traits::ManualTimeProvider;

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap()
}

/// In-memory aggregator driven by a manual clock.
pub async fn aggregator() -> (MetricsAggregator, ManualTimeProvider) {
    let clock = ManualTimeProvider::new(start_time());
    let agg = MetricsAggregator::in_memory()
        .await
        .expect("in-memory store should open")
        .with_clock(Arc::new(clock.clone()));
    (agg, clock)
}

/// Record `values` as one-second-apart histogram samples, then step past
/// the last one so it falls inside `[start, now)` windows.
pub async fn record_series(
    agg: &MetricsAggregator,
    clock: &ManualTimeProvider,
    name: &str,
    values: &[f64],
) {
    for &v in values {
        agg.record_histogram(name, v, &Tags::new())
            .await
            .expect("record should succeed");
        clock.advance(Duration::seconds(1));
    }
}

pub fn tens() -> Vec<f64> {
    (1..=10).map(|i| f64::from(i) * 10.0).collect()
}
