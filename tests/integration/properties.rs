//! Aggregation properties over a real store.

use metrics_baseline::metrics::{tags, MetricQuery, Tags};
use proptest::prelude::*;

use super::common::{aggregator, record_series, tens};

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn counter_sum_equals_call_count(n in 0_usize..40) {
        let sum = runtime().block_on(async {
            let (agg, _clock) = aggregator().await;
            for _ in 0..n {
                agg.record_counter("sessions.started", 1.0, &Tags::new()).await.unwrap();
            }
            agg.sum(&MetricQuery::named("sessions.started")).await.unwrap()
        });
        #[allow(clippy::cast_precision_loss)]
        let expected = n as f64;
        prop_assert_eq!(sum, expected);
    }

    #[test]
    fn gauge_average_is_mean(values in prop::collection::vec(-1.0e6_f64..1.0e6, 1..30)) {
        let avg = runtime().block_on(async {
            let (agg, _clock) = aggregator().await;
            for &v in &values {
                agg.record_gauge("buffer.fill", v, &Tags::new()).await.unwrap();
            }
            agg.average(&MetricQuery::named("buffer.fill")).await.unwrap()
        });
        #[allow(clippy::cast_precision_loss)]
        let mean = values.iter().sum::<f64>() / values.len() as f64;
        prop_assert!((avg - mean).abs() <= 1e-6 * mean.abs().max(1.0));
    }

    #[test]
    fn extreme_percentiles_are_min_and_max(
        values in prop::collection::vec(-1.0e6_f64..1.0e6, 1..30)
    ) {
        let p = runtime().block_on(async {
            let (agg, _clock) = aggregator().await;
            for &v in &values {
                agg.record_histogram("latency", v, &Tags::new()).await.unwrap();
            }
            agg.percentiles(&MetricQuery::named("latency"), &[0.0, 100.0]).await.unwrap()
        });
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        prop_assert_eq!(p.get(0.0), Some(min));
        prop_assert_eq!(p.get(100.0), Some(max));
    }
}

#[tokio::test]
async fn test_median_of_tens() {
    let (agg, clock) = aggregator().await;
    record_series(&agg, &clock, "request.duration", &tens()).await;

    let p = agg
        .percentiles(&MetricQuery::named("request.duration"), &[50.0])
        .await
        .unwrap();
    assert_eq!(p.get(50.0), Some(55.0));
}

#[tokio::test]
async fn test_tag_filter_sums() {
    let (agg, _clock) = aggregator().await;
    agg.record_counter("errors", 1.0, &tags([("type", "network")]))
        .await
        .unwrap();
    agg.record_counter("errors", 1.0, &tags([("type", "disk")]))
        .await
        .unwrap();

    assert_eq!(
        agg.sum(&MetricQuery::named("errors").tag("type", "network"))
            .await
            .unwrap(),
        1.0
    );
    assert_eq!(agg.sum(&MetricQuery::named("errors")).await.unwrap(), 2.0);
    assert_eq!(
        agg.sum(&MetricQuery::named("errors").tag("type", "gpu"))
            .await
            .unwrap(),
        0.0
    );
}

#[tokio::test]
async fn test_limit_applies_to_rows_not_reducers() {
    let (agg, clock) = aggregator().await;
    record_series(&agg, &clock, "request.duration", &tens()).await;

    let q = MetricQuery::named("request.duration").limit(3);
    let rows = agg.query(&q).await.unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].value, 10.0);
    assert_eq!(agg.stats(&q).await.unwrap().count, 10);
}
