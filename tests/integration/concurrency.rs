//! Writers recording while the dashboard, exports and baseline refresh read.

use std::sync::Arc;

use metrics_baseline::baseline::BaselineEngine;
use metrics_baseline::dashboard::Dashboard;
use metrics_baseline::metrics::{tags, MetricQuery, MetricsAggregator, Tags};
use metrics_baseline::traits::ManualTimeProvider;
use tempfile::TempDir;

use super::common::{aggregator, record_series, start_time, tens};

const WRITERS: u32 = 6;
const WRITES_PER_WRITER: u32 = 40;
const READ_ROUNDS: usize = 10;

async fn record_while_reading(agg: MetricsAggregator, dir: &TempDir) {
    let engine = Arc::new(BaselineEngine::with_defaults(agg.clone()));
    let dash = Arc::new(Dashboard::new(Arc::clone(&engine)));

    let mut writers = Vec::new();
    for worker in 0..WRITERS {
        let agg = agg.clone();
        writers.push(tokio::spawn(async move {
            let id = worker.to_string();
            let worker_tag = tags([("worker", id.as_str())]);
            for i in 0..WRITES_PER_WRITER {
                agg.record_counter("frames.processed", 1.0, &worker_tag)
                    .await
                    .expect("counter write");
                agg.record_histogram("request.duration", 50.0 + f64::from(i), &Tags::new())
                    .await
                    .expect("histogram write");
            }
        }));
    }

    let json_path = dir.path().join("live.json");
    let csv_path = dir.path().join("live.csv");
    let reader = {
        let dash = Arc::clone(&dash);
        let engine = Arc::clone(&engine);
        tokio::spawn(async move {
            for _ in 0..READ_ROUNDS {
                dash.snapshot(24).await.expect("snapshot");
                dash.export_json(&json_path, 24).await.expect("json export");
                dash.export_csv(&csv_path, 24).await.expect("csv export");
                engine.update_baselines(None).await.expect("baseline refresh");
                dash.active_alerts().await.expect("alerts");
                tokio::task::yield_now().await;
            }
        })
    };

    for writer in writers {
        writer.await.expect("writer task");
    }
    reader.await.expect("reader task");

    let expected = u64::from(WRITERS * WRITES_PER_WRITER);
    let frames = agg
        .stats(&MetricQuery::named("frames.processed"))
        .await
        .unwrap();
    assert_eq!(frames.count, expected);
    assert_eq!(frames.sum, f64::from(WRITERS * WRITES_PER_WRITER));

    let durations = agg
        .stats(&MetricQuery::named("request.duration"))
        .await
        .unwrap();
    assert_eq!(durations.count, expected + 10);

    let snapshot = dash.snapshot(24).await.unwrap();
    assert_eq!(snapshot.metrics["frames.processed"].count, expected);
    assert!(engine.get_baseline("request.duration", &Tags::new()).is_some());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_reads_during_writes_in_memory() {
    let (agg, clock) = aggregator().await;
    record_series(&agg, &clock, "request.duration", &tens()).await;

    let dir = tempfile::tempdir().unwrap();
    record_while_reading(agg, &dir).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_reads_during_writes_file_backed() {
    let clock = ManualTimeProvider::new(start_time());
    let dir = tempfile::tempdir().unwrap();
    let agg = MetricsAggregator::open(dir.path().join("metrics.db"))
        .await
        .expect("file store should open")
        .with_clock(Arc::new(clock.clone()));
    record_series(&agg, &clock, "request.duration", &tens()).await;

    record_while_reading(agg, &dir).await;
}
