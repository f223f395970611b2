//! Metrics aggregation.
//!
//! This module provides:
//! - Counter, gauge, histogram and summary recording
//! - Range and tag queries over the persisted time series
//! - Sum, average and percentile reducers
//! - Name/tag validation against a bounded vocabulary
//! - A best-effort producer handle for instrumented code
//!
//! # Example
//!
//! ```
//! use metrics_baseline::metrics::{tags, MetricQuery, MetricsAggregator};
//!
//! # let rt = tokio::runtime::Runtime::new().unwrap();
//! # rt.block_on(async {
//! let metrics = MetricsAggregator::in_memory().await?;
//! metrics.record_counter("errors", 1.0, &tags([("type", "network")])).await?;
//! metrics.record_counter("errors", 1.0, &tags([("type", "disk")])).await?;
//!
//! let network = MetricQuery::named("errors").tag("type", "network");
//! assert_eq!(metrics.sum(&network).await?, 1.0);
//! assert_eq!(metrics.sum(&MetricQuery::named("errors")).await?, 2.0);
//! # Ok::<(), metrics_baseline::error::MetricsError>(())
//! # }).unwrap();
//! ```

mod aggregator;
mod query;
mod recorder;
mod stats;
mod types;
mod validation;

pub use aggregator::MetricsAggregator;
pub use query::{window_start, MetricQuery, DEFAULT_QUERY_LIMIT};
pub use recorder::MetricsHandle;
pub use stats::{compute_percentiles, percentile_sorted, scaled_mean, MetricStats, Percentiles};
pub use types::{tags, Metadata, MetricKind, MetricSnapshot, Tags};
pub use validation::{
    validate_name, validate_percentile, validate_value, TagPolicy, MAX_NAME_LEN, MAX_TAGS,
    MAX_TAG_LEN,
};
