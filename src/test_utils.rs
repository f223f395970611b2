//! Test utilities and fixtures.
//!
//! This module provides shared testing infrastructure:
//! - A manual clock pinned to a fixed instant
//! - An in-memory aggregator driven by that clock
//!
//! Only compiled for tests (`#[cfg(test)]`).

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};

use crate::metrics::MetricsAggregator;
use crate::traits::ManualTimeProvider;

/// The instant every test clock starts at.
#[must_use]
pub fn fixed_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
}

/// A manual clock set to [`fixed_time`].
#[must_use]
pub fn fixed_clock() -> ManualTimeProvider {
    ManualTimeProvider::new(fixed_time())
}

/// A fresh in-memory aggregator plus a handle to its clock.
///
/// Advancing the returned clock moves the aggregator's notion of "now".
pub async fn test_aggregator() -> (MetricsAggregator, ManualTimeProvider) {
    let clock = fixed_clock();
    let aggregator = MetricsAggregator::in_memory()
        .await
        .expect("in-memory store should open")
        .with_clock(Arc::new(clock.clone()));
    (aggregator, clock)
}
