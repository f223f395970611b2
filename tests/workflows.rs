//! Workflow integration tests entry point.
//!
//! This module includes all workflow-related integration tests:
//! - Properties: counters, gauges, percentiles, tag filters
//! - Baselines: record → update → check deviation
//! - Dashboard: record → summary → export → re-parse
//! - Error recovery: failing stores and bad input

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp, clippy::panic)]

mod integration;
