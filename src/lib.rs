//! Metrics Baseline
//!
//! Local time-series metrics with rolling baselines and deviation alerts,
//! for single-process applications that want to notice when they get
//! slower or noisier than usual.
//!
//! # Features
//!
//! - Counter, gauge, histogram and summary recording with tag filters
//! - `SQLite` persistence (file-backed or in-memory)
//! - Linear-interpolation percentiles over arbitrary time windows
//! - Percentile baselines with Warning/Critical deviation alerts
//! - Text summary, per-metric detail, JSON and CSV export
//!
//! # Quick Start
//!
//! ```bash
//! metrics-baseline record histogram request.duration 42.5
//! metrics-baseline summary --hours 6
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────┐ record_*  ┌──────────────────┐
//! │ Instrumented   │──────────▶│ MetricsAggregator │──────▶ SQLite
//! │ code           │           └─────────┬────────┘
//! └────────────────┘                     │ query / percentiles
//!                             ┌──────────┴─────────┐
//!                             ▼                    ▼
//!                     ┌────────────────┐   ┌─────────────┐
//!                     │ BaselineEngine │──▶│  Dashboard  │──▶ text / JSON / CSV
//!                     └────────────────┘   └─────────────┘
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod baseline;
pub mod cli;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod metrics;
pub mod storage;
pub mod traits;

#[cfg(test)]
mod test_utils;
