//! Baseline calculation and deviation detection.
//!
//! A baseline is a configured percentile (p95 by default) of a metric's
//! recent history. Baselines are computed on demand through
//! [`BaselineEngine::update_baselines`], cached, and compared against live
//! values with [`BaselineEngine::check_deviation`].

mod engine;
mod types;

pub use engine::{BaselineConfig, BaselineEngine};
pub use types::{deviation_between, Baseline, BaselineKey, DeviationAlert, Severity};
