//! Dashboard and reporting.
//!
//! Pull-based views over the aggregator and baseline engine:
//! - [`Dashboard::summary`] / [`Dashboard::detail`]: fixed-width text
//! - [`Dashboard::active_alerts`]: current deviations
//! - [`Dashboard::export_json`] / [`Dashboard::export_csv`]: file exports
//!
//! Failures at this boundary should be shown with [`diagnostic`], a
//! single line rather than an error chain.

mod export;
mod render;
mod report;

pub use export::{render_csv, render_json, CSV_HEADER};
pub use render::{
    render_alerts, render_baselines, render_detail, render_summary, EMPTY_MESSAGE,
};
pub use report::{
    diagnostic, Dashboard, DashboardSnapshot, MetricDetail, MetricReport, DEFAULT_WINDOW_HOURS,
    MAX_WINDOW_HOURS,
};
