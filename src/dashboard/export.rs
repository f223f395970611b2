//! JSON and CSV export.
//!
//! Both formats are rendered from a single [`DashboardSnapshot`] and
//! overwrite the target file.

use std::fmt::Write;
use std::path::Path;

use super::report::{Dashboard, DashboardSnapshot};
use crate::error::ExportError;

/// CSV header row.
pub const CSV_HEADER: &str = "metric_name,count,average,p50,p95,p99,baseline,deviation_percent";

fn number(value: f64) -> String {
    format!("{value:.4}")
}

fn optional_number(value: Option<f64>) -> String {
    value.map(number).unwrap_or_default()
}

fn csv_field(field: &str) -> String {
    if field.contains(&[',', '"', '\n', '\r'][..]) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Render a snapshot as CSV, one row per metric, `None` as an empty field.
#[must_use]
pub fn render_csv(snapshot: &DashboardSnapshot) -> String {
    let mut out = String::from(CSV_HEADER);
    out.push('\n');
    for (name, report) in &snapshot.metrics {
        let _ = writeln!(
            out,
            "{},{},{},{},{},{},{},{}",
            csv_field(name),
            report.count,
            number(report.average),
            number(report.p50),
            number(report.p95),
            number(report.p99),
            optional_number(report.baseline),
            optional_number(report.deviation_percent),
        );
    }
    out
}

/// Render a snapshot as pretty-printed JSON.
///
/// # Errors
///
/// Returns [`ExportError::Serialize`] if serialization fails.
pub fn render_json(snapshot: &DashboardSnapshot) -> Result<String, ExportError> {
    serde_json::to_string_pretty(snapshot).map_err(|e| ExportError::Serialize {
        message: e.to_string(),
    })
}

async fn write_file(path: &Path, contents: String) -> Result<(), ExportError> {
    tokio::fs::write(path, contents)
        .await
        .map_err(|e| ExportError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })
}

impl Dashboard {
    /// Write the snapshot for the last `hours` as JSON to `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError`] if gathering, serializing or writing fails.
    pub async fn export_json(&self, path: impl AsRef<Path>, hours: u32) -> Result<(), ExportError> {
        let path = path.as_ref();
        let snapshot = self.snapshot(hours).await?;
        write_file(path, render_json(&snapshot)?).await?;
        tracing::info!(path = %path.display(), metrics = snapshot.metrics.len(), "Exported JSON");
        Ok(())
    }

    /// Write the snapshot for the last `hours` as CSV to `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError`] if gathering or writing fails.
    pub async fn export_csv(&self, path: impl AsRef<Path>, hours: u32) -> Result<(), ExportError> {
        let path = path.as_ref();
        let snapshot = self.snapshot(hours).await?;
        write_file(path, render_csv(&snapshot)).await?;
        tracing::info!(path = %path.display(), metrics = snapshot.metrics.len(), "Exported CSV");
        Ok(())
    }
}
