//! Command execution.

use chrono::Duration;

use super::commands::MetricsCommand;
use super::help::help_text;
use crate::config::Config;
use crate::dashboard::{render_alerts, render_baselines, Dashboard};
use crate::error::AppError;
use crate::metrics::{window_start, MetricSnapshot};

/// Run one command and return what it prints on stdout.
///
/// # Errors
///
/// Returns [`AppError`] if the store, an export or a recording fails.
pub async fn execute(
    command: &MetricsCommand,
    dashboard: &Dashboard,
    config: &Config,
) -> Result<String, AppError> {
    let engine = dashboard.engine();
    let aggregator = engine.aggregator();

    let output = match command {
        MetricsCommand::Summary { hours } => dashboard.summary(*hours).await?,

        MetricsCommand::Detail { name, hours } => dashboard.detail(name, *hours).await?,

        MetricsCommand::Alerts => render_alerts(&dashboard.active_alerts().await?),

        MetricsCommand::Baselines => render_baselines(&engine.baselines()),

        MetricsCommand::Record {
            kind,
            name,
            value,
            tags,
        } => {
            let snapshot =
                MetricSnapshot::new(*kind, name.clone(), *value, aggregator.now())
                    .with_tags(tags.clone());
            aggregator.record(snapshot).await?;

            let mut out = format!("recorded {kind} {name}={value}\n");
            if let Some(alert) = engine.check_deviation(name, *value, tags) {
                out.push_str(&render_alerts(&[alert]));
            }
            out
        }

        MetricsCommand::ExportJson { path, hours } => {
            dashboard.export_json(path, *hours).await?;
            format!("wrote {path}\n")
        }

        MetricsCommand::ExportCsv { path, hours } => {
            dashboard.export_csv(path, *hours).await?;
            format!("wrote {path}\n")
        }

        MetricsCommand::Prune => {
            let retention = Duration::days(i64::from(config.retention_days));
            let cutoff = window_start(aggregator.now(), retention);
            let removed = aggregator.prune_older_than(cutoff).await?;
            format!(
                "pruned {removed} snapshots older than {}\n",
                cutoff.format("%Y-%m-%d %H:%M:%S UTC")
            )
        }

        MetricsCommand::Help => help_text().to_string(),
    };

    Ok(output)
}
