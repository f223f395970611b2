//! Metrics baseline command-line entry point.
//!
//! All logs go to stderr; stdout carries only command output.
//!
//! Coverage is excluded because the main function exits the process; the
//! command logic it drives is tested in the library.

// Enable the coverage attribute when running with nightly for llvm-cov exclusions
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

use std::sync::Arc;

use metrics_baseline::baseline::BaselineEngine;
use metrics_baseline::cli::{execute, help_text, MetricsCommand};
use metrics_baseline::config::Config;
use metrics_baseline::dashboard::{diagnostic, Dashboard};
use metrics_baseline::error::AppError;
use metrics_baseline::metrics::MetricsAggregator;

#[cfg_attr(coverage_nightly, coverage(off))]
#[tokio::main]
async fn main() {
    // Initialize logging to stderr only (stdout is for command output)
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("LOG_LEVEL")
                .unwrap_or_else(|_| "info".to_string())
                .parse()
                .unwrap_or_else(|_| tracing_subscriber::filter::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = match MetricsCommand::parse(&args) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("{e}\n");
            eprint!("{}", help_text());
            std::process::exit(2);
        }
    };

    if command == MetricsCommand::Help {
        print!("{}", help_text());
        return;
    }

    match run(&command).await {
        Ok(output) => print!("{output}"),
        Err(e) => {
            tracing::error!("Command failed: {e}");
            eprintln!("{}", diagnostic(&e));
            std::process::exit(1);
        }
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
async fn run(command: &MetricsCommand) -> Result<String, AppError> {
    let config = Config::from_env()?;
    tracing::debug!(database = %config.database_path, "Configuration loaded");

    let aggregator = if config.is_in_memory() {
        MetricsAggregator::in_memory().await?
    } else {
        MetricsAggregator::open(&config.database_path).await?
    };

    let engine = Arc::new(BaselineEngine::try_new(aggregator, config.baseline_config())?);
    engine.update_baselines(None).await?;

    let dashboard = Dashboard::new(engine);
    execute(command, &dashboard, &config).await
}
