//! Help text for CLI commands.

/// Get help text for CLI commands.
#[must_use]
pub const fn help_text() -> &'static str {
    r#"Metrics Baseline Commands:

  summary [--hours N]       Summary table of every metric (default: 24h)

  detail NAME [--hours N]   Full statistics for one metric

  alerts                    Metrics whose latest value deviates from baseline

  baselines                 Show cached baselines

  record KIND NAME VALUE [KEY=VALUE...]
                            Record one sample
                            KIND: counter, gauge, histogram, summary

  export-json PATH [--hours N]
                            Write the summary data as JSON

  export-csv PATH [--hours N]
                            Write the summary data as CSV

  prune                     Delete snapshots older than METRICS_RETENTION_DAYS

  help                      Show this message

Environment:
  METRICS_DATABASE_PATH     SQLite file, or :memory: (default: ./data/metrics.db)
  LOG_LEVEL                 error, warn, info, debug, trace (default: info)

Examples:
  metrics-baseline summary --hours 6
  metrics-baseline record histogram request.duration 42.5 endpoint=export
  metrics-baseline detail request.duration
  metrics-baseline export-csv ./metrics.csv
"#
}
