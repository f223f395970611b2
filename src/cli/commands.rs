//! CLI command definitions and parsing.

use super::errors::CommandParseError;
use crate::dashboard::{DEFAULT_WINDOW_HOURS, MAX_WINDOW_HOURS};
use crate::metrics::{MetricKind, Tags};

/// Metrics CLI commands.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricsCommand {
    /// Summary table of every metric.
    Summary {
        /// Look-back window.
        hours: u32,
    },

    /// Full statistics for one metric.
    Detail {
        /// Metric name.
        name: String,
        /// Look-back window.
        hours: u32,
    },

    /// Show active deviation alerts.
    Alerts,

    /// Show cached baselines.
    Baselines,

    /// Record one sample.
    Record {
        /// Sample kind.
        kind: MetricKind,
        /// Metric name.
        name: String,
        /// Sample value.
        value: f64,
        /// Tags from `key=value` arguments.
        tags: Tags,
    },

    /// Export the summary data as JSON.
    ExportJson {
        /// Output file.
        path: String,
        /// Look-back window.
        hours: u32,
    },

    /// Export the summary data as CSV.
    ExportCsv {
        /// Output file.
        path: String,
        /// Look-back window.
        hours: u32,
    },

    /// Delete snapshots past retention.
    Prune,

    /// Show help.
    Help,
}

impl MetricsCommand {
    /// Parse a command from string arguments (program name excluded).
    ///
    /// # Errors
    ///
    /// Returns [`CommandParseError`] for an unknown command, unknown flag,
    /// or a missing or malformed argument.
    pub fn parse(args: &[String]) -> Result<Self, CommandParseError> {
        let Some(first) = args.first() else {
            return Err(CommandParseError::MissingCommand);
        };

        let cmd = first.to_lowercase();
        let rest = &args[1..];
        match cmd.as_str() {
            "summary" => {
                let (positional, hours) = split_hours(rest)?;
                no_extra(&positional, 0)?;
                Ok(Self::Summary { hours })
            }

            "detail" => {
                let (positional, hours) = split_hours(rest)?;
                no_extra(&positional, 1)?;
                let name = required(&positional, 0, "name")?;
                Ok(Self::Detail { name, hours })
            }

            "alerts" => {
                no_extra(rest, 0)?;
                Ok(Self::Alerts)
            }

            "baselines" => {
                no_extra(rest, 0)?;
                Ok(Self::Baselines)
            }

            "record" => parse_record(rest),

            "export-json" | "export-csv" => {
                let (positional, hours) = split_hours(rest)?;
                no_extra(&positional, 1)?;
                let path = required(&positional, 0, "path")?;
                if cmd == "export-json" {
                    Ok(Self::ExportJson { path, hours })
                } else {
                    Ok(Self::ExportCsv { path, hours })
                }
            }

            "prune" => {
                no_extra(rest, 0)?;
                Ok(Self::Prune)
            }

            "help" | "--help" | "-h" => Ok(Self::Help),

            _ => Err(CommandParseError::UnknownCommand(cmd)),
        }
    }
}

/// Pull `--hours N` out of `args`, returning the remaining positionals.
fn split_hours(args: &[String]) -> Result<(Vec<String>, u32), CommandParseError> {
    let mut hours = DEFAULT_WINDOW_HOURS;
    let mut positional = Vec::new();

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--hours" | "-H" => {
                i += 1;
                let Some(raw) = args.get(i) else {
                    return Err(CommandParseError::MissingValue("--hours".into()));
                };
                hours = raw
                    .parse()
                    .ok()
                    .filter(|h| (1..=MAX_WINDOW_HOURS).contains(h))
                    .ok_or_else(|| CommandParseError::InvalidValue {
                        flag: "--hours".into(),
                        value: raw.clone(),
                    })?;
            }
            flag if flag.starts_with("--") => {
                return Err(CommandParseError::UnknownFlag(flag.to_string()));
            }
            _ => positional.push(args[i].clone()),
        }
        i += 1;
    }

    Ok((positional, hours))
}

fn required(args: &[String], index: usize, label: &str) -> Result<String, CommandParseError> {
    args.get(index)
        .cloned()
        .ok_or_else(|| CommandParseError::MissingValue(label.into()))
}

fn no_extra(args: &[String], expected: usize) -> Result<(), CommandParseError> {
    match args.get(expected) {
        Some(extra) if extra.starts_with("--") => {
            Err(CommandParseError::UnknownFlag(extra.clone()))
        }
        Some(extra) => Err(CommandParseError::InvalidValue {
            flag: "argument".into(),
            value: extra.clone(),
        }),
        None => Ok(()),
    }
}

fn parse_record(args: &[String]) -> Result<MetricsCommand, CommandParseError> {
    let raw_kind = required(args, 0, "kind")?;
    let kind = raw_kind
        .parse::<MetricKind>()
        .map_err(|_| CommandParseError::InvalidValue {
            flag: "kind".into(),
            value: raw_kind.clone(),
        })?;
    let name = required(args, 1, "name")?;
    let raw_value = required(args, 2, "value")?;
    let value = raw_value
        .parse::<f64>()
        .map_err(|_| CommandParseError::InvalidValue {
            flag: "value".into(),
            value: raw_value.clone(),
        })?;

    let mut tags = Tags::new();
    for pair in args.iter().skip(3) {
        let Some((key, val)) = pair.split_once('=') else {
            return Err(CommandParseError::InvalidValue {
                flag: "tag".into(),
                value: pair.clone(),
            });
        };
        tags.insert(key.to_string(), val.to_string());
    }

    Ok(MetricsCommand::Record {
        kind,
        name,
        value,
        tags,
    })
}
