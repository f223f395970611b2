//! Command-line interface.
//!
//! Hand-parsed subcommands over the dashboard, plus `record` and `prune`
//! for maintenance from a shell.

mod commands;
mod errors;
mod help;
mod run;


pub use commands::MetricsCommand;
pub use errors::CommandParseError;
pub use help::help_text;
pub use run::execute;
