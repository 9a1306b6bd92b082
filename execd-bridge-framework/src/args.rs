//! CLI argument parsing for inputs.

use std::ffi::OsString;
use std::path::PathBuf;

use clap::{CommandFactory, FromArgMatches, Parser};
use execd_common::LoggingConfig;

/// Common CLI arguments for all inputs.
#[derive(Parser, Debug, Clone)]
#[command(about = "Telegraf execd input: emits line protocol on every line received on stdin")]
pub struct BridgeArgs {
    /// Path to configuration file.
    #[arg(short, long)]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Take a single sample, print it to stderr and exit.
    #[arg(long)]
    pub once: bool,
}

impl BridgeArgs {
    /// Parse the process arguments with a default config path.
    ///
    /// If no `--config` argument is provided, uses the default. Exits with
    /// clap's usage message on invalid arguments.
    pub fn parse_with_default(default_config: &'static str) -> Self {
        Self::try_parse_with_default(default_config, std::env::args_os())
            .unwrap_or_else(|e| e.exit())
    }

    /// Parse `args` (program name first) with a default config path.
    pub fn try_parse_with_default<I, T>(
        default_config: &'static str,
        args: I,
    ) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let matches = Self::command()
            .mut_arg("config", |arg| arg.default_value(default_config).required(false))
            .try_get_matches_from(args)?;

        Self::from_arg_matches(&matches)
    }

    /// The logging configuration with the `--log-level` override applied.
    pub fn logging_override(&self, config: &LoggingConfig) -> LoggingConfig {
        match &self.log_level {
            Some(level) => LoggingConfig {
                level: level.clone(),
                format: config.format,
            },
            None => config.clone(),
        }
    }
}
