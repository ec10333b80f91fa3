//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// FX Fanout - Conflating price fan-out pipeline
#[derive(Parser, Debug)]
#[command(
    name = "fx-fanout",
    author,
    version,
    about = "Conflating FX price fan-out pipeline",
    long_about = "A lossy-conflation price distribution engine.\n\n\
                  Runs a price feed against any number of independently-paced \n\
                  subscribers: every subscriber eventually sees the latest rate \n\
                  per currency pair, and a slow subscriber never blocks the \n\
                  producer or its peers."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "FX_FANOUT_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "FX_FANOUT_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the fan-out pipeline
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(short, long, default_value = "config.toml", env = "FX_FANOUT_CONFIG")]
    pub config: PathBuf,

    /// Maximum number of updates to publish (0 = unlimited)
    #[arg(long, default_value = "0", env = "FX_FANOUT_MAX_UPDATES")]
    pub max_updates: u64,

    /// Pipeline timeout in seconds (0 = no timeout)
    #[arg(long, default_value = "0", env = "FX_FANOUT_TIMEOUT")]
    pub timeout: u64,

    /// Validate configuration and exit without running pipeline
    #[arg(long)]
    pub dry_run: bool,

    /// Time budget in milliseconds for slow subscribers to finish draining
    /// after the feed stops
    #[arg(long, default_value = "5000", env = "FX_FANOUT_SETTLE_MS")]
    pub settle_ms: u64,

    /// Channel buffer size between the feed and the publisher
    #[arg(long, default_value = "1024", env = "FX_FANOUT_BUFFER_SIZE")]
    pub buffer_size: usize,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "9000", env = "FX_FANOUT_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Show detailed subscriber information
    #[arg(long)]
    pub subscribers: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}
