//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// rs-pipeline - camera pipeline negotiation and streaming
#[derive(Parser, Debug)]
#[command(
    name = "rs-pipeline",
    author,
    version,
    about = "Camera pipeline configuration negotiation and sample dispatch",
    long_about = "Negotiates a configuration between a (simulated, recorded or replayed) \n\
                  capture device and a set of CV modules, streams correlated sample sets \n\
                  to them and reports dispatch statistics."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "RS_PIPELINE_VERBOSE")]
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
        env = "RS_PIPELINE_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Negotiate, stream and report
    Run(RunArgs),

    /// Validate settings file without running
    Validate(ValidateArgs),

    /// Display settings and the default configuration
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to settings file (TOML or JSON)
    #[arg(
        short,
        long,
        default_value = "pipeline.toml",
        env = "RS_PIPELINE_CONFIG"
    )]
    pub config: PathBuf,

    /// Stop after this many sample sets (0 = use settings)
    #[arg(long, default_value = "0", env = "RS_PIPELINE_MAX_SAMPLE_SETS")]
    pub max_sample_sets: u64,

    /// Stop after this many seconds (0 = use settings)
    #[arg(long, default_value = "0", env = "RS_PIPELINE_TIMEOUT")]
    pub timeout: u64,

    /// Record the session to this file instead of the configured context
    #[arg(long, conflicts_with = "playback")]
    pub record: Option<PathBuf>,

    /// Replay this recording instead of the configured context
    #[arg(long)]
    pub playback: Option<PathBuf>,

    /// Validate settings and exit without running
    #[arg(long)]
    pub dry_run: bool,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "RS_PIPELINE_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to settings file to validate
    #[arg(short, long, default_value = "pipeline.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to settings file
    #[arg(short, long, default_value = "pipeline.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Show device stream profiles
    #[arg(long)]
    pub devices: bool,

    /// Show declared module configs
    #[arg(long)]
    pub modules: bool,
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
