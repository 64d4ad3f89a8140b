//! CLI command definitions and argument parsing.

use crate::output::OutputFormat;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Reaper - TTL janitor for scan-report records.
#[derive(Debug, Parser)]
#[command(name = "reaper")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output format
    #[arg(short, long, value_enum, global = true, default_value = "table")]
    pub format: CliFormat,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum CliFormat {
    /// Table format (default)
    Table,
    /// JSON format
    Json,
    /// Quiet format (keys only)
    Quiet,
}

/// CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the janitor over a record snapshot until Ctrl+C
    Run(RunArgs),

    /// Show what one reconcile pass would decide for every record
    Check(CheckArgs),

    /// Print the fingerprint of a JSON document
    Fingerprint(FingerprintArgs),
}

/// Arguments for the run command.
#[derive(Debug, Parser)]
pub struct RunArgs {
    /// Janitor configuration (TOML)
    #[arg(short, long, env = "REAPER_CONFIG")]
    pub config: PathBuf,

    /// Record snapshot (JSON)
    #[arg(short, long)]
    pub records: PathBuf,

    /// Policy snapshot (JSON); no policies apply when omitted
    #[arg(short, long)]
    pub policies: Option<PathBuf>,
}

/// Arguments for the check command.
#[derive(Debug, Parser)]
pub struct CheckArgs {
    /// Record snapshot (JSON)
    #[arg(short, long)]
    pub records: PathBuf,

    /// Policy snapshot (JSON); no policies apply when omitted
    #[arg(short, long)]
    pub policies: Option<PathBuf>,

    /// Janitor configuration (TOML); defaults apply when omitted
    #[arg(short, long, env = "REAPER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Evaluate TTLs as of this instant (RFC 3339) instead of now
    #[arg(long)]
    pub now: Option<String>,
}

/// Arguments for the fingerprint command.
#[derive(Debug, Parser)]
pub struct FingerprintArgs {
    /// JSON file to fingerprint
    pub file: PathBuf,
}

impl From<CliFormat> for OutputFormat {
    fn from(format: CliFormat) -> Self {
        match format {
            CliFormat::Table => OutputFormat::Table,
            CliFormat::Json => OutputFormat::Json,
            CliFormat::Quiet => OutputFormat::Quiet,
        }
    }
}
