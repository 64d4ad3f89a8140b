//! Reaper CLI - TTL janitor for scan-report records.

use clap::Parser;
use reaper_cli::commands;
use reaper_cli::{Cli, Command, Formatter};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Log to stderr so command output stays clean
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> reaper_cli::Result<()> {
    let cli = Cli::parse();
    let formatter = Formatter::new(cli.format.into(), !cli.no_color);

    match cli.command {
        Command::Run(args) => commands::execute_run(args, &formatter).await?,
        Command::Check(args) => commands::execute_check(args, &formatter)?,
        Command::Fingerprint(args) => commands::execute_fingerprint(args, &formatter)?,
    }

    Ok(())
}
