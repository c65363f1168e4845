//! Chunkstore CLI - Command-line interface
//!
//! Imports files into chunk stores, reads chunks back and inspects layouts.

mod commands;

use std::path::PathBuf;

use chunkstore_core::tracing_setup::{CliLogLevel, init_tracing};
use clap::Parser;

#[derive(Parser)]
#[command(name = "chunkstore")]
#[command(about = "Fixed-size chunk storage on files")]
struct Cli {
    /// Console log level
    #[arg(long, value_enum, default_value_t = CliLogLevel::Warn, global = true)]
    log_level: CliLogLevel,

    /// Directory for the full trace log of the last run
    #[arg(long, global = true)]
    logs_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: commands::Commands,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.log_level.as_tracing_level(), cli.logs_dir.as_deref())
        .map_err(|error| anyhow::anyhow!("failed to initialize tracing: {error}"))?;

    commands::handle_command(cli.command).await
}
