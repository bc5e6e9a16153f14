//! Tune Ledger - command-line front end for the music library indexer.

use clap::{CommandFactory, Parser};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use tune_ledger::cli;

fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(EnvFilter::from_default_env().add_directive("tune_ledger=info".parse()?))
        .init();

    if !cli::run_command(&args)? {
        cli::Cli::command().print_help()?;
    }
    Ok(())
}
