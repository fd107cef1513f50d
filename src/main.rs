//! xfer-harness - black-box test driver for a file-transfer CLI
//!
//! Builds command lines for the transfer tool, runs them as child
//! processes and checks the results with a separate validator.

use std::path::PathBuf;

use clap::Parser;
use commands::Commands;
use harness::common::{config::Config, logging};
use harness::{cli, commands};

#[derive(Parser)]
#[command(name = "harness", about = "Test driver for a file-transfer CLI")]
#[command(version, long_about = None)]
struct Cli {
    /// Configuration file (default: platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log every command line and timing
    #[arg(long, global = true)]
    debug: bool,

    /// Also append logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    let debug = cli.debug || config.debug;
    match &cli.log_file {
        Some(path) => logging::init_with_file(debug, path),
        None => logging::init_cli(debug),
    }

    if let Err(e) = cli::dispatch(cli.command, &config).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
