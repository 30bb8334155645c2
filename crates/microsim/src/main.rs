//! Microsim CLI - replay a plate directory as a live microscope stream.
//!
//! Images are sent one at a time, in acquisition order, to a Kafka topic or
//! an HTTP endpoint, pausing a fixed period between images.
//!
//! # Usage
//!
//! ```bash
//! # Dry run: catalog and prepare every image, send nothing
//! microsim stream ./plate --period 2
//!
//! # Stream channel 1 only, binned 2×2, to Kafka
//! microsim stream ./plate --sink queue --topic scope1 --channels 1 --binning 2
//!
//! # Show the order images would be sent in
//! microsim list ./plate --format jsonl
//!
//! # View configuration
//! microsim config show
//! ```

use clap::{Parser, Subcommand};
use microsim_core::Config;
use std::path::PathBuf;

mod cli;
mod logging;

/// Microsim - replay microscope image directories at a set pace.
#[derive(Parser, Debug)]
#[command(name = "microsim")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    /// Config file to use instead of the default location
    #[arg(short, long, global = true, env = "MICROSIM_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Stream a directory of images to the configured sink
    Stream(cli::stream::StreamArgs),

    /// Print the ordered file catalog of a directory
    List(cli::list::ListArgs),

    /// View and manage configuration
    Config(cli::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logging isn't initialized yet, so config problems go to stderr directly.
    let config = match &cli.config {
        Some(path) => Config::load_from(path)
            .map_err(|e| anyhow::anyhow!("cannot load config {}: {e}", path.display()))?,
        None => match Config::load() {
            Ok(config) => config,
            Err(e) => {
                eprintln!(
                    "Warning: Failed to load config: {e}\n  \
                     Using default configuration. Check your config file with `microsim config path`."
                );
                Config::default()
            }
        },
    };
    logging::init_from_config(&config, cli.verbose, cli.json_logs);

    tracing::debug!("Microsim v{}", microsim_core::VERSION);

    match cli.command {
        Commands::Stream(args) => cli::stream::execute(args, config).await,
        Commands::List(args) => cli::list::execute(args, &config),
        Commands::Config(args) => cli::config::execute(args, config, cli.config),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["microsim", "list", "./plate", "-v", "--json-logs"]).unwrap();
        assert!(cli.verbose);
        assert!(cli.json_logs);
        assert!(matches!(cli.command, Commands::List(_)));
    }
}
