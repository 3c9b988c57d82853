//! Parley - streaming LLM chat server
//!
#![doc = "Main entry point for the Parley application."]

use anyhow::Result;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use parley::cli::{Cli, Commands};
use parley::commands;
use parley::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    init_tracing(cli.verbose, cli.json_logs);

    // Load configuration
    let config_path = cli.config.as_deref().unwrap_or("config/parley.yaml");
    let config = Config::load(config_path, &cli)?;

    // Validate configuration for the chosen command
    config.validate_for(&cli.command)?;

    match cli.command {
        Commands::Serve { .. } => {
            tracing::info!("Starting server");
            commands::serve(config).await?;
            Ok(())
        }
        Commands::Chat { server } => {
            commands::chat::run_chat(&server).await?;
            Ok(())
        }
        Commands::History { json } => {
            tracing::debug!("Listing stored history");
            commands::history::show_history(&config, json).await?;
            Ok(())
        }
    }
}

/// Initialize tracing subscriber with environment filter
///
/// `RUST_LOG` wins over `--verbose` when both are set.
fn init_tracing(verbose: bool, json: bool) {
    let default_level = if verbose { "parley=debug" } else { "parley=info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let registry = tracing_subscriber::registry().with(env_filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
