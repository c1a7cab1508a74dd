//! swarmcore CLI entry point.

use anyhow::{Context, Result};
use clap::Parser;

use swarmcore::cli::{commands, handle_error, Cli, Commands};
use swarmcore::domain::models::Config;
use swarmcore::infrastructure::config::ConfigLoader;
use swarmcore::infrastructure::logging::LoggerImpl;

fn load_config(cli: &Cli) -> Result<Config> {
    let config = match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => ConfigLoader::load().context("Failed to load configuration")?,
    };
    ConfigLoader::validate(&config).context("Invalid configuration")?;
    Ok(config)
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(err) => handle_error(err, cli.json),
    };

    let _logger = match LoggerImpl::init(&config.logging) {
        Ok(logger) => Some(logger),
        Err(err) => {
            eprintln!("Warning: logging disabled: {err:#}");
            None
        }
    };

    let result = match cli.command {
        Commands::Validate(args) => commands::validate::execute(args, cli.json).await,
        Commands::Status(args) => commands::status::execute(args, &config, cli.json).await,
        Commands::Ready(args) => commands::ready::execute(args, cli.json).await,
    };

    if let Err(err) = result {
        handle_error(err, cli.json);
    }
}
