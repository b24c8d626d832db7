//! Percolator CLI entry point.

use clap::Parser;

use percolator::cli::{Cli, Commands};
use percolator::infrastructure::config::ConfigLoader;
use percolator::infrastructure::logging::LoggerImpl;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match ConfigLoader::load() {
        Ok(config) => config,
        Err(err) => percolator::cli::handle_error(err, cli.json),
    };
    let _logger = match LoggerImpl::init(&config.logging) {
        Ok(logger) => logger,
        Err(err) => percolator::cli::handle_error(err, cli.json),
    };

    let result = match cli.command {
        Commands::Init(args) => percolator::cli::commands::init::execute(args, &config, cli.json).await,
        Commands::Blueprint(args) => percolator::cli::commands::blueprint::execute(args, &config, cli.json).await,
        Commands::Percolate(args) => percolator::cli::commands::percolate::execute(args, &config, cli.json).await,
    };

    if let Err(err) = result {
        percolator::cli::handle_error(err, cli.json);
    }
}
