//! agent-taskgraph CLI entry point.

use clap::Parser;

use agent_taskgraph::cli::commands::{self, load_config};
use agent_taskgraph::cli::{handle_error, Cli, Commands};
use agent_taskgraph::infrastructure::logging::{LogConfig, LoggerImpl};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => handle_error(&err, cli.json),
    };

    let _logger = match LoggerImpl::init(&LogConfig::from(&config.logging)) {
        Ok(logger) => logger,
        Err(err) => handle_error(&err, cli.json),
    };

    let result = match cli.command {
        Commands::Run(args) => commands::run::execute(args, &config, cli.json).await,
        Commands::Validate(args) => commands::validate::execute(&args, cli.json),
    };

    if let Err(err) = result {
        handle_error(&err, cli.json);
    }
}
