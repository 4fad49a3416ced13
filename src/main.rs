//! Hivemind CLI entry point.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use hivemind::cli::{self, Cli, Commands};
use hivemind::infrastructure::config::ConfigLoader;
use hivemind::orchestration::{register_builtin_handlers, OrchestrationController};
use hivemind::protocol::TextProtocolHandler;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    if cli.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let config = ConfigLoader::load().context("Failed to load configuration")?;
    let controller = Arc::new(
        OrchestrationController::new(config).context("Failed to initialize controller")?,
    );
    let protocol = TextProtocolHandler::new("controller-0");
    register_builtin_handlers(&protocol, Arc::clone(&controller));

    match cli.command {
        Commands::Exec { command } => {
            cli::handle_exec(&protocol, &command.join(" "), cli.json).await?;
        }
        Commands::Parse { command } => {
            cli::handle_parse(&protocol, &command.join(" "), cli.json)?;
        }
        Commands::Validate { command } => {
            cli::handle_validate(&protocol, &command.join(" "), cli.json)?;
        }
        Commands::Patterns => {
            cli::handle_patterns(&protocol, cli.json)?;
        }
        Commands::Demo => {
            cli::handle_demo(&protocol, &controller, cli.json).await?;
        }
    }

    Ok(())
}
