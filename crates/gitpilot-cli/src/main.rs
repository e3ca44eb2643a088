mod bootstrap_helpers;
mod cli_args;
mod startup;

use anyhow::Result;
use clap::Parser;
use gitpilot_gateway::run_gateway_server;

use crate::bootstrap_helpers::init_tracing;
use crate::cli_args::Cli;
use crate::startup::build_gateway_config;

#[tokio::main]
async fn main() -> Result<()> {
    // Loaded before parsing so `.env` values feed the clap env fallbacks.
    let dotenv_path = dotenvy::dotenv().ok();
    init_tracing();
    if let Some(path) = dotenv_path {
        tracing::debug!(path = %path.display(), "loaded .env");
    }

    let cli = Cli::parse();
    let config = build_gateway_config(&cli)?;
    run_gateway_server(config).await
}
