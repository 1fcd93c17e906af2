//! # Stratus
//!
//! Command-line entry point: loads configuration, installs tracing, builds the
//! application and runs one command, printing its result as JSON.

use anyhow::Context;
use clap::Parser;
use stratus_config::ConfigLoader;
use stratus_core::{init_tracing, ErrorResponse};
use stratus_server::{build_app, Cli};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        error!("Application error: {:#}", e);
        eprintln!("{:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config_loader =
        ConfigLoader::new(&cli.config_dir).context("Failed to load configuration")?;
    let config = config_loader.get();

    init_tracing(&config.observability).context("Failed to initialize tracing")?;

    info!("Starting Stratus {}", env!("CARGO_PKG_VERSION"));
    info!("Environment: {}", config.app.environment);

    let app = build_app(config).context("Failed to build application")?;

    match cli.execute(&app).await {
        Ok(output) => {
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(())
        }
        Err(e) => {
            let response = ErrorResponse::from_error(&e);
            eprintln!("{}", serde_json::to_string_pretty(&response)?);
            anyhow::bail!("{} failed with status {}", e.error_code(), e.status_code())
        }
    }
}
