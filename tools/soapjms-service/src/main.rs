//! SOAP/JMS Service
//!
//! Serves the endpoints declared in a TOML file until interrupted.

use anyhow::{Context, Result};
use clap::Parser;
use soapjms_service::{Service, ServiceConfig};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "soapjms-service")]
#[command(author, version, about = "SOAP over JMS endpoint service", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "SOAPJMS_CONFIG")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(&cli.log_level, cli.json_logs)?;

    let config = ServiceConfig::load(&cli.config)?;
    let service = Service::new(config)?;
    let bound = service.start().await?;
    info!(endpoints = bound.len(), "SOAP/JMS service running, press Ctrl+C to stop");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;

    info!("Shutting down");
    service.stop().await;
    Ok(())
}

fn setup_logging(level: &str, json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .context("Failed to parse log level")?;

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false).compact())
            .init();
    }

    Ok(())
}
