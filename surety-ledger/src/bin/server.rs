//! Surety ledger server binary

use anyhow::Context;
use surety_ledger::{Config, Ledger};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    tracing::info!("Starting FlightSurety ledger server");

    // Load configuration
    let config = match std::env::var("SURETY_CONFIG") {
        Ok(path) => Config::from_file(&path).with_context(|| format!("loading {}", path))?,
        Err(_) => Config::from_env().context("loading configuration from environment")?,
    };

    let ledger = Ledger::open(config).await.context("opening ledger")?;
    tracing::info!(
        owner = %ledger.owner().await?,
        operational = ledger.is_operational().await?,
        "Ledger opened successfully"
    );

    tokio::signal::ctrl_c().await?;

    tracing::info!("Shutting down ledger server");
    ledger.shutdown().await?;
    Ok(())
}
