//! Market-data client - Entry Point
//!
//! Replays normalized feed events through a supervised client and publishes
//! its health as Prometheus metrics.

use anyhow::Result;
use clap::Parser;
use tracing::info;

/// Resilient market-data client
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via MDC_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,

    /// Override the replay file from the configuration
    #[arg(long)]
    replay: Option<std::path::PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    mdc_telemetry::init_logging()?;

    info!("Starting market-data client v{}", env!("CARGO_PKG_VERSION"));

    // CLI arg > MDC_CONFIG env var > default
    let config_path = mdc_client::AppConfig::resolve_path(args.config);
    info!(config_path = %config_path, "Loading configuration");

    let mut config = mdc_client::AppConfig::load(&config_path)?;
    if let Some(replay) = args.replay {
        config.replay.path = replay;
    }
    info!(replay = %config.replay.path.display(), "Configuration loaded");

    let app = mdc_client::Application::new(config);
    app.run().await?;

    Ok(())
}
