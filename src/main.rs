#[global_allocator]
static GLOBAL: jemallocator::Jemalloc = jemallocator::Jemalloc;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::info;

use twr::config::Config;
use twr::server::{start_server, AppState};
use twr::telemetry::{init_telemetry, shutdown_telemetry, TelemetryConfig};
use twr::token_generator::CommandGenerator;
use twr::updater::LavalinkUpdater;

#[derive(Parser, Debug)]
#[command(name = "twr")]
#[command(about = "Token Webhook Relay - webhook-triggered YouTube token refresh for Lavalink")]
#[command(version)]
struct Args {
    /// Path to configuration file (environment variables override it)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration
    let config = Config::load(args.config.as_deref())?;

    // Initialize telemetry
    let telemetry_config = TelemetryConfig {
        otlp_endpoint: config.telemetry.otlp_endpoint.clone(),
        log_filter: config
            .telemetry
            .log_filter
            .clone()
            .unwrap_or_else(|| "info".to_string()),
    };
    init_telemetry(telemetry_config)?;

    info!("Starting webhook server on {}", config.listen);
    info!("Lavalink URL: {}", config.lavalink.url);
    info!("Endpoints:");
    info!("  POST/GET /refresh - Refresh token");
    info!("  GET /health - Health check");

    let generator = Arc::new(CommandGenerator::new(config.generator.clone()));
    let updater = Arc::new(LavalinkUpdater::new(
        &config.lavalink.url,
        &config.lavalink.password,
    ));

    let state = AppState::new(generator, updater, config.lavalink.url.clone());

    let result = start_server(&config.listen, state).await;

    // Flush any pending spans before exiting
    shutdown_telemetry();

    result?;
    Ok(())
}
