#![deny(clippy::all)]
#![deny(clippy::pedantic)]

use school_api::infrastructure::{
    config::{AppConfig, LogFormat, LoggingConfig},
    http::start_server,
};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let config = AppConfig::load()?;

    init_tracing(&config.logging);

    info!(mode = %config.mode, "Starting School API");
    info!("Configuration loaded: server will bind to {}:{}", config.server.host, config.server.port);

    // Start the HTTP server
    if let Err(e) = start_server(config).await {
        error!("Server error: {}", e);
        return Err(e);
    }

    Ok(())
}

/// Initialize structured logging
fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("school_api={},tower_http={}", logging.level, logging.level))
    });

    let registry = tracing_subscriber::registry().with(filter);

    match logging.format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer().pretty()).init(),
        LogFormat::Compact => registry.with(tracing_subscriber::fmt::layer().compact()).init(),
    }
}
