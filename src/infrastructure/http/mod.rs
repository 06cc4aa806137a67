use axum::{http::Uri, Router};
use std::net::SocketAddr;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::infrastructure::config::AppConfig;
use crate::presentation::{
    middleware::{
        into_handler, AppError, GzipCompression, HppFilter, OriginGate, Pipeline, RateLimiter,
        ResponseTimer, SecurityConfig, SecurityHeaders,
    },
    routes,
};

/// Build the rate limiter described by the configuration
pub fn create_rate_limiter(config: &AppConfig) -> RateLimiter {
    let settings = &config.middleware.rate_limit;

    RateLimiter::new(settings.policy())
        .with_key_extractor(settings.key_extractor())
        .with_headers(settings.include_headers)
}

/// Request pipeline, outermost stage first
pub fn build_pipeline(config: &AppConfig, limiter: RateLimiter) -> Pipeline {
    let middleware = &config.middleware;

    Pipeline::new()
        .stage("cors", OriginGate::new((&middleware.cors).into()))
        .stage("compression", GzipCompression)
        .stage("security_headers", SecurityHeaders::new(SecurityConfig::default()))
        .stage("response_time", ResponseTimer)
        .stage("rate_limit", limiter)
        .stage("hpp", HppFilter::new((&middleware.hpp).into()))
}

/// Create the main application router
///
/// Starts the rate limiter's reset cycle, which runs until `shutdown` is
/// cancelled. Must be called from within a tokio runtime.
pub fn create_app(config: &AppConfig, shutdown: CancellationToken) -> Router {
    let limiter = create_rate_limiter(config);
    limiter.spawn_reset_cycle(shutdown);

    let pipeline = build_pipeline(config, limiter);
    info!(stages = ?pipeline.stage_names(), "Request pipeline assembled");

    let routes = routes::create_routes().fallback(not_found_handler);
    let handler = pipeline.build(into_handler(routes));

    Router::new().fallback_service(handler).layer(TraceLayer::new_for_http())
}

/// Handler for 404 not found
async fn not_found_handler(uri: Uri) -> AppError {
    AppError::NotFound { resource: uri.path().to_string() }
}

async fn shutdown_signal(shutdown: CancellationToken) {
    tokio::select! {
        result = tokio::signal::ctrl_c() => match result {
            Ok(()) => info!("Shutdown signal received"),
            Err(e) => {
                warn!("Failed to listen for shutdown signal: {}", e);
                shutdown.cancelled().await;
            }
        },
        () = shutdown.cancelled() => {}
    }

    shutdown.cancel();
}

/// Start the HTTP server
///
/// # Errors
/// Returns an error if the address is invalid or the server fails to start
pub async fn start_server(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let shutdown = CancellationToken::new();
    let app = create_app(&config, shutdown.clone());
    let addr = config.server.socket_addr()?;

    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;

    info!("Server stopped");
    Ok(())
}
