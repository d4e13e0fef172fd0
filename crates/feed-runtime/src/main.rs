//! # Feed Gateway Runtime
//!
//! Entry point for the feed gateway.
//!
//! ## Startup Sequence
//!
//! 1. Install logging
//! 2. Build and validate configuration from the environment
//! 3. Create the Graph API client (connection pool is created on first use)
//! 4. Serve until Ctrl+C or SIGTERM
//! 5. Drain in-flight requests, then release the upstream pool

mod config_env;
mod telemetry;

use std::sync::Arc;

use anyhow::{Context, Result};
use feed_gateway::{ApiGatewayService, GraphClient};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    telemetry::init(&telemetry::TelemetryConfig::from_env())
        .context("failed to initialize logging")?;

    let config = config_env::from_env().context("invalid configuration")?;
    info!(version = feed_gateway::VERSION, config = ?config, "Starting feed gateway");

    if config.upstream.access_token.is_none() {
        warn!("FB_ACCESS_TOKEN is not set; /api/posts will answer 500 until it is");
    }
    if config.upstream.default_page_id.is_none() {
        warn!("FB_PAGE_ID is not set; requests must name a page_id");
    }

    let upstream = Arc::new(GraphClient::new(&config.upstream));
    let service = ApiGatewayService::new(config, upstream)?;

    service.serve(shutdown_signal()).await?;
    Ok(())
}

/// Resolves on Ctrl+C, or SIGTERM on unix
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, draining connections");
}
