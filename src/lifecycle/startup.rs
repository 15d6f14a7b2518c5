//! Startup orchestration.
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Metrics exporter before the listener, so the first request is counted
//! - Listener binds last (traffic only when ready)

use std::net::SocketAddr;

use super::shutdown::Shutdown;
use super::signals::forward_signals;
use crate::config::ServerConfig;
use crate::dispatch::Application;
use crate::error::Result;
use crate::http::HttpServer;
use crate::net::Listener;
use crate::observability::metrics::init_metrics;

/// Bind, serve and block until shutdown completes.
pub async fn run(config: ServerConfig, app: Application, shutdown: Shutdown) -> Result<()> {
    tracing::info!(
        bind_address = %config.listener.bind_address,
        max_connections = config.listener.max_connections,
        base_path = %config.listener.base_path,
        request_timeout_secs = config.timeouts.request_secs,
        cookies = config.headers.cookies.label(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = Listener::bind(&config.listener).await?;
    tokio::spawn(forward_signals(shutdown.clone()));

    let server = HttpServer::new(&config, app);
    server.run(listener, shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
