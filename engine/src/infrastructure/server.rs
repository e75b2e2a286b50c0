use crate::api;
use crate::api::handlers::health_check;
use crate::engine::BatchEngine;
use crate::infrastructure::config::Settings;
use axum::{Router, routing::get};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Runs the control plane HTTP server with the task API and event stream.
///
/// # Errors
///
/// Returns an error if the server fails to start or encounters an error while running.
pub async fn run_server(config: &Settings, engine: BatchEngine) -> anyhow::Result<()> {
    let builder = PrometheusBuilder::new();
    let handle = builder
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus recorder: {e}"))?;

    let control_plane = Router::new()
        .route("/health/live", get(health_check))
        .route("/health/ready", get(health_check))
        .route("/metrics", get(move || std::future::ready(handle.render())));

    let app = control_plane.merge(api::routes().with_state(engine));

    let addr_str = format!("{}:{}", config.server.host, config.server.port);
    let addr: SocketAddr = addr_str.parse()?;

    tracing::info!("Control plane listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
