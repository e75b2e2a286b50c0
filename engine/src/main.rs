//! Docflux engine binary: loads configuration, wires the batch engine to
//! the passthrough executor and serves the control plane until shutdown.

use std::sync::Arc;

use docflux_engine::engine::{BatchEngine, ExtensionPolicy, PassthroughExecutor};
use docflux_engine::infrastructure::{audit, config::Settings, server, telemetry::TelemetryBuilder};
use tokio::signal;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Settings::new().expect("Failed to load configuration");

    TelemetryBuilder::new(config.telemetry.service_name.clone())
        .with_log_level(config.telemetry.log_level.clone())
        .with_json(config.telemetry.json)
        .init()
        .expect("Failed to initialize telemetry");

    info!("Docflux Engine Starting...");
    audit::log_audit(&audit::AuditEvent::SystemStartup {
        component: "Engine".into(),
    });

    // The binary ships with the passthrough executor; the docflux service
    // plugs in its parse -> translate -> generate pipeline here.
    let engine = BatchEngine::new(
        config.engine.clone(),
        Arc::new(PassthroughExecutor::new()),
        Arc::new(ExtensionPolicy::default_documents()),
    );

    let server_config = config.clone();
    let server_engine = engine.clone();
    tokio::spawn(async move {
        if let Err(e) = server::run_server(&server_config, server_engine).await {
            error!("Control plane failed: {:?}", e);
        }
    });

    info!("Docflux Engine Initialized. Waiting for shutdown signal...");

    shutdown_signal().await;

    info!("Shutdown signal received, cleaning up...");
    audit::log_audit(&audit::AuditEvent::SystemShutdown {
        reason: "Signal received".into(),
    });

    info!("Docflux Engine Shutdown Complete.");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
