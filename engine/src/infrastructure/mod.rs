/// Audit logging for lifecycle events.
pub mod audit;
/// Configuration management for the engine.
pub mod config;
/// HTTP server and control plane.
pub mod server;
/// Telemetry setup for logging and metrics.
pub mod telemetry;
