//! Telemetry configuration for docflux.
//!
//! This module defines logging and observability settings.

use serde::Deserialize;

/// Telemetry configuration settings.
#[derive(Debug, Deserialize, Clone)]
pub struct TelemetrySettings {
    /// Service name for telemetry.
    pub service_name: String,
    /// Default log level when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Emit logs as JSON lines.
    #[serde(default)]
    pub json: bool,
}

pub(super) fn default_log_level() -> String {
    "info".to_string()
}
