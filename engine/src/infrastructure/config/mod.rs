//! Configuration management for docflux.
//!
//! This module provides structured configuration for the HTTP server,
//! the batch engine (pool size, admission limits, retry and retention)
//! and telemetry.
//!
//! # Example
//!
//! ```
//! use docflux_engine::infrastructure::config::Settings;
//!
//! let settings = Settings::new().expect("Failed to load configuration");
//! ```

pub mod engine;
pub mod server;
pub mod telemetry;

pub use engine::EngineSettings;
pub use server::ServerSettings;
pub use telemetry::TelemetrySettings;

use config::{Config, ConfigError, Environment};
use serde::Deserialize;

/// Top-level configuration for the docflux engine.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    /// Server settings.
    pub server: ServerSettings,
    /// Batch engine settings.
    #[serde(default)]
    pub engine: EngineSettings,
    /// Telemetry settings.
    pub telemetry: TelemetrySettings,
}

impl Settings {
    /// Creates a new settings instance from environment variables and defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be built or deserialized.
    pub fn new() -> Result<Self, ConfigError> {
        let s = Config::builder()
            // Start with default values
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("telemetry.service_name", "docflux-engine")?
            // Merge in Environment variables
            .add_source(Environment::with_prefix("DOCFLUX").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_admission_contract() {
        let engine = EngineSettings::default();
        assert_eq!(engine.max_concurrent_tasks, 10);
        assert_eq!(engine.max_batch_size, 50);
        assert_eq!(engine.max_total_size_bytes, 1024 * 1024 * 1024);
        assert_eq!(engine.item_timeout_secs, 300);
        assert_eq!(engine.max_retries, 3);
        assert_eq!(engine.retention_hours, 24);
    }

    #[test]
    fn settings_build_from_defaults() {
        let settings = Settings::new().expect("defaults deserialize");
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.telemetry.service_name, "docflux-engine");
        assert_eq!(settings.telemetry.log_level, "info");
    }
}
