use anyhow::{Context, Result};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

/// Builder for setting up telemetry (logging and log formatting).
pub struct TelemetryBuilder {
    service_name: String,
    log_level: String,
    json: bool,
}

impl TelemetryBuilder {
    /// Creates a builder for the named service.
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            log_level: "info".to_string(),
            json: false,
        }
    }

    /// Sets the fallback log level used when `RUST_LOG` is unset.
    #[must_use]
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Emits log lines as JSON instead of human-readable text.
    #[must_use]
    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }

    /// Initializes the global tracing subscriber.
    ///
    /// # Errors
    ///
    /// Returns an error if a subscriber was already installed.
    pub fn init(self) -> Result<()> {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.log_level));

        let fmt_layer = if self.json {
            fmt::layer().json().with_span_events(FmtSpan::CLOSE).boxed()
        } else {
            fmt::layer().with_span_events(FmtSpan::CLOSE).boxed()
        };

        Registry::default()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
            .with_context(|| format!("Failed to init subscriber for {}", self.service_name))?;

        Ok(())
    }
}
