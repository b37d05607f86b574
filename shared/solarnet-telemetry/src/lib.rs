//! SolarNet Telemetry
//!
//! Structured logging for datum services and the in-process counters the
//! datum store reports through.

mod config;
mod logging;
mod metrics;

pub use config::{LogFormat, TelemetryConfig};
pub use logging::init_logging;
pub use metrics::{Counter, Histogram, LatencySummary};

/// Configure telemetry for `service_name` from the environment.
pub fn init(service_name: &str) -> Result<TelemetryGuard, TelemetryError> {
    let config = TelemetryConfig::from_env(service_name);
    init_logging(&config)?;
    Ok(TelemetryGuard {
        service_name: config.service_name,
    })
}

/// Flushes the global tracer provider when the service exits
pub struct TelemetryGuard {
    service_name: String,
}

impl TelemetryGuard {
    pub fn service_name(&self) -> &str {
        &self.service_name
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::debug!(service = %self.service_name, "Shutting down telemetry");
        opentelemetry::global::shutdown_tracer_provider();
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("Invalid log filter {filter:?}: {message}")]
    InvalidFilter { filter: String, message: String },

    #[error("Subscriber installation failed: {0}")]
    Subscriber(String),
}
