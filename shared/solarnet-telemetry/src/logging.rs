//! Subscriber installation

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::{LogFormat, TelemetryConfig, TelemetryError};

/// Install the global subscriber. Log lines go to stderr; stdout belongs to
/// command output.
///
/// An explicit `RUST_LOG` value that fails to parse is an error rather than
/// a silent fallback.
pub fn init_logging(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let filter = EnvFilter::try_new(&config.log_filter).map_err(|e| TelemetryError::InvalidFilter {
        filter: config.log_filter.clone(),
        message: e.to_string(),
    })?;

    let base = fmt::layer().with_target(true).with_writer(std::io::stderr);
    let layer = match config.log_format {
        LogFormat::Json => base.json().with_current_span(true).boxed(),
        LogFormat::Text => base.boxed(),
    };

    tracing_subscriber::registry()
        .with(layer.with_filter(filter))
        .try_init()
        .map_err(|e| TelemetryError::Subscriber(e.to_string()))?;

    tracing::info!(
        service = %config.service_name,
        filter = %config.log_filter,
        format = ?config.log_format,
        "Logging initialized"
    );
    Ok(())
}
