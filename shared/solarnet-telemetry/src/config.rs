//! Telemetry configuration

/// Log line encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    fn from_flag(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "1" | "true" | "json" => Self::Json,
            _ => Self::Text,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    pub service_name: String,
    /// `EnvFilter` directives, e.g. `info,solarnet_datum_sql=debug`.
    pub log_filter: String,
    pub log_format: LogFormat,
}

impl TelemetryConfig {
    pub fn for_service(service_name: &str) -> Self {
        Self {
            service_name: service_name.to_string(),
            log_filter: "info".to_string(),
            log_format: LogFormat::Text,
        }
    }

    /// Read `SERVICE_NAME`, `RUST_LOG` and `JSON_LOGS`, defaulting the name
    /// to `service_name`.
    pub fn from_env(service_name: &str) -> Self {
        Self::from_lookup(service_name, |key| std::env::var(key).ok())
    }

    fn from_lookup(service_name: &str, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::for_service(service_name);
        Self {
            service_name: lookup("SERVICE_NAME").unwrap_or(defaults.service_name),
            log_filter: lookup("RUST_LOG").unwrap_or(defaults.log_filter),
            log_format: lookup("JSON_LOGS")
                .map(|v| LogFormat::from_flag(&v))
                .unwrap_or(defaults.log_format),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_environment() {
        let config = TelemetryConfig::from_lookup("datum-query", |_| None);
        assert_eq!(config, TelemetryConfig::for_service("datum-query"));
        assert_eq!(config.log_format, LogFormat::Text);
    }

    #[test]
    fn reads_overrides() {
        let config = TelemetryConfig::from_lookup("datum-query", |key| match key {
            "JSON_LOGS" => Some("1".to_string()),
            "SERVICE_NAME" => Some("datum-export".to_string()),
            "OTEL_EXPORTER_OTLP_ENDPOINT" => Some("http://collector:4317".to_string()),
            _ => None,
        });
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.service_name, "datum-export");
        assert_eq!(config.log_filter, "info");
        assert_eq!(
            config,
            TelemetryConfig {
                service_name: "datum-export".to_string(),
                log_filter: "info".to_string(),
                log_format: LogFormat::Json,
            }
        );
    }

    #[test]
    fn unknown_flag_means_text() {
        assert_eq!(LogFormat::from_flag("yes please"), LogFormat::Text);
        assert_eq!(LogFormat::from_flag("JSON"), LogFormat::Json);
    }
}
