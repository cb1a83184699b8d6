//! Process-wide settings read from `WKFLWS_`-prefixed environment variables.

use std::env;

use thiserror::Error;

/// Environment variable prefix for every setting in this module.
pub const ENV_PREFIX: &str = "WKFLWS_";

/// A setting could not be read or validated. Surfaced at startup.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("invalid value '{value}' for {name}: {reason}")]
    InvalidValue {
        name: String,
        value: String,
        reason: String,
    },

    #[error("{0}")]
    Missing(String),
}

/// System-wide settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Host of the Kafka broker. `None` disables the broker entirely.
    pub kafka_host: Option<String>,
    /// Port of the Kafka broker.
    pub kafka_port: u16,
    /// SASL username for the Kafka broker.
    pub kafka_username: Option<String>,
    /// SASL password for the Kafka broker.
    pub kafka_password: Option<String>,

    /// Disable colorful log output (<https://no-color.org>).
    pub no_color: bool,

    /// Named workflow lookup implementation, e.g. `filesystem`.
    pub workflow_lookup_class: String,
    /// Named executor implementation, e.g. `process`.
    pub executor_class: String,

    /// Service name reported on emitted spans.
    pub tracing_resource_name: String,
    /// Configured span exporters. Empty disables tracing.
    pub tracing_exporters: Vec<TracerConfig>,
}

impl Settings {
    /// Read settings from the process environment.
    pub fn from_env() -> Result<Self, ConfigurationError> {
        let kafka_port = match prefixed_var("KAFKA_PORT") {
            Some(raw) => raw.parse::<u16>().map_err(|error| ConfigurationError::InvalidValue {
                name: format!("{ENV_PREFIX}KAFKA_PORT"),
                value: raw,
                reason: error.to_string(),
            })?,
            None => 9092,
        };

        let tracing_exporters = match prefixed_var("TRACING_EXPORTERS") {
            Some(raw) => parse_tracing_exporters(&raw)?,
            None => Vec::new(),
        };

        Ok(Self {
            kafka_host: prefixed_var("KAFKA_HOST"),
            kafka_port,
            kafka_username: prefixed_var("KAFKA_USERNAME"),
            kafka_password: prefixed_var("KAFKA_PASSWORD"),
            no_color: prefixed_var("NO_COLOR")
                .or_else(|| env::var("NO_COLOR").ok())
                .map(|raw| crate::coercion::coerce_bool_str(&raw))
                .unwrap_or(false),
            workflow_lookup_class: prefixed_var("WORKFLOW_LOOKUP_CLASS").unwrap_or_else(|| "filesystem".to_string()),
            executor_class: prefixed_var("EXECUTOR_CLASS").unwrap_or_else(|| "process".to_string()),
            tracing_resource_name: prefixed_var("TRACING_RESOURCE_NAME").unwrap_or_else(|| "wkflws".to_string()),
            tracing_exporters,
        })
    }

    /// Kafka bootstrap address, when a host is configured.
    pub fn kafka_bootstrap_servers(&self) -> Option<String> {
        self.kafka_host.as_ref().map(|host| format!("{host}:{}", self.kafka_port))
    }
}

fn prefixed_var(name: &str) -> Option<String> {
    env::var(format!("{ENV_PREFIX}{name}")).ok().filter(|value| !value.is_empty())
}

/// Supported span exporter schemes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceScheme {
    OtlpHttp,
    OtlpHttps,
    OtlpGrpc,
    Console,
}

impl TraceScheme {
    fn from_str(raw: &str) -> Option<Self> {
        match raw {
            "otlp+http" => Some(Self::OtlpHttp),
            "otlp+https" => Some(Self::OtlpHttps),
            "otlp+grpc" => Some(Self::OtlpGrpc),
            "console" => Some(Self::Console),
            _ => None,
        }
    }
}

/// Configuration for one trace exporter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TracerConfig {
    pub scheme: TraceScheme,
    pub host: String,
    pub secure: bool,
}

/// Parse the `WKFLWS_TRACING_EXPORTERS` comma list.
///
/// Each entry is `scheme://host[?secure=bool]` where scheme is one of
/// `otlp+http`, `otlp+https`, `otlp+grpc`, or `console` (which takes no
/// meaningful host).
pub fn parse_tracing_exporters(raw: &str) -> Result<Vec<TracerConfig>, ConfigurationError> {
    let invalid = |value: &str, reason: &str| ConfigurationError::InvalidValue {
        name: format!("{ENV_PREFIX}TRACING_EXPORTERS"),
        value: value.to_string(),
        reason: reason.to_string(),
    };

    let mut configs = Vec::new();
    for entry in raw.split(',').map(str::trim).filter(|entry| !entry.is_empty()) {
        let (scheme_raw, rest) = entry
            .split_once("://")
            .ok_or_else(|| invalid(entry, "expected scheme://host"))?;
        let scheme = TraceScheme::from_str(scheme_raw).ok_or_else(|| invalid(entry, "unsupported scheme"))?;

        let (host, query) = match rest.split_once('?') {
            Some((host, query)) => (host, Some(query)),
            None => (rest, None),
        };

        let mut secure = matches!(scheme, TraceScheme::OtlpHttps);
        if let Some(query) = query {
            for pair in query.split('&') {
                match pair.split_once('=') {
                    Some(("secure", value)) => secure = crate::coercion::coerce_bool_str(value),
                    _ => return Err(invalid(entry, "unsupported query parameter")),
                }
            }
        }

        if host.is_empty() && scheme != TraceScheme::Console {
            return Err(invalid(entry, "missing collector host"));
        }

        configs.push(TracerConfig {
            scheme,
            host: host.to_string(),
            secure,
        });
    }

    Ok(configs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_otlp_grpc_exporter() {
        let configs = parse_tracing_exporters("otlp+grpc://collector:4317?secure=false").unwrap();
        assert_eq!(
            configs,
            vec![TracerConfig {
                scheme: TraceScheme::OtlpGrpc,
                host: "collector:4317".to_string(),
                secure: false,
            }]
        );
    }

    #[test]
    fn parses_exporter_list() {
        let configs = parse_tracing_exporters("console://, otlp+https://collector:4318").unwrap();
        assert_eq!(configs.len(), 2);
        assert_eq!(configs[0].scheme, TraceScheme::Console);
        assert_eq!(configs[1].scheme, TraceScheme::OtlpHttps);
        assert!(configs[1].secure, "https scheme defaults to secure");
    }

    #[test]
    fn rejects_unknown_scheme() {
        assert!(parse_tracing_exporters("zipkin://collector:9411").is_err());
    }

    #[test]
    fn rejects_missing_host_for_otlp() {
        assert!(parse_tracing_exporters("otlp+http://").is_err());
    }

    #[test]
    fn settings_read_prefixed_environment() {
        temp_env::with_vars(
            [
                ("WKFLWS_KAFKA_HOST", Some("broker.internal")),
                ("WKFLWS_KAFKA_PORT", Some("9093")),
                ("WKFLWS_TRACING_RESOURCE_NAME", Some("orchestrator")),
            ],
            || {
                let settings = Settings::from_env().unwrap();
                assert_eq!(settings.kafka_host.as_deref(), Some("broker.internal"));
                assert_eq!(settings.kafka_port, 9093);
                assert_eq!(settings.kafka_bootstrap_servers().as_deref(), Some("broker.internal:9093"));
                assert_eq!(settings.tracing_resource_name, "orchestrator");
                assert!(settings.tracing_exporters.is_empty());
            },
        );
    }

    #[test]
    fn invalid_port_is_a_configuration_error() {
        temp_env::with_var("WKFLWS_KAFKA_PORT", Some("not-a-port"), || {
            assert!(matches!(
                Settings::from_env(),
                Err(ConfigurationError::InvalidValue { .. })
            ));
        });
    }
}
