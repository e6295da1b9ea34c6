//! Observability configuration: structured logging, distributed tracing,
//! and metrics export.

use serde::{Deserialize, Serialize};

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct ObservabilityConfig {
    /// Structured logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Distributed tracing configuration.
    #[serde(default)]
    pub tracing: TracingConfig,

    /// Metrics export configuration.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Structured logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Minimum log level.
    #[serde(default)]
    pub level: LogLevel,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,

    /// `RUST_LOG`-style per-target filter directives, applied on top of
    /// `level` (e.g. `"sqlx=warn,memoryd_core::streaming=debug"`).
    #[serde(default)]
    pub filter: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::default(),
            format: LogFormat::default(),
            filter: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable, for local development.
    #[default]
    Pretty,
    /// Newline-delimited JSON, for log aggregation.
    Json,
}

/// Distributed tracing configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct TracingConfig {
    /// OpenTelemetry OTLP exporter configuration. Requires the `otlp`
    /// feature; absent means traces stay local (tracing-subscriber only).
    #[serde(default)]
    pub otlp: Option<OtlpConfig>,

    /// Span/trace sampling configuration.
    #[serde(default)]
    pub sampling: SamplingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct OtlpConfig {
    /// OTLP collector endpoint, e.g. `http://localhost:4317`.
    pub endpoint: String,

    #[serde(default)]
    pub protocol: OtlpProtocol,

    /// Service name reported in resource attributes.
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

fn default_service_name() -> String {
    "memoryd-core".to_string()
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(rename_all = "lowercase")]
pub enum OtlpProtocol {
    #[default]
    Grpc,
    HttpProto,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct SamplingConfig {
    /// Fraction of traces to sample, in `[0.0, 1.0]`.
    #[serde(default = "default_sample_ratio")]
    pub ratio: f64,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            ratio: default_sample_ratio(),
        }
    }
}

fn default_sample_ratio() -> f64 {
    1.0
}

/// Metrics export configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct MetricsConfig {
    /// Whether to expose a Prometheus scrape endpoint. Requires the
    /// `prometheus` feature.
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub prometheus: PrometheusConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct PrometheusConfig {
    /// Path the scrape endpoint is served on.
    #[serde(default = "default_metrics_path")]
    pub path: String,
}

impl Default for PrometheusConfig {
    fn default() -> Self {
        Self {
            path: default_metrics_path(),
        }
    }
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_quiet_and_local() {
        let cfg = ObservabilityConfig::default();
        assert!(matches!(cfg.logging.level, LogLevel::Info));
        assert!(cfg.tracing.otlp.is_none());
        assert!(!cfg.metrics.enabled);
    }

    #[test]
    fn parses_minimal_toml() {
        let toml = r#"
            [logging]
            level = "debug"
            format = "json"
        "#;
        let cfg: ObservabilityConfig = toml::from_str(toml).unwrap();
        assert!(matches!(cfg.logging.level, LogLevel::Debug));
        assert!(matches!(cfg.logging.format, LogFormat::Json));
    }
}
