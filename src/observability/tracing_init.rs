//! Tracing initialization: console logging plus optional OpenTelemetry
//! OTLP export (`otlp` feature).

#[cfg(feature = "otlp")]
use opentelemetry::trace::TracerProvider as _;
#[cfg(feature = "otlp")]
use opentelemetry_sdk::trace::SdkTracerProvider;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[cfg(not(feature = "otlp"))]
struct SdkTracerProviderStub;

use crate::config::{LogFormat, LoggingConfig, ObservabilityConfig};

/// Initializes the global tracing subscriber from `config`.
///
/// Console output always goes through `tracing-subscriber`; when the
/// `otlp` feature is compiled in and `config.tracing.otlp` is set, spans
/// are also exported to the configured collector.
pub fn init_tracing(config: &ObservabilityConfig) -> Result<TracingGuard, TracingError> {
    let filter = build_env_filter(&config.logging);

    #[cfg(feature = "otlp")]
    let otel_provider = match &config.tracing.otlp {
        Some(otlp) => Some(build_otel_provider(otlp, &config.tracing.sampling)?),
        None => None,
    };
    #[cfg(not(feature = "otlp"))]
    let otel_provider: Option<SdkTracerProviderStub> = {
        if config.tracing.otlp.is_some() {
            tracing::warn!(
                "observability.tracing.otlp is configured but the 'otlp' feature is not \
                 compiled; rebuild with --features otlp to export spans"
            );
        }
        None
    };

    #[cfg(feature = "otlp")]
    let otel_tracer = otel_provider.as_ref().map(|p| p.tracer("memoryd-core"));

    match config.logging.format {
        LogFormat::Pretty => {
            let fmt_layer = tracing_subscriber::fmt::layer().pretty().with_target(true);
            #[cfg(feature = "otlp")]
            if let Some(tracer) = otel_tracer {
                tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt_layer)
                    .with(tracing_opentelemetry::layer().with_tracer(tracer))
                    .init();
            } else {
                tracing_subscriber::registry().with(filter).with(fmt_layer).init();
            }
            #[cfg(not(feature = "otlp"))]
            tracing_subscriber::registry().with(filter).with(fmt_layer).init();
        }
        LogFormat::Json => {
            let fmt_layer = tracing_subscriber::fmt::layer().json();
            #[cfg(feature = "otlp")]
            if let Some(tracer) = otel_tracer {
                tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt_layer)
                    .with(tracing_opentelemetry::layer().with_tracer(tracer))
                    .init();
            } else {
                tracing_subscriber::registry().with(filter).with(fmt_layer).init();
            }
            #[cfg(not(feature = "otlp"))]
            tracing_subscriber::registry().with(filter).with(fmt_layer).init();
        }
    }

    #[cfg(feature = "otlp")]
    if let Some(provider) = &otel_provider {
        opentelemetry::global::set_tracer_provider(provider.clone());
        opentelemetry::global::set_text_map_propagator(
            opentelemetry_sdk::propagation::TraceContextPropagator::new(),
        );
        tracing::info!("OpenTelemetry OTLP export enabled");
    }

    Ok(TracingGuard {
        provider: otel_provider,
    })
}

#[cfg(feature = "otlp")]
fn build_otel_provider(
    otlp: &crate::config::OtlpConfig,
    sampling: &crate::config::SamplingConfig,
) -> Result<SdkTracerProvider, TracingError> {
    use opentelemetry::KeyValue;
    use opentelemetry_otlp::{SpanExporter, WithExportConfig};
    use opentelemetry_sdk::Resource;
    use opentelemetry_sdk::trace::Sampler;

    let resource = Resource::builder()
        .with_attributes(vec![KeyValue::new(
            "service.name",
            otlp.service_name.clone(),
        )])
        .build();

    let exporter = match otlp.protocol {
        crate::config::OtlpProtocol::Grpc => SpanExporter::builder()
            .with_tonic()
            .with_endpoint(&otlp.endpoint)
            .build(),
        crate::config::OtlpProtocol::HttpProto => SpanExporter::builder()
            .with_http()
            .with_endpoint(&otlp.endpoint)
            .build(),
    }
    .map_err(|e| TracingError::Init(e.to_string()))?;

    Ok(SdkTracerProvider::builder()
        .with_resource(resource)
        .with_sampler(Sampler::TraceIdRatioBased(sampling.ratio))
        .with_batch_exporter(exporter)
        .build())
}

/// Builds the env filter: `RUST_LOG` wins if set, otherwise the
/// configured level combined with `logging.filter`, quieting a few
/// chatty crates by default.
fn build_env_filter(config: &LoggingConfig) -> EnvFilter {
    let base_level = config.level.as_str();

    if let Ok(env_filter) = std::env::var("RUST_LOG") {
        return EnvFilter::try_new(env_filter).unwrap_or_else(|_| EnvFilter::new(base_level));
    }

    if let Some(filter) = &config.filter {
        let combined = format!("{base_level},{filter}");
        return EnvFilter::try_new(combined).unwrap_or_else(|_| EnvFilter::new(base_level));
    }

    EnvFilter::new(format!("{base_level},hyper=warn,sqlx=warn"))
}

/// Keeps the OpenTelemetry tracer provider alive and flushes it on drop.
pub struct TracingGuard {
    #[cfg(feature = "otlp")]
    provider: Option<SdkTracerProvider>,
    #[cfg(not(feature = "otlp"))]
    #[allow(dead_code)]
    provider: Option<SdkTracerProviderStub>,
}

impl Drop for TracingGuard {
    fn drop(&mut self) {
        #[cfg(feature = "otlp")]
        if let Some(provider) = &self.provider
            && let Err(e) = provider.shutdown()
        {
            eprintln!("error shutting down OpenTelemetry tracer provider: {e:?}");
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TracingError {
    #[error("failed to initialize tracing: {0}")]
    Init(String),
}
