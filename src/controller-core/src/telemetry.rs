use crate::{Error, Result};

use tracing_subscriber::{prelude::*, EnvFilter, Layer, Registry};

///  Fetch an opentelemetry::trace::TraceId as hex through the full tracing stack
pub fn get_trace_id() -> opentelemetry::trace::TraceId {
    use opentelemetry::trace::TraceContextExt as _; // opentelemetry::Context -> opentelemetry::trace::Span
    use tracing_opentelemetry::OpenTelemetrySpanExt as _; // tracing::Span to opentelemetry::Context

    tracing::Span::current()
        .context()
        .span()
        .span_context()
        .trace_id()
}

#[cfg(feature = "telemetry")]
async fn init_tracer() -> Result<opentelemetry::sdk::trace::Tracer> {
    let otlp_endpoint = std::env::var("OPENTELEMETRY_ENDPOINT_URL")
        .map_err(|_| Error::TelemetryError("OPENTELEMETRY_ENDPOINT_URL is not set".into()))?;

    let channel = tonic::transport::Channel::from_shared(otlp_endpoint)
        .map_err(|e| Error::TelemetryError(e.to_string()))?
        .connect()
        .await
        .map_err(|e| Error::TelemetryError(e.to_string()))?;

    opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(opentelemetry_otlp::new_exporter().tonic().with_channel(channel))
        .with_trace_config(opentelemetry::sdk::trace::config().with_resource(
            opentelemetry::sdk::Resource::new(vec![opentelemetry::KeyValue::new(
                "service.name",
                "restarter",
            )]),
        ))
        .install_batch(opentelemetry::runtime::Tokio)
        .map_err(|e| Error::TelemetryError(e.to_string()))
}

/// Initialize tracing
///
/// Filtering follows `RUST_LOG` and falls back to `info`.
/// With `json` set, every event is written as a single JSON line.
pub async fn init(json: bool) -> Result<()> {
    let logger: Box<dyn Layer<Registry> + Send + Sync> = if json {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().compact().boxed()
    };
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|e| Error::TelemetryError(e.to_string()))?;

    let collector = Registry::default().with(logger).with(env_filter);

    #[cfg(feature = "telemetry")]
    let collector = collector.with(tracing_opentelemetry::layer().with_tracer(init_tracer().await?));

    tracing::subscriber::set_global_default(collector).map_err(|e| Error::TelemetryError(e.to_string()))
}
