//! Tracing subscriber setup with an optional OpenTelemetry exporter.
//!
//! `RUST_LOG` overrides the default `info` filter. Spans are exported over
//! OTLP only when `OTEL_EXPORTER_OTLP_ENDPOINT` is set.

use anyhow::Context;
use clap::ValueEnum;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry::KeyValue;
use opentelemetry_sdk::trace::TracerProvider;
use opentelemetry_sdk::{runtime, Resource};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const OTLP_ENDPOINT_VAR: &str = "OTEL_EXPORTER_OTLP_ENDPOINT";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

/// Keeps the tracer provider alive; call [`Telemetry::shutdown`] before exit.
pub struct Telemetry {
    provider: Option<TracerProvider>,
}

impl Telemetry {
    pub fn init(format: LogFormat) -> anyhow::Result<Self> {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        let (json, text) = match format {
            LogFormat::Json => (Some(fmt::layer().json().with_current_span(true)), None),
            LogFormat::Text => (None, Some(fmt::layer().with_target(false))),
        };

        let provider = match std::env::var(OTLP_ENDPOINT_VAR) {
            Ok(endpoint) if !endpoint.trim().is_empty() => Some(otlp_provider()?),
            _ => None,
        };
        let otel = provider.as_ref().map(|p| {
            opentelemetry::global::set_tracer_provider(p.clone());
            tracing_opentelemetry::layer().with_tracer(p.tracer("devloop"))
        });

        tracing_subscriber::registry()
            .with(filter)
            .with(json)
            .with(text)
            .with(otel)
            .try_init()
            .context("installing the tracing subscriber")?;

        Ok(Self { provider })
    }

    /// Flushes buffered spans.
    pub fn shutdown(self) {
        if let Some(provider) = self.provider {
            if let Err(e) = provider.shutdown() {
                eprintln!("failed to flush telemetry: {e}");
            }
        }
    }
}

fn otlp_provider() -> anyhow::Result<TracerProvider> {
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .build()
        .context("building the OTLP span exporter")?;
    Ok(TracerProvider::builder()
        .with_batch_exporter(exporter, runtime::Tokio)
        .with_resource(Resource::new(vec![KeyValue::new(
            "service.name",
            "devloop",
        )]))
        .build())
}
