//! Tracing and OpenTelemetry Setup
//!
//! Installs the global `tracing` subscriber: a console fmt layer is
//! always on, and an OTLP span exporter is layered on top unless
//! disabled. Any OTLP-compatible backend (OpenObserve, Jaeger) works.
//!
//! # Environment Variables
//!
//! - `OTEL_ENABLED`: set to "false" to skip the OTLP layer (default: true)
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: exporter endpoint (default: http://localhost:4318)
//! - `OTEL_SERVICE_NAME`: service name on exported spans (default: stockline-order-stream-hub)
//! - `RUST_LOG`: extra filter directives on top of the built-in ones

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::trace::SdkTracerProvider;
use thiserror::Error;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Service name on exported spans unless overridden.
const DEFAULT_SERVICE_NAME: &str = "stockline-order-stream-hub";

/// Default OTLP endpoint.
const DEFAULT_OTLP_ENDPOINT: &str = "http://localhost:4318";

/// Baseline filter directives; `RUST_LOG` adds to these.
const LOG_DIRECTIVES: [&str; 4] = [
    "order_stream_hub=info",
    "tower_http=info",
    "tungstenite=warn",
    "hyper=warn",
];

// =============================================================================
// Error Types
// =============================================================================

/// Errors installing the tracing stack.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// A built-in filter directive failed to parse.
    #[error("invalid log directive: {0}")]
    Directive(#[from] tracing_subscriber::filter::ParseError),

    /// The OTLP span exporter could not be built.
    #[error("failed to build OTLP span exporter: {0}")]
    Exporter(String),
}

// =============================================================================
// Configuration
// =============================================================================

/// Telemetry settings, read from `OTEL_*` variables.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Whether the OTLP layer is installed at all.
    pub enabled: bool,
    /// OTLP exporter endpoint.
    pub otlp_endpoint: String,
    /// Service name on exported spans.
    pub service_name: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            otlp_endpoint: DEFAULT_OTLP_ENDPOINT.to_string(),
            service_name: DEFAULT_SERVICE_NAME.to_string(),
        }
    }
}

impl TelemetryConfig {
    /// Read settings from the environment, defaulting anything unset.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            enabled: std::env::var("OTEL_ENABLED")
                .map_or(defaults.enabled, |v| v.to_lowercase() != "false"),
            otlp_endpoint: std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
                .unwrap_or(defaults.otlp_endpoint),
            service_name: std::env::var("OTEL_SERVICE_NAME").unwrap_or(defaults.service_name),
        }
    }
}

// =============================================================================
// Guard
// =============================================================================

/// Flushes and shuts the tracer provider down when dropped.
///
/// Hold this for the lifetime of the program; dropping it early stops
/// span export.
pub struct TelemetryGuard {
    tracer_provider: Option<SdkTracerProvider>,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.tracer_provider.take()
            && let Err(e) = provider.shutdown()
        {
            eprintln!("Failed to shutdown OpenTelemetry tracer provider: {e}");
        }
    }
}

// =============================================================================
// Initialization
// =============================================================================

/// Install the global subscriber using environment configuration.
///
/// # Errors
///
/// Returns [`TelemetryError`] if a filter directive is invalid or the
/// OTLP exporter cannot be built.
pub fn init() -> Result<TelemetryGuard, TelemetryError> {
    init_with_config(TelemetryConfig::from_env())
}

/// Install the global subscriber with explicit configuration.
///
/// # Errors
///
/// Returns [`TelemetryError`] if a filter directive is invalid or the
/// OTLP exporter cannot be built.
pub fn init_with_config(config: TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    let env_filter = build_env_filter()?;
    let fmt_layer = tracing_subscriber::fmt::layer().with_target(true);

    if !config.enabled {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .init();

        return Ok(TelemetryGuard {
            tracer_provider: None,
        });
    }

    let tracer_provider = build_tracer_provider(&config)?;
    let tracer = tracer_provider.tracer(config.service_name);
    let otel_layer = tracing_opentelemetry::layer().with_tracer(tracer);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .with(otel_layer)
        .init();

    Ok(TelemetryGuard {
        tracer_provider: Some(tracer_provider),
    })
}

fn build_env_filter() -> Result<EnvFilter, TelemetryError> {
    let mut filter = EnvFilter::from_default_env();
    for directive in LOG_DIRECTIVES {
        filter = filter.add_directive(directive.parse()?);
    }
    Ok(filter)
}

fn build_tracer_provider(config: &TelemetryConfig) -> Result<SdkTracerProvider, TelemetryError> {
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(&config.otlp_endpoint)
        .build()
        .map_err(|e| TelemetryError::Exporter(e.to_string()))?;

    Ok(SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(
            opentelemetry_sdk::Resource::builder()
                .with_service_name(config.service_name.clone())
                .build(),
        )
        .build())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config = TelemetryConfig::default();

        assert!(config.enabled);
        assert_eq!(config.otlp_endpoint, DEFAULT_OTLP_ENDPOINT);
        assert_eq!(config.service_name, DEFAULT_SERVICE_NAME);
    }

    #[test]
    fn static_directives_parse() {
        assert!(build_env_filter().is_ok());
    }
}
