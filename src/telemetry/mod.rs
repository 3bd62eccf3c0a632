//! # Telemetry
//!
//! Installs the global `tracing` subscriber: a compact console layer plus,
//! when an OTLP endpoint is configured, an OpenTelemetry layer that exports
//! spans over gRPC.
//!
//! Script runs, loads and individual commands emit spans and events through
//! `tracing`; messages written to an execution context's log are mirrored
//! under the `qws_script` target.
//!
//! ## Environment
//!
//! - `OTEL_SERVICE_NAME`: service name attached to exported spans
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: collector URL; unset means console only
//! - `OTEL_TRACES_SAMPLER_ARG`: sampling ratio (0.0-1.0)
//! - `RUST_LOG`: filter directives, overriding `log_level`
//!
//! ```ignore
//! init_telemetry(TelemetryConfig::from_env())?;
//! // ... run scripts ...
//! shutdown_telemetry();
//! ```

use opentelemetry::trace::TracerProvider as _;
use opentelemetry::{global, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::runtime::Tokio;
use opentelemetry_sdk::trace::{RandomIdGenerator, Sampler, Tracer, TracerProvider};
use opentelemetry_sdk::{trace as sdktrace, Resource};
use tracing::Level;
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

// ============================================================================
// CONFIGURATION
// ============================================================================

pub const DEFAULT_SERVICE_NAME: &str = "qws-script-engine";

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub service_name: String,

    /// gRPC collector endpoint, e.g. `http://localhost:4317`.
    pub otlp_endpoint: Option<String>,

    /// Fraction of traces kept, 0.0 to 1.0.
    pub sampling_ratio: f64,

    pub enable_console_logging: bool,

    /// Default level when `RUST_LOG` is unset.
    pub log_level: Level,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: DEFAULT_SERVICE_NAME.to_string(),
            otlp_endpoint: None,
            sampling_ratio: 1.0,
            enable_console_logging: true,
            log_level: Level::INFO,
        }
    }
}

impl TelemetryConfig {
    /// Defaults overridden by the `OTEL_*` variables that are set.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(name) = std::env::var("OTEL_SERVICE_NAME") {
            config.service_name = name;
        }

        if let Ok(endpoint) = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT") {
            if !endpoint.trim().is_empty() {
                config.otlp_endpoint = Some(endpoint);
            }
        }

        if let Ok(ratio) = std::env::var("OTEL_TRACES_SAMPLER_ARG") {
            if let Ok(r) = ratio.parse::<f64>() {
                config.sampling_ratio = r.clamp(0.0, 1.0);
            }
        }

        config
    }

    /// Raises the default level to DEBUG (`--verbose`).
    pub fn verbose(mut self, verbose: bool) -> Self {
        if verbose {
            self.log_level = Level::DEBUG;
        }
        self
    }
}

// ============================================================================
// INITIALIZATION
// ============================================================================

/// Installs the global subscriber.
///
/// Returns the OTLP tracer when an endpoint is configured, `None` for
/// console-only logging. Fails if the exporter cannot be built or a global
/// subscriber is already set.
pub fn init_telemetry(config: TelemetryConfig) -> anyhow::Result<Option<Tracer>> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.to_string()));

    if let Some(endpoint) = &config.otlp_endpoint {
        let tracer = init_otlp_tracer(&config.service_name, endpoint, config.sampling_ratio)?;
        let telemetry_layer = OpenTelemetryLayer::new(tracer.clone());

        let subscriber = tracing_subscriber::registry()
            .with(env_filter)
            .with(telemetry_layer);

        if config.enable_console_logging {
            subscriber
                .with(tracing_subscriber::fmt::layer().compact())
                .try_init()?;
        } else {
            subscriber.try_init()?;
        }

        tracing::info!(
            service_name = %config.service_name,
            endpoint = %endpoint,
            sampling_ratio = config.sampling_ratio,
            "OTLP telemetry initialized"
        );

        Ok(Some(tracer))
    } else {
        let subscriber = tracing_subscriber::registry().with(env_filter);

        if config.enable_console_logging {
            subscriber
                .with(tracing_subscriber::fmt::layer().compact())
                .try_init()?;
        } else {
            subscriber.try_init()?;
        }

        tracing::debug!("console telemetry initialized");
        Ok(None)
    }
}

// ============================================================================
// OTLP TRACER
// ============================================================================

fn sampler_for(ratio: f64) -> Sampler {
    if ratio >= 1.0 {
        Sampler::AlwaysOn
    } else if ratio <= 0.0 {
        Sampler::AlwaysOff
    } else {
        Sampler::TraceIdRatioBased(ratio)
    }
}

fn init_otlp_tracer(service_name: &str, endpoint: &str, sampling_ratio: f64) -> anyhow::Result<Tracer> {
    let tracer_provider = TracerProvider::builder()
        .with_batch_exporter(
            opentelemetry_otlp::new_exporter()
                .tonic()
                .with_endpoint(endpoint)
                .build_span_exporter()?,
            Tokio,
        )
        .with_config(
            sdktrace::Config::default()
                .with_sampler(sampler_for(sampling_ratio))
                .with_id_generator(RandomIdGenerator::default())
                .with_resource(Resource::new(vec![KeyValue::new(
                    "service.name",
                    service_name.to_string(),
                )])),
        )
        .build();

    let tracer = tracer_provider.tracer(service_name.to_string());
    global::set_tracer_provider(tracer_provider);

    Ok(tracer)
}

// ============================================================================
// SHUTDOWN
// ============================================================================

/// Flushes pending spans. Call before the process exits; the batch exporter
/// drops whatever it still holds otherwise.
pub fn shutdown_telemetry() {
    global::shutdown_tracer_provider();
    tracing::debug!("telemetry shut down");
}
