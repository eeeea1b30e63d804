//! `tracing` setup for the server.
//!
//! Logs always go to stdout through a `fmt` layer filtered by `RUST_LOG` (default `info`).
//! With the `telemetry` feature and any `OTEL_EXPORTER_OTLP_*` variable set, spans and
//! metrics are also exported over OTLP.

use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, HttpMakeClassifier, TraceLayer};
use tracing::Level;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[cfg(feature = "telemetry")]
use opentelemetry::{KeyValue, global, trace::TracerProvider as _};
#[cfg(feature = "telemetry")]
use opentelemetry_sdk::{
    Resource,
    metrics::{MeterProviderBuilder, PeriodicReader, SdkMeterProvider},
    trace::{RandomIdGenerator, Sampler, SdkTracerProvider},
};
#[cfg(feature = "telemetry")]
use opentelemetry_semantic_conventions::{
    SCHEMA_URL,
    attribute::{DEPLOYMENT_ENVIRONMENT_NAME, SERVICE_VERSION},
};

/// OTLP transport.
#[cfg(feature = "telemetry")]
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TelemetryProtocol {
    HTTP,
    GRPC,
}

#[cfg(feature = "telemetry")]
impl TelemetryProtocol {
    /// `None` unless some `OTEL_EXPORTER_OTLP_*` variable is present.
    fn from_env() -> Option<Self> {
        let is_enabled = ["ENDPOINT", "HEADERS", "PROTOCOL"]
            .iter()
            .any(|suffix| std::env::var(format!("OTEL_EXPORTER_OTLP_{suffix}")).is_ok());
        if !is_enabled {
            return None;
        }
        let protocol = match std::env::var("OTEL_EXPORTER_OTLP_PROTOCOL").as_deref() {
            Ok("grpc") => TelemetryProtocol::GRPC,
            _ => TelemetryProtocol::HTTP,
        };
        Some(protocol)
    }
}

/// Builder and shutdown guard for the global subscriber.
///
/// ```ignore
/// let telemetry = Telemetry::new()
///     .with_name(env!("CARGO_PKG_NAME"))
///     .with_version(env!("CARGO_PKG_VERSION"))
///     .register();
/// let router = router.layer(telemetry.http_tracing());
/// ```
pub struct Telemetry {
    name: &'static str,
    version: &'static str,
    #[cfg(feature = "telemetry")]
    tracer_provider: Option<SdkTracerProvider>,
    #[cfg(feature = "telemetry")]
    meter_provider: Option<SdkMeterProvider>,
}

impl Default for Telemetry {
    fn default() -> Self {
        Self::new()
    }
}

impl Telemetry {
    pub fn new() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
            #[cfg(feature = "telemetry")]
            tracer_provider: None,
            #[cfg(feature = "telemetry")]
            meter_provider: None,
        }
    }

    pub fn with_name(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    pub fn with_version(mut self, version: &'static str) -> Self {
        self.version = version;
        self
    }

    /// Installs the global subscriber. Call once per process.
    pub fn register(self) -> Self {
        #[cfg(feature = "telemetry")]
        if let Some(protocol) = TelemetryProtocol::from_env() {
            return self.register_otel(protocol);
        }

        tracing_subscriber::registry()
            .with(env_filter())
            .with(tracing_subscriber::fmt::layer())
            .init();
        tracing::info!(service = self.name, version = self.version, "Logging to stdout");
        self
    }

    #[cfg(feature = "telemetry")]
    fn register_otel(mut self, protocol: TelemetryProtocol) -> Self {
        use tracing_opentelemetry::{MetricsLayer, OpenTelemetryLayer};

        let resource = self.resource();
        let tracer_provider = match init_tracer_provider(protocol, resource.clone()) {
            Ok(provider) => provider,
            Err(err) => {
                eprintln!("Failed to build OTLP span exporter: {err}");
                return self.register_without_otel();
            }
        };
        let meter_provider = match init_meter_provider(protocol, resource) {
            Ok(provider) => provider,
            Err(err) => {
                eprintln!("Failed to build OTLP metric exporter: {err}");
                return self.register_without_otel();
            }
        };
        let tracer = tracer_provider.tracer("smm-panel");

        tracing_subscriber::registry()
            .with(env_filter())
            .with(tracing_subscriber::fmt::layer())
            .with(MetricsLayer::new(meter_provider.clone()))
            .with(OpenTelemetryLayer::new(tracer))
            .init();

        tracing::info!(?protocol, "OpenTelemetry tracing and metrics export enabled");
        self.tracer_provider = Some(tracer_provider);
        self.meter_provider = Some(meter_provider);
        self
    }

    #[cfg(feature = "telemetry")]
    fn register_without_otel(self) -> Self {
        tracing_subscriber::registry()
            .with(env_filter())
            .with(tracing_subscriber::fmt::layer())
            .init();
        self
    }

    #[cfg(feature = "telemetry")]
    fn resource(&self) -> Resource {
        let deployment_env =
            std::env::var("DEPLOYMENT_ENV").unwrap_or_else(|_| "develop".to_string());
        Resource::builder()
            .with_service_name(self.name)
            .with_schema_url(
                [
                    KeyValue::new(SERVICE_VERSION, self.version),
                    KeyValue::new(DEPLOYMENT_ENVIRONMENT_NAME, deployment_env),
                ],
                SCHEMA_URL,
            )
            .build()
    }

    /// Request spans for the router: one INFO span per request, latency on response.
    pub fn http_tracing(&self) -> TraceLayer<HttpMakeClassifier> {
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO))
    }
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

#[cfg(feature = "telemetry")]
fn init_meter_provider(
    protocol: TelemetryProtocol,
    resource: Resource,
) -> Result<SdkMeterProvider, opentelemetry_otlp::ExporterBuildError> {
    let exporter = opentelemetry_otlp::MetricExporter::builder();
    let exporter = match protocol {
        TelemetryProtocol::HTTP => exporter
            .with_http()
            .with_temporality(opentelemetry_sdk::metrics::Temporality::default())
            .build()?,
        TelemetryProtocol::GRPC => exporter
            .with_tonic()
            .with_temporality(opentelemetry_sdk::metrics::Temporality::default())
            .build()?,
    };

    let reader = PeriodicReader::builder(exporter)
        .with_interval(std::time::Duration::from_secs(30))
        .build();
    let stdout_reader =
        PeriodicReader::builder(opentelemetry_stdout::MetricExporter::default()).build();

    let meter_provider = MeterProviderBuilder::default()
        .with_resource(resource)
        .with_reader(reader)
        .with_reader(stdout_reader)
        .build();
    global::set_meter_provider(meter_provider.clone());
    Ok(meter_provider)
}

#[cfg(feature = "telemetry")]
fn init_tracer_provider(
    protocol: TelemetryProtocol,
    resource: Resource,
) -> Result<SdkTracerProvider, opentelemetry_otlp::ExporterBuildError> {
    let exporter = opentelemetry_otlp::SpanExporter::builder();
    let exporter = match protocol {
        TelemetryProtocol::HTTP => exporter.with_http().build()?,
        TelemetryProtocol::GRPC => exporter.with_tonic().build()?,
    };
    Ok(SdkTracerProvider::builder()
        .with_sampler(Sampler::ParentBased(Box::new(Sampler::TraceIdRatioBased(
            1.0,
        ))))
        .with_id_generator(RandomIdGenerator::default())
        .with_resource(resource)
        .with_batch_exporter(exporter)
        .build())
}

#[cfg(feature = "telemetry")]
impl Drop for Telemetry {
    fn drop(&mut self) {
        if let Some(tracer_provider) = self.tracer_provider.as_ref() {
            if let Err(err) = tracer_provider.shutdown() {
                eprintln!("{err:?}");
            }
        }
        if let Some(meter_provider) = self.meter_provider.as_ref() {
            if let Err(err) = meter_provider.shutdown() {
                eprintln!("{err:?}");
            }
        }
    }
}
