use opentelemetry::global;
use opentelemetry::metrics::{Counter, Histogram, Meter, MeterProvider};
use opentelemetry::trace::TracerProvider as _;
use opentelemetry::KeyValue;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::metrics::{PeriodicReader, SdkMeterProvider};
use opentelemetry_sdk::trace::TracerProvider;
use opentelemetry_sdk::{runtime, Resource};
use std::sync::OnceLock;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::error::{Result, TwrError};

const SERVICE_NAME: &str = "twr";

static METRICS: OnceLock<RelayMetrics> = OnceLock::new();

/// Metrics for the token refresh relay
pub struct RelayMetrics {
    // Refresh pipeline counters
    pub refresh_requests: Counter<u64>,
    pub refresh_success: Counter<u64>,
    pub generation_failures: Counter<u64>,
    pub update_failures: Counter<u64>,

    // Latency histograms
    pub generation_seconds: Histogram<f64>,
    pub update_seconds: Histogram<f64>,
}

impl RelayMetrics {
    fn new(meter: &Meter) -> Self {
        Self {
            refresh_requests: meter
                .u64_counter("twr_refresh_requests_total")
                .with_description("Total number of refresh requests received")
                .build(),
            refresh_success: meter
                .u64_counter("twr_refresh_success_total")
                .with_description("Total number of successful token refreshes")
                .build(),
            generation_failures: meter
                .u64_counter("twr_generation_failures_total")
                .with_description("Total number of failed token generations")
                .build(),
            update_failures: meter
                .u64_counter("twr_update_failures_total")
                .with_description("Total number of failed Lavalink updates")
                .build(),
            generation_seconds: meter
                .f64_histogram("twr_generation_seconds")
                .with_description("Time spent generating a token pair")
                .build(),
            update_seconds: meter
                .f64_histogram("twr_update_seconds")
                .with_description("Time spent pushing tokens to Lavalink")
                .build(),
        }
    }
}

pub fn get_metrics() -> Option<&'static RelayMetrics> {
    METRICS.get()
}

pub struct TelemetryConfig {
    pub otlp_endpoint: Option<String>,
    pub log_filter: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            otlp_endpoint: None,
            log_filter: "info".to_string(),
        }
    }
}

fn create_resource() -> Resource {
    Resource::new(vec![
        KeyValue::new(
            opentelemetry_semantic_conventions::attribute::SERVICE_NAME,
            SERVICE_NAME,
        ),
        KeyValue::new(
            opentelemetry_semantic_conventions::attribute::SERVICE_VERSION,
            env!("CARGO_PKG_VERSION"),
        ),
    ])
}

fn init_tracer_provider(
    endpoint: &str,
) -> std::result::Result<TracerProvider, opentelemetry::trace::TraceError> {
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .with_timeout(Duration::from_secs(3))
        .build()?;

    let provider = TracerProvider::builder()
        .with_resource(create_resource())
        .with_batch_exporter(exporter, runtime::Tokio)
        .build();

    Ok(provider)
}

fn init_meter_provider(
    endpoint: &str,
) -> std::result::Result<SdkMeterProvider, opentelemetry_sdk::metrics::MetricError> {
    let exporter = opentelemetry_otlp::MetricExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .with_timeout(Duration::from_secs(3))
        .build()?;

    let reader = PeriodicReader::builder(exporter, runtime::Tokio)
        .with_interval(Duration::from_secs(10))
        .build();

    let provider = SdkMeterProvider::builder()
        .with_resource(create_resource())
        .with_reader(reader)
        .build();

    Ok(provider)
}

/// Initialize tracing and (optionally) OTLP export.
///
/// Must be called from within the tokio runtime: the batch exporters spawn
/// their background tasks on the current runtime.
pub fn init_telemetry(config: TelemetryConfig) -> Result<()> {
    let env_filter = EnvFilter::new(&config.log_filter);

    match &config.otlp_endpoint {
        Some(endpoint) => {
            let tracer_provider = init_tracer_provider(endpoint)
                .map_err(|e| TwrError::Telemetry(format!("Failed to init tracer: {}", e)))?;
            let meter_provider = init_meter_provider(endpoint)
                .map_err(|e| TwrError::Telemetry(format!("Failed to init meter: {}", e)))?;

            // Set global providers
            global::set_tracer_provider(tracer_provider.clone());
            global::set_meter_provider(meter_provider.clone());

            let tracer = tracer_provider.tracer(SERVICE_NAME);

            let meter = meter_provider.meter(SERVICE_NAME);
            let _ = METRICS.set(RelayMetrics::new(&meter));

            let otel_layer = tracing_opentelemetry::layer().with_tracer(tracer);

            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer())
                .with(otel_layer)
                .init();

            info!(
                endpoint = %endpoint,
                "OpenTelemetry initialized with OTLP export"
            );
        }
        None => {
            // Console logging only; metrics still recorded in-process
            let meter_provider = SdkMeterProvider::builder()
                .with_resource(create_resource())
                .build();

            global::set_meter_provider(meter_provider.clone());

            let meter = meter_provider.meter(SERVICE_NAME);
            let _ = METRICS.set(RelayMetrics::new(&meter));

            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer())
                .init();

            info!("Telemetry initialized without OTLP export");
        }
    }

    Ok(())
}

pub fn shutdown_telemetry() {
    global::shutdown_tracer_provider();
}
