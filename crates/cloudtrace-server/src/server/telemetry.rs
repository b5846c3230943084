//! # Telemetry
//!
//! Structured logging is always on: a `tracing_subscriber` registry filtered
//! by `RUST_LOG` (default `info`) prints events to the console.
//!
//! ## Feature matrix
//!
//! - `metrics`: Enables OpenTelemetry counters for requests, log writes,
//!   write retries and health checks.
//! - `stdout`: Exports those counters to stdout every 5 seconds.
//!
//! ## Feature constraints
//!
//! - `stdout` requires `metrics`.
//!
//! ## Example usage
//!
//! ```bash
//! RUST_LOG=cloudtrace_server=debug cargo run --features metrics,stdout
//! ```
//!
//! Without `metrics` every recording function below compiles to a no-op.

// Disallow using `stdout` without `metrics`
#[cfg(all(feature = "stdout", not(feature = "metrics")))]
compile_error!("The 'stdout' feature requires 'metrics' to be enabled.");

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[cfg(feature = "metrics")]
use opentelemetry::{
    InstrumentationScope, KeyValue,
    metrics::{Counter, Meter},
};
#[cfg(feature = "metrics")]
use opentelemetry_sdk::{Resource, metrics as sdkmetrics};
#[cfg(feature = "metrics")]
use opentelemetry_semantic_conventions as semvcns;
#[cfg(feature = "metrics")]
use std::sync::OnceLock;

pub struct TelemetryProviders {
    #[cfg(feature = "metrics")]
    pub meter_provider: sdkmetrics::SdkMeterProvider,
}

impl TelemetryProviders {
    /// Flushes and shuts down exporters. Call once, after the server stops.
    pub fn shutdown(self) {
        #[cfg(feature = "metrics")]
        {
            if let Err(err) = self.meter_provider.force_flush() {
                eprintln!("Error flushing metrics: {err:#?}");
            }
            if let Err(err) = self.meter_provider.shutdown() {
                eprintln!("Error shutting down meter: {err:#?}");
            }
        }
    }
}

pub fn init_telemetry() -> anyhow::Result<TelemetryProviders> {
    #[cfg(feature = "metrics")]
    let meter_provider = init_metrics();

    let registry = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_thread_ids(true)
                .with_line_number(true)
                .with_target(false)
                .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
                .with_file(true)
                .pretty(),
        );

    registry.try_init()?;

    #[cfg(feature = "metrics")]
    {
        opentelemetry::global::set_meter_provider(meter_provider.clone());
        let scope = InstrumentationScope::builder("cloudtrace")
            .with_version(env!("CARGO_PKG_VERSION"))
            .with_schema_url(semvcns::SCHEMA_URL)
            .build();
        init_metric_handles(opentelemetry::global::meter_with_scope(scope));
    }

    Ok(TelemetryProviders {
        #[cfg(feature = "metrics")]
        meter_provider,
    })
}

#[cfg(feature = "metrics")]
fn resource() -> Resource {
    Resource::builder()
        .with_service_name("cloudtrace")
        .with_schema_url(
            [KeyValue::new(
                semvcns::resource::SERVICE_VERSION,
                env!("CARGO_PKG_VERSION"),
            )],
            semvcns::SCHEMA_URL,
        )
        .build()
}

#[cfg(feature = "metrics")]
fn init_metrics() -> sdkmetrics::SdkMeterProvider {
    let builder = sdkmetrics::SdkMeterProvider::builder().with_resource(resource());

    #[cfg(feature = "stdout")]
    let builder = {
        use opentelemetry_stdout::MetricExporter;
        let exporter = MetricExporter::default();
        let reader = sdkmetrics::PeriodicReader::builder(exporter)
            .with_interval(std::time::Duration::from_secs(5))
            .build();

        builder.with_reader(reader)
    };

    builder.build()
}

// Metric handles - only compiled when metrics feature is enabled
#[cfg(feature = "metrics")]
static REQUESTS: OnceLock<Counter<u64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static DB_WRITES: OnceLock<Counter<u64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static DB_WRITE_RETRIES: OnceLock<Counter<u64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static HEALTH_CHECKS: OnceLock<Counter<u64>> = OnceLock::new();

#[cfg(feature = "metrics")]
fn init_metric_handles(meter: Meter) {
    let _ = REQUESTS.set(
        meter
            .u64_counter("requests")
            .with_description("HTTP requests by route")
            .build(),
    );

    let _ = DB_WRITES.set(
        meter
            .u64_counter("db_writes")
            .with_description("Resolved log writes by outcome")
            .build(),
    );

    let _ = DB_WRITE_RETRIES.set(
        meter
            .u64_counter("db_write_retries")
            .with_description("Transient insert failures that were retried")
            .build(),
    );

    let _ = HEALTH_CHECKS.set(
        meter
            .u64_counter("health_checks")
            .with_description("Liveness probes by database status")
            .build(),
    );
}

// Convenience functions that compile to no-ops when metrics are disabled
#[cfg(feature = "metrics")]
pub fn increment_requests(route: &'static str) {
    if let Some(counter) = REQUESTS.get() {
        counter.add(1, &[KeyValue::new("route", route)]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn increment_requests(_route: &'static str) {}

#[cfg(feature = "metrics")]
pub fn record_write_outcome(outcome: &'static str) {
    if let Some(counter) = DB_WRITES.get() {
        counter.add(1, &[KeyValue::new("outcome", outcome)]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn record_write_outcome(_outcome: &'static str) {}

#[cfg(feature = "metrics")]
pub fn increment_write_retries() {
    if let Some(counter) = DB_WRITE_RETRIES.get() {
        counter.add(1, &[]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn increment_write_retries() {}

#[cfg(feature = "metrics")]
pub fn record_health_check(healthy: bool) {
    if let Some(counter) = HEALTH_CHECKS.get() {
        let database = if healthy { "connected" } else { "disconnected" };
        counter.add(1, &[KeyValue::new("database", database)]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn record_health_check(_healthy: bool) {}
