use anyhow::Result;
use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;

static PROMETHEUS: OnceLock<PrometheusHandle> = OnceLock::new();

pub fn describe() {
    describe_histogram!(
        "arena_db_query_latency_ms",
        "SQLite query latency in milliseconds, by operation."
    );
    describe_counter!(
        "arena_db_query_errors_total",
        "Number of failed SQLite operations."
    );
    describe_counter!(
        "arena_gateway_requests_total",
        "Number of market-data gateway requests, by endpoint and status."
    );
    describe_histogram!(
        "arena_gateway_latency_ms",
        "Market-data gateway request latency in milliseconds."
    );
    describe_counter!(
        "arena_gateway_errors_total",
        "Number of gateway errors, by endpoint and error kind."
    );
    describe_counter!(
        "arena_fetch_failures_total",
        "Number of fan-out calls that failed or timed out."
    );
    describe_counter!(
        "arena_tracing_error_events",
        "Number of ERROR-level log events."
    );
}

/// Install the global Prometheus recorder and remember its handle for the
/// `/metrics` endpoint. Idempotent so tests can call it repeatedly.
pub fn install_recorder() -> Result<()> {
    if PROMETHEUS.get().is_some() {
        return Ok(());
    }
    let handle = PrometheusBuilder::new().install_recorder()?;
    let _ = PROMETHEUS.set(handle);
    describe();
    Ok(())
}

pub fn render() -> String {
    PROMETHEUS.get().map(PrometheusHandle::render).unwrap_or_default()
}
