//! Prometheus exporter setup for the router's `metrics` facade calls.

use anyhow::Result;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Query latency buckets in seconds. Most statements land well under 100ms;
/// the tail covers ping timeouts and cross-region stores.
const QUERY_LATENCY_BUCKETS: &[f64] = &[0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 5.0];

fn builder() -> Result<PrometheusBuilder> {
    Ok(PrometheusBuilder::new().set_buckets(QUERY_LATENCY_BUCKETS)?)
}

/// Install the global recorder and register metric descriptions.
/// Call once at startup, before the router handles any statement.
pub fn install() -> Result<PrometheusHandle> {
    let handle = builder()?.install_recorder()?;
    dbrouter_core::metrics::describe_metrics();
    Ok(handle)
}

/// A handle backed by a recorder that is not installed globally.
#[cfg(test)]
pub fn detached_handle() -> PrometheusHandle {
    PrometheusBuilder::new().build_recorder().handle()
}
