//! Router metrics.
//!
//! - `dbrouter_queries_total{kind,provider,outcome}` - statements routed
//! - `dbrouter_query_duration_seconds{kind,provider}` - routed statement latency
//! - `dbrouter_failovers_total{from,to}` - master changes
//! - `dbrouter_replication_total{origin,outcome}` - replication attempts
//!
//! Only the `metrics` facade is used here; installing a recorder (and an
//! exporter) is up to the binary. Without one, every call is a no-op.

use metrics::{counter, describe_counter, describe_histogram, histogram};
use std::time::Duration;

/// Register metric descriptions. Call once after installing a recorder.
pub fn describe_metrics() {
    describe_counter!("dbrouter_queries_total", "Statements routed, by kind, provider and outcome");
    describe_histogram!(
        "dbrouter_query_duration_seconds",
        "Latency of routed statements in seconds"
    );
    describe_counter!("dbrouter_failovers_total", "Master changes performed by the health monitor");
    describe_counter!(
        "dbrouter_replication_total",
        "Replication attempts to slaves, by origin and outcome"
    );
}

/// Labels: kind = "read" | "write", outcome = "ok" | "error"
pub(crate) fn record_query(kind: &str, provider: &str, ok: bool, elapsed: Duration) {
    let labels = [("kind", kind.to_string()), ("provider", provider.to_string())];
    histogram!("dbrouter_query_duration_seconds", &labels).record(elapsed.as_secs_f64());

    let labels = [
        ("kind", kind.to_string()),
        ("provider", provider.to_string()),
        ("outcome", if ok { "ok" } else { "error" }.to_string()),
    ];
    counter!("dbrouter_queries_total", &labels).increment(1);
}

pub(crate) fn record_failover(from: &str, to: &str) {
    let labels = [("from", from.to_string()), ("to", to.to_string())];
    counter!("dbrouter_failovers_total", &labels).increment(1);
}

/// Labels: origin = "immediate" | "queue", outcome = "success" | "failed" | "exhausted"
pub(crate) fn record_replication(origin: &str, outcome: &str) {
    let labels = [("origin", origin.to_string()), ("outcome", outcome.to_string())];
    counter!("dbrouter_replication_total", &labels).increment(1);
}
