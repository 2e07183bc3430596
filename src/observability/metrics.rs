//! Metrics collection and exposition.
//!
//! # Metrics
//! - `sync_passes_total` (counter): reconciliation passes by outcome
//! - `sync_pass_duration_seconds` (histogram): pass latency
//! - `sync_cached_services` (gauge): services currently configured
//! - `sync_artifact_operations_total` (counter): writes/deletes by outcome
//! - `sync_reloads_total` (counter): validate+apply runs by outcome
//! - `sync_registry_fetch_errors_total` (counter): failed snapshot fetches
//!
//! # Design Decisions
//! - Recording is a no-op until `init_metrics` installs the exporter
//! - Prometheus scrape endpoint, off by default

use std::net::SocketAddr;
use std::time::Duration;
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its HTTP listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint started");
    Ok(())
}

fn outcome(ok: bool) -> &'static str {
    if ok {
        "success"
    } else {
        "failure"
    }
}

pub fn record_pass(duration: Duration, clean: bool) {
    metrics::counter!("sync_passes_total", "outcome" => outcome(clean)).increment(1);
    metrics::histogram!("sync_pass_duration_seconds").record(duration.as_secs_f64());
}

pub fn record_cached_services(count: usize) {
    metrics::gauge!("sync_cached_services").set(count as f64);
}

/// `op` is `"write"` or `"delete"`.
pub fn record_artifact_op(op: &'static str, ok: bool) {
    metrics::counter!("sync_artifact_operations_total", "op" => op, "outcome" => outcome(ok))
        .increment(1);
}

pub fn record_reload(ok: bool) {
    metrics::counter!("sync_reloads_total", "outcome" => outcome(ok)).increment(1);
}

pub fn record_registry_fetch_error() {
    metrics::counter!("sync_registry_fetch_errors_total").increment(1);
}
