//! Prometheus metrics for MedUX.

use std::net::SocketAddr;

use metrics::{counter, gauge};

/// Install the Prometheus exporter on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    let builder = metrics_exporter_prometheus::PrometheusBuilder::new().with_http_listener(addr);
    match builder.install() {
        Ok(()) => tracing::info!("Prometheus exporter listening on {}", addr),
        Err(e) => tracing::warn!("Failed to install Prometheus exporter: {}", e),
    }
}

/// Record a created record of the given model.
pub fn record_created(model: &'static str) {
    counter!("medux_records_created_total", "model" => model).increment(1);
}

/// Record an updated record of the given model.
pub fn record_updated(model: &'static str) {
    counter!("medux_records_updated_total", "model" => model).increment(1);
}

/// Record a deleted record of the given model.
pub fn record_deleted(model: &'static str) {
    counter!("medux_records_deleted_total", "model" => model).increment(1);
}

/// Record a login attempt; `outcome` is "success" or "failure".
pub fn login_attempt(outcome: &'static str) {
    counter!("medux_logins_total", "outcome" => outcome).increment(1);
}

/// Number of migrations applied by the last `migrate` run.
pub fn migrations_applied(count: usize) {
    gauge!("medux_migrations_applied").set(count as f64);
}
