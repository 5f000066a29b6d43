//! Metrics collection and exposition.
//!
//! # Metrics
//! - `portgate_connections_accepted_total` (counter)
//! - `portgate_accept_errors_total` (counter)
//! - `portgate_active_connections` (gauge): connections being handled
//! - `portgate_handler_errors_total` (counter): by `kind` (`idle_timeout`, `other`)
//! - `portgate_idle_timeouts_total` (counter): connections dropped for inactivity
//! - `portgate_forced_closes_total` (counter): connections cut at the drain deadline
//! - `portgate_dial_total` (counter): by `outcome` (`ok`, `error`)
//!
//! Recording is a no-op until [`init_metrics`] installs the exporter.

use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus exporter with an HTTP scrape endpoint on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint started");
    Ok(())
}

pub fn record_accepted() {
    metrics::counter!("portgate_connections_accepted_total").increment(1);
}

pub fn record_accept_error() {
    metrics::counter!("portgate_accept_errors_total").increment(1);
}

pub fn connection_opened() {
    metrics::gauge!("portgate_active_connections").increment(1.0);
}

pub fn connection_closed() {
    metrics::gauge!("portgate_active_connections").decrement(1.0);
}

pub fn record_handler_error(idle_timeout: bool) {
    let kind = if idle_timeout { "idle_timeout" } else { "other" };
    metrics::counter!("portgate_handler_errors_total", "kind" => kind).increment(1);
    if idle_timeout {
        metrics::counter!("portgate_idle_timeouts_total").increment(1);
    }
}

pub fn record_forced_close() {
    metrics::counter!("portgate_forced_closes_total").increment(1);
}

pub fn record_dial(ok: bool) {
    let outcome = if ok { "ok" } else { "error" };
    metrics::counter!("portgate_dial_total", "outcome" => outcome).increment(1);
}
