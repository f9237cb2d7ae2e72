//! Metrics collection and exposition.
//!
//! # Metrics
//! - `socks_connections_total` (counter): accepted client connections
//! - `socks_active_connections` (gauge): currently registered connections
//! - `socks_handshake_failures_total` (counter): sessions ended by a
//!   protocol or transport failure, labelled by reason
//! - `socks_upstream_connects_total` (counter): CONNECT outcomes,
//!   labelled succeeded/failed
//!
//! # Design Decisions
//! - Low-overhead updates through the `metrics` facade; without an
//!   installed recorder every call is a no-op
//! - Exposition is optional and Prometheus-compatible

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "metrics exporter listening"),
        Err(err) => tracing::error!(error = %err, "failed to install metrics exporter"),
    }
}

pub fn connection_opened() {
    counter!("socks_connections_total").increment(1);
    gauge!("socks_active_connections").increment(1.0);
}

pub fn connection_closed() {
    gauge!("socks_active_connections").decrement(1.0);
}

pub fn record_handshake_failure(reason: &'static str) {
    counter!("socks_handshake_failures_total", "reason" => reason).increment(1);
}

pub fn record_upstream_connect(outcome: &'static str) {
    counter!("socks_upstream_connects_total", "outcome" => outcome).increment(1);
}
