// src/core/metrics.rs

//! Defines and registers Prometheus metrics for server monitoring.
//!
//! This module uses `lazy_static` to ensure that metrics are registered only once
//! globally for the entire application lifecycle.

use lazy_static::lazy_static;
use prometheus::{Counter, Gauge, TextEncoder, register_counter, register_gauge};

lazy_static! {
    // --- Server-wide Gauges ---
    /// The number of connections currently held in the registry.
    pub static ref CONNECTED_CLIENTS: Gauge =
        register_gauge!("idlereaper_connected_clients", "Number of currently registered connections.").unwrap();


    // --- Server-wide Counters ---
    /// The total number of connections accepted by the server since startup.
    pub static ref CONNECTIONS_RECEIVED_TOTAL: Counter =
        register_counter!("idlereaper_connections_received_total", "Total number of connections received.").unwrap();
    /// The total number of connections refused because `max_clients` was reached.
    pub static ref CONNECTIONS_REJECTED_TOTAL: Counter =
        register_counter!("idlereaper_connections_rejected_total", "Total number of connections refused at the client limit.").unwrap();
    /// The total number of sweeps that actually ran (throttled requests are not counted).
    pub static ref SWEEPS_TOTAL: Counter =
        register_counter!("idlereaper_sweeps_total", "Total number of zombie sweeps performed.").unwrap();
    /// The total number of idle connections closed by sweeps.
    pub static ref ZOMBIES_REAPED_TOTAL: Counter =
        register_counter!("idlereaper_zombies_reaped_total", "Total number of idle connections reaped.").unwrap();
    /// The total number of connections whose underlying resource failed to close.
    pub static ref CLOSE_FAILURES_TOTAL: Counter =
        register_counter!("idlereaper_close_failures_total", "Total number of failed resource closes.").unwrap();
    /// The total number of connections closed by explicit shutdown requests.
    pub static ref EXPLICIT_SHUTDOWNS_TOTAL: Counter =
        register_counter!("idlereaper_explicit_shutdowns_total", "Total number of explicitly shut down connections.").unwrap();
}

/// Gathers all registered metrics and encodes them in the Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder
        .encode_to_string(&metric_families)
        .unwrap_or_default()
}
