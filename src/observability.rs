use std::net::SocketAddr;

use crate::model::Priority;

// ── Allocation metrics ──────────────────────────────────────────

/// Counter: allocation requests. Labels: priority, status.
pub const ALLOCATIONS_TOTAL: &str = "slotbook_allocations_total";

/// Histogram: load-compute-save latency in seconds. Labels: priority.
pub const ALLOCATION_DURATION_SECONDS: &str = "slotbook_allocation_duration_seconds";

/// Counter: saves rejected because the stored version moved. Labels: priority.
pub const STORE_CONFLICTS_TOTAL: &str = "slotbook_store_conflicts_total";

// ── Storage metrics ─────────────────────────────────────────────

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "slotbook_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "slotbook_wal_flush_batch_size";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) {
    let Some(port) = port else { return };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .expect("failed to install Prometheus metrics exporter");
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
}

/// Record one finished allocation. `status` is "ok" or an error kind.
pub fn record_allocation(priority: Priority, status: &'static str, elapsed: std::time::Duration) {
    metrics::counter!(ALLOCATIONS_TOTAL, "priority" => priority.label(), "status" => status)
        .increment(1);
    metrics::histogram!(ALLOCATION_DURATION_SECONDS, "priority" => priority.label())
        .record(elapsed.as_secs_f64());
}
