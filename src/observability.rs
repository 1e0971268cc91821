use std::net::SocketAddr;

use axum::http::Method;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: HTTP requests served. Labels: method, status.
pub const HTTP_REQUESTS_TOTAL: &str = "innkeep_http_requests_total";

/// Histogram: HTTP request latency in seconds. Labels: method.
pub const HTTP_REQUEST_DURATION_SECONDS: &str = "innkeep_http_request_duration_seconds";

/// Counter: store calls. Labels: op, status (ok, error, timeout).
pub const STORE_CALLS_TOTAL: &str = "innkeep_store_calls_total";

/// Histogram: store call latency in seconds. Labels: op.
pub const STORE_CALL_DURATION_SECONDS: &str = "innkeep_store_call_duration_seconds";

/// Counter: reservations booked by guests.
pub const RESERVATIONS_CREATED_TOTAL: &str = "innkeep_reservations_created_total";

/// Counter: owner blocks removed through the calendar.
pub const CALENDAR_BLOCKS_REMOVED_TOTAL: &str = "innkeep_calendar_blocks_removed_total";

/// Counter: owner blocks added through the calendar.
pub const CALENDAR_BLOCKS_ADDED_TOTAL: &str = "innkeep_calendar_blocks_added_total";

/// Counter: calendar items that failed to apply.
pub const CALENDAR_EDIT_FAILURES_TOTAL: &str = "innkeep_calendar_edit_failures_total";

/// Counter: rooms whose calendar removals were skipped as stale.
pub const CALENDAR_STALE_ROOMS_TOTAL: &str = "innkeep_calendar_stale_rooms_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: live sessions.
pub const SESSIONS_ACTIVE: &str = "innkeep_sessions_active";

/// Counter: requests turned away because the concurrency limit was reached.
pub const REQUESTS_REJECTED_TOTAL: &str = "innkeep_requests_rejected_total";

/// Counter: failed administrator logins.
pub const AUTH_FAILURES_TOTAL: &str = "innkeep_auth_failures_total";

/// Counter: CSRF token mismatches.
pub const CSRF_FAILURES_TOTAL: &str = "innkeep_csrf_failures_total";

/// Counter: mail messages handed to the transport. Labels: status.
pub const MAIL_SENT_TOTAL: &str = "innkeep_mail_sent_total";

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "innkeep_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "innkeep_wal_flush_batch_size";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}

/// Map an HTTP method to a short label for metrics.
pub fn method_label(method: &Method) -> &'static str {
    match *method {
        Method::GET => "GET",
        Method::POST => "POST",
        Method::HEAD => "HEAD",
        _ => "OTHER",
    }
}
