//! Metrics collection and exposition.
//!
//! # Metrics
//! - `guard_requests_total` (counter): requests by method, status
//! - `guard_request_duration_seconds` (histogram): time spent in the chain and handler
//! - `guard_rejections_total` (counter): short-circuits by filter, reason
//! - `guard_filter_failures_total` (counter): internal filter errors by filter
//! - `guard_blocked_clients` (gauge): clients currently blocked by the DDoS guard
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   exporter every call is a no-op, which keeps tests free of global state
//! - Histogram buckets tuned for typical web latencies

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder};

const DURATION_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .upkeep_timeout(Duration::from_secs(5 * 60))
        .set_buckets_for_metric(
            Matcher::Full("guard_request_duration_seconds".to_string()),
            DURATION_BUCKETS,
        )?
        .install()?;

    describe_metrics();
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

fn describe_metrics() {
    describe_counter!("guard_requests_total", "Requests handled, by method and status");
    describe_histogram!(
        "guard_request_duration_seconds",
        "Time from chain entry to the final response"
    );
    describe_counter!(
        "guard_rejections_total",
        "Requests short-circuited by a filter, by filter and reason"
    );
    describe_counter!(
        "guard_filter_failures_total",
        "Internal filter errors, by filter"
    );
    describe_gauge!("guard_blocked_clients", "Clients currently blocked");
}

pub fn record_request(method: &str, status: u16, duration: Duration) {
    counter!(
        "guard_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("guard_request_duration_seconds").record(duration.as_secs_f64());
}

pub fn record_rejection(filter: &'static str, reason: &'static str) {
    counter!("guard_rejections_total", "filter" => filter, "reason" => reason).increment(1);
}

pub fn record_filter_failure(filter: &'static str) {
    counter!("guard_filter_failures_total", "filter" => filter).increment(1);
}

pub fn set_blocked_clients(count: usize) {
    gauge!("guard_blocked_clients").set(count as f64);
}
