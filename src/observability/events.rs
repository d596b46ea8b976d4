//! Events the filter chain reports, and where they go.

use std::net::IpAddr;
use std::time::Duration;

use axum::http::{Method, StatusCode};

use crate::observability::metrics;

/// Something observable happened inside the chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainEvent {
    /// A filter answered the request itself.
    Rejected {
        filter: &'static str,
        reason: &'static str,
        client: IpAddr,
        status: StatusCode,
    },
    /// A hook returned an internal error or panicked.
    FilterFailed {
        filter: &'static str,
        error: String,
    },
    /// A request left the chain with a final response.
    Completed {
        method: Method,
        path: String,
        client: IpAddr,
        status: StatusCode,
        duration: Duration,
    },
}

/// Receiver of chain events.
pub trait ObservabilitySink: Send + Sync {
    fn record(&self, event: &ChainEvent);
}

/// Default sink: forwards events to the metrics facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct MetricsSink;

impl ObservabilitySink for MetricsSink {
    fn record(&self, event: &ChainEvent) {
        match event {
            ChainEvent::Rejected { filter, reason, .. } => metrics::record_rejection(*filter, *reason),
            ChainEvent::FilterFailed { filter, .. } => metrics::record_filter_failure(*filter),
            ChainEvent::Completed {
                method,
                status,
                duration,
                ..
            } => metrics::record_request(method.as_str(), status.as_u16(), *duration),
        }
    }
}
