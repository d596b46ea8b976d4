use axum::response::Response;
use std::sync::Arc;
use std::time::Duration;

use crate::config::FailureMode;
use crate::http::chain::{Filter, RequestContext};
use crate::http::error::FilterError;
use crate::observability::{ChainEvent, ObservabilitySink};

const SLOW_REQUEST: Duration = Duration::from_secs(1);

/// Reports every request that made it past the guards.
pub struct MonitoringFilter {
    sink: Arc<dyn ObservabilitySink>,
    failure_mode: FailureMode,
}

impl MonitoringFilter {
    pub fn new(sink: Arc<dyn ObservabilitySink>, failure_mode: FailureMode) -> Self {
        Self { sink, failure_mode }
    }
}

impl Filter for MonitoringFilter {
    fn name(&self) -> &'static str {
        "monitoring"
    }

    fn failure_mode(&self) -> FailureMode {
        self.failure_mode
    }

    fn on_response(&self, ctx: &RequestContext, response: &mut Response) -> Result<(), FilterError> {
        let duration = ctx.started_at.elapsed();
        if duration >= SLOW_REQUEST {
            tracing::warn!(
                path = %ctx.path(),
                elapsed_ms = duration.as_millis() as u64,
                "Slow request"
            );
        }

        self.sink.record(&ChainEvent::Completed {
            method: ctx.method.clone(),
            path: ctx.path().to_string(),
            client: ctx.client.ip(),
            status: response.status(),
            duration,
        });
        Ok(())
    }
}
