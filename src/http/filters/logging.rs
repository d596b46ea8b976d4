use axum::response::Response;

use crate::config::FailureMode;
use crate::http::chain::{Action, Filter, RequestContext};
use crate::http::error::FilterError;

/// Request and response log lines.
pub struct LoggingFilter {
    failure_mode: FailureMode,
}

impl LoggingFilter {
    pub fn new(failure_mode: FailureMode) -> Self {
        Self { failure_mode }
    }
}

impl Filter for LoggingFilter {
    fn name(&self) -> &'static str {
        "logging"
    }

    fn failure_mode(&self) -> FailureMode {
        self.failure_mode
    }

    fn on_request(&self, ctx: &mut RequestContext) -> Result<Action, FilterError> {
        tracing::debug!(
            request_id = ctx.request_id.as_deref().unwrap_or("-"),
            client = %ctx.client,
            method = %ctx.method,
            path = %ctx.path(),
            "Request received"
        );
        Ok(Action::Forward)
    }

    fn on_response(&self, ctx: &RequestContext, response: &mut Response) -> Result<(), FilterError> {
        let status = response.status();
        let elapsed_ms = ctx.started_at.elapsed().as_millis() as u64;
        let request_id = ctx.request_id.as_deref().unwrap_or("-");

        match ctx.rejected_by {
            Some(filter) => tracing::warn!(
                request_id,
                client = %ctx.client,
                method = %ctx.method,
                path = %ctx.path(),
                status = status.as_u16(),
                filter,
                elapsed_ms,
                "Request rejected"
            ),
            None => tracing::info!(
                request_id,
                client = %ctx.client,
                method = %ctx.method,
                path = %ctx.path(),
                status = status.as_u16(),
                elapsed_ms,
                "Request completed"
            ),
        }
        Ok(())
    }
}
