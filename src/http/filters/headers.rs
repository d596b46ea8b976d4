use axum::response::Response;
use std::sync::Arc;

use crate::config::FailureMode;
use crate::http::chain::{Filter, RequestContext};
use crate::http::error::FilterError;
use crate::security::SecurityHeaders;

/// Adds the hardening headers to every response that lacks them.
pub struct SecurityHeadersFilter {
    enabled: bool,
    headers: Arc<SecurityHeaders>,
    failure_mode: FailureMode,
}

impl SecurityHeadersFilter {
    pub fn new(enabled: bool, headers: Arc<SecurityHeaders>, failure_mode: FailureMode) -> Self {
        Self {
            enabled,
            headers,
            failure_mode,
        }
    }
}

impl Filter for SecurityHeadersFilter {
    fn name(&self) -> &'static str {
        "security-headers"
    }

    fn failure_mode(&self) -> FailureMode {
        self.failure_mode
    }

    fn on_response(&self, _ctx: &RequestContext, response: &mut Response) -> Result<(), FilterError> {
        if self.enabled {
            self.headers.apply(response.headers_mut());
        }
        Ok(())
    }
}
