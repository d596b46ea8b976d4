use std::sync::Arc;

use crate::config::FailureMode;
use crate::http::chain::{Action, Filter, RequestContext};
use crate::http::error::FilterError;
use crate::security::{RateDecision, RateLimiter};

pub struct RateLimitFilter {
    limiter: Arc<RateLimiter>,
    failure_mode: FailureMode,
}

impl RateLimitFilter {
    pub fn new(limiter: Arc<RateLimiter>, failure_mode: FailureMode) -> Self {
        Self {
            limiter,
            failure_mode,
        }
    }
}

impl Filter for RateLimitFilter {
    fn name(&self) -> &'static str {
        "rate-limiter"
    }

    fn failure_mode(&self) -> FailureMode {
        self.failure_mode
    }

    fn on_request(&self, ctx: &mut RequestContext) -> Result<Action, FilterError> {
        match self.limiter.check(&ctx.client, ctx.path()) {
            RateDecision::Allow => Ok(Action::Forward),
            RateDecision::Reject { retry_after, window } => {
                tracing::warn!(
                    client = %ctx.client,
                    path = %ctx.path(),
                    window = window.as_str(),
                    retry_after_ms = retry_after.as_millis() as u64,
                    "Rate limit exceeded"
                );
                Err(FilterError::RateLimitExceeded { retry_after })
            }
        }
    }
}
