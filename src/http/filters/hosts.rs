use std::sync::Arc;

use crate::config::FailureMode;
use crate::http::chain::{Action, Filter, RequestContext};
use crate::http::error::FilterError;
use crate::security::HostPolicy;

/// Rejects requests addressed to a host we do not serve.
pub struct TrustedHostFilter {
    policy: Arc<HostPolicy>,
    failure_mode: FailureMode,
}

impl TrustedHostFilter {
    pub fn new(policy: Arc<HostPolicy>, failure_mode: FailureMode) -> Self {
        Self {
            policy,
            failure_mode,
        }
    }
}

impl Filter for TrustedHostFilter {
    fn name(&self) -> &'static str {
        "trusted-host"
    }

    fn failure_mode(&self) -> FailureMode {
        self.failure_mode
    }

    fn on_request(&self, ctx: &mut RequestContext) -> Result<Action, FilterError> {
        if self.policy.accepts_any() {
            return Ok(Action::Forward);
        }
        match ctx.host() {
            Some(host) if self.policy.is_trusted_host(host) => Ok(Action::Forward),
            host => {
                tracing::warn!(client = %ctx.client, host = host.unwrap_or("-"), "Untrusted host");
                Err(FilterError::UntrustedHost)
            }
        }
    }
}
