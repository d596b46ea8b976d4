use axum::{
    http::{HeaderName, HeaderValue},
    response::Response,
};
use std::sync::Arc;

use crate::config::{FailureMode, InjectionAction};
use crate::http::chain::{Action, Filter, RequestContext};
use crate::http::error::FilterError;
use crate::security::{DdosDecision, DdosGuard, PatternDetector, PatternFamily};

const X_XSS_PROTECTION: HeaderName = HeaderName::from_static("x-xss-protection");

/// Scans a request for one signature family.
///
/// In reject mode a hit is answered with 400 and reported to the DDoS guard;
/// if that report blocks the client the answer is 429 instead. In flag mode
/// the request goes on, marked for the DDoS guard to score.
pub struct InjectionFilter {
    family: PatternFamily,
    action: InjectionAction,
    inspected_headers: Arc<Vec<String>>,
    detector: PatternDetector,
    ddos: Arc<DdosGuard>,
    failure_mode: FailureMode,
}

impl InjectionFilter {
    pub fn new(
        family: PatternFamily,
        action: InjectionAction,
        inspected_headers: Arc<Vec<String>>,
        ddos: Arc<DdosGuard>,
        failure_mode: FailureMode,
    ) -> Self {
        Self {
            family,
            action,
            inspected_headers,
            detector: PatternDetector::new(),
            ddos,
            failure_mode,
        }
    }
}

impl Filter for InjectionFilter {
    fn name(&self) -> &'static str {
        match self.family {
            PatternFamily::Xss => "xss-protection",
            PatternFamily::SqlInjection => "sqli-protection",
            PatternFamily::ExploitProbe => "probe-protection",
        }
    }

    fn failure_mode(&self) -> FailureMode {
        self.failure_mode
    }

    fn on_request(&self, ctx: &mut RequestContext) -> Result<Action, FilterError> {
        // An unread body cannot be vouched for
        if ctx.body_too_large {
            return Err(FilterError::PayloadTooLarge);
        }

        let verdict = self
            .detector
            .classify_family(&ctx.view(&self.inspected_headers), self.family);
        if !verdict.is_suspicious() {
            return Ok(Action::Forward);
        }

        tracing::warn!(
            client = %ctx.client,
            family = %self.family,
            method = %ctx.method,
            path = %ctx.path(),
            "Suspicious payload detected"
        );

        match self.action {
            InjectionAction::Flag => {
                ctx.flagged.get_or_insert(self.family);
                Ok(Action::Forward)
            }
            InjectionAction::Reject => match self.ddos.evaluate(&ctx.client, true) {
                DdosDecision::Block { remaining } => Err(FilterError::Blocked { remaining }),
                DdosDecision::Allow => Err(FilterError::SuspiciousPayload {
                    family: self.family,
                }),
            },
        }
    }

    fn on_response(&self, _ctx: &RequestContext, response: &mut Response) -> Result<(), FilterError> {
        if self.family == PatternFamily::Xss {
            response
                .headers_mut()
                .entry(X_XSS_PROTECTION)
                .or_insert(HeaderValue::from_static("1; mode=block"));
        }
        Ok(())
    }
}
