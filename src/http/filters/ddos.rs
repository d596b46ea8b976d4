use std::sync::Arc;

use crate::config::FailureMode;
use crate::http::chain::{Action, Filter, RequestContext};
use crate::http::error::FilterError;
use crate::security::{DdosDecision, DdosGuard, PatternDetector};

/// Scores suspicious traffic and turns blocked clients away.
pub struct DdosFilter {
    guard: Arc<DdosGuard>,
    detector: PatternDetector,
    inspected_headers: Arc<Vec<String>>,
    failure_mode: FailureMode,
}

impl DdosFilter {
    pub fn new(guard: Arc<DdosGuard>, inspected_headers: Arc<Vec<String>>, failure_mode: FailureMode) -> Self {
        Self {
            guard,
            detector: PatternDetector::new(),
            inspected_headers,
            failure_mode,
        }
    }
}

impl Filter for DdosFilter {
    fn name(&self) -> &'static str {
        "ddos-guard"
    }

    fn failure_mode(&self) -> FailureMode {
        self.failure_mode
    }

    fn on_request(&self, ctx: &mut RequestContext) -> Result<Action, FilterError> {
        let suspicious = ctx.flagged.is_some()
            || self
                .detector
                .classify(&ctx.view(&self.inspected_headers))
                .is_suspicious();

        match self.guard.evaluate(&ctx.client, suspicious) {
            DdosDecision::Allow => Ok(Action::Forward),
            DdosDecision::Block { remaining } => Err(FilterError::Blocked { remaining }),
        }
    }
}
