use axum::{
    http::{header, Method, StatusCode},
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use crate::config::FailureMode;
use crate::http::chain::{Action, Filter, RequestContext};
use crate::http::error::FilterError;
use crate::security::cors::{CorsPolicy, PreflightDecision};

/// Answers preflights and decorates responses for allowed origins.
pub struct CorsFilter {
    policy: Arc<CorsPolicy>,
    failure_mode: FailureMode,
}

impl CorsFilter {
    pub fn new(policy: Arc<CorsPolicy>, failure_mode: FailureMode) -> Self {
        Self {
            policy,
            failure_mode,
        }
    }
}

fn is_preflight(ctx: &RequestContext) -> bool {
    ctx.method == Method::OPTIONS
        && ctx.headers.contains_key(header::ORIGIN)
        && ctx.headers.contains_key(header::ACCESS_CONTROL_REQUEST_METHOD)
}

impl Filter for CorsFilter {
    fn name(&self) -> &'static str {
        "cors"
    }

    fn failure_mode(&self) -> FailureMode {
        self.failure_mode
    }

    fn on_request(&self, ctx: &mut RequestContext) -> Result<Action, FilterError> {
        if !self.policy.is_enabled() || !is_preflight(ctx) {
            return Ok(Action::Forward);
        }

        let origin = ctx.header(header::ORIGIN).unwrap_or_default();
        match self.policy.preflight(origin) {
            PreflightDecision::Allowed(headers) => {
                Ok(Action::Respond((StatusCode::NO_CONTENT, headers).into_response()))
            }
            PreflightDecision::Denied => {
                tracing::debug!(client = %ctx.client, origin, "Preflight from disallowed origin");
                Err(FilterError::DisallowedOrigin)
            }
        }
    }

    fn on_response(&self, ctx: &RequestContext, response: &mut Response) -> Result<(), FilterError> {
        let Some(origin) = ctx.header(header::ORIGIN) else {
            return Ok(());
        };
        if let Some(cors_headers) = self.policy.response_headers(origin) {
            let target = response.headers_mut();
            for (name, value) in &cors_headers {
                if *name == header::VARY {
                    target.append(name, value.clone());
                } else {
                    target.insert(name, value.clone());
                }
            }
        }
        Ok(())
    }
}
