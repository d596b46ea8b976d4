//! Filter errors and their HTTP rendering.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

use crate::security::PatternFamily;

/// Why a filter refused a request, or failed while looking at it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FilterError {
    #[error("rate limit exceeded, retry after {retry_after:?}")]
    RateLimitExceeded { retry_after: Duration },

    #[error("client blocked for {remaining:?}")]
    Blocked { remaining: Duration },

    #[error("suspicious {family} payload")]
    SuspiciousPayload { family: PatternFamily },

    #[error("untrusted host header")]
    UntrustedHost,

    #[error("origin not allowed")]
    DisallowedOrigin,

    #[error("payload too large to inspect")]
    PayloadTooLarge,

    #[error("internal filter error: {0}")]
    Internal(String),
}

impl FilterError {
    pub fn status(&self) -> StatusCode {
        match self {
            FilterError::RateLimitExceeded { .. } | FilterError::Blocked { .. } => {
                StatusCode::TOO_MANY_REQUESTS
            }
            FilterError::SuspiciousPayload { .. }
            | FilterError::UntrustedHost
            | FilterError::DisallowedOrigin => StatusCode::BAD_REQUEST,
            FilterError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            FilterError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short label used for metrics and logs.
    pub fn reason(&self) -> &'static str {
        match self {
            FilterError::RateLimitExceeded { .. } => "rate_limited",
            FilterError::Blocked { .. } => "blocked",
            FilterError::SuspiciousPayload { family } => family.as_str(),
            FilterError::UntrustedHost => "untrusted_host",
            FilterError::DisallowedOrigin => "disallowed_origin",
            FilterError::PayloadTooLarge => "payload_too_large",
            FilterError::Internal(_) => "internal",
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            FilterError::RateLimitExceeded { retry_after } => Some(*retry_after),
            FilterError::Blocked { remaining } => Some(*remaining),
            _ => None,
        }
    }

    /// Client-facing message. Never echoes request content.
    fn public_message(&self) -> &'static str {
        match self {
            FilterError::RateLimitExceeded { .. } => "Rate limit exceeded",
            FilterError::Blocked { .. } => "Too many suspicious requests",
            FilterError::SuspiciousPayload { .. } => "Request rejected",
            FilterError::UntrustedHost => "Invalid host header",
            FilterError::DisallowedOrigin => "Origin not allowed",
            FilterError::PayloadTooLarge => "Payload too large",
            FilterError::Internal(_) => "Internal server error",
        }
    }
}

/// Whole seconds for a `Retry-After` header, rounded up, at least 1.
pub fn retry_after_secs(wait: Duration) -> u64 {
    let secs = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
    secs.max(1)
}

impl IntoResponse for FilterError {
    fn into_response(self) -> Response {
        let mut response = (
            self.status(),
            Json(json!({ "error": self.public_message() })),
        )
            .into_response();

        if let Some(wait) = self.retry_after() {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs(wait)));
        }
        response
    }
}
