//! Response hardening headers.
//!
//! # Responsibilities
//! - Render the Content-Security-Policy from its directive table
//! - Add frame, sniffing, referrer, HSTS and permissions headers
//!
//! # Design Decisions
//! - Header values are validated once at startup; per-response work is a copy
//! - Headers already set by the business handler are left alone

use axum::http::{header, HeaderMap, HeaderName, HeaderValue};
use std::collections::BTreeMap;

use crate::config::HeaderPolicyConfig;
use crate::security::PolicyError;

/// Render CSP directives as `name src src; name src`.
pub fn render_csp(directives: &BTreeMap<String, Vec<String>>) -> String {
    directives
        .iter()
        .map(|(name, sources)| {
            if sources.is_empty() {
                name.clone()
            } else {
                format!("{} {}", name, sources.join(" "))
            }
        })
        .collect::<Vec<_>>()
        .join("; ")
}

/// Precomputed set of hardening headers.
#[derive(Debug, Clone)]
pub struct SecurityHeaders {
    headers: Vec<(HeaderName, HeaderValue)>,
}

impl SecurityHeaders {
    pub fn from_config(config: &HeaderPolicyConfig) -> Result<Self, PolicyError> {
        for (name, sources) in &config.csp {
            let malformed = |s: &str| s.is_empty() || s.contains([';', ',']) || s.contains(char::is_whitespace);
            if malformed(name) || sources.iter().any(|s| malformed(s)) {
                return Err(PolicyError::InvalidCspDirective(name.clone()));
            }
        }

        let mut headers = Vec::new();
        let mut push = |name: HeaderName, value: String| -> Result<(), PolicyError> {
            let value = HeaderValue::from_str(&value)
                .map_err(|_| PolicyError::InvalidHeaderValue(name.to_string()))?;
            headers.push((name, value));
            Ok(())
        };

        if !config.csp.is_empty() {
            push(header::CONTENT_SECURITY_POLICY, render_csp(&config.csp))?;
        }
        if !config.frame_options.is_empty() {
            push(header::X_FRAME_OPTIONS, config.frame_options.clone())?;
        }
        push(header::X_CONTENT_TYPE_OPTIONS, "nosniff".to_string())?;
        if !config.referrer_policy.is_empty() {
            push(header::REFERRER_POLICY, config.referrer_policy.clone())?;
        }
        if config.hsts_max_age_secs > 0 {
            let mut hsts = format!("max-age={}", config.hsts_max_age_secs);
            if config.hsts_include_subdomains {
                hsts.push_str("; includeSubDomains");
            }
            push(header::STRICT_TRANSPORT_SECURITY, hsts)?;
        }
        if !config.permissions_policy.is_empty() {
            push(
                HeaderName::from_static("permissions-policy"),
                config.permissions_policy.clone(),
            )?;
        }

        Ok(Self { headers })
    }

    /// Insert every header not already present.
    pub fn apply(&self, target: &mut HeaderMap) {
        for (name, value) in &self.headers {
            if !target.contains_key(name) {
                target.insert(name.clone(), value.clone());
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&HeaderName, &HeaderValue)> {
        self.headers.iter().map(|(n, v)| (n, v))
    }
}
