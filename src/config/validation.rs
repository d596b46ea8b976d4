//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (limits and periods > 0)
//! - Check that addresses, CIDR prefixes and origin patterns parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GuardConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use axum::http::uri::Authority;
use std::net::SocketAddr;
use thiserror::Error;

use crate::config::schema::GuardConfig;
use crate::security::cors::OriginRule;
use crate::security::{SecurityHeaders, Whitelist};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{field} must be greater than zero")]
    Zero { field: String },

    #[error("{field}: invalid address '{value}'")]
    InvalidAddress { field: String, value: String },

    #[error("{field}: {reason}")]
    Invalid { field: String, reason: String },
}

fn zero(field: impl Into<String>) -> ValidationError {
    ValidationError::Zero { field: field.into() }
}

fn invalid(field: impl Into<String>, reason: impl ToString) -> ValidationError {
    ValidationError::Invalid {
        field: field.into(),
        reason: reason.to_string(),
    }
}

fn check_socket_addr(errors: &mut Vec<ValidationError>, field: &str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: field.to_string(),
            value: value.to_string(),
        });
    }
}

/// Validate a parsed configuration, collecting every problem found.
pub fn validate_config(config: &GuardConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_socket_addr(&mut errors, "listener.bind_address", &config.listener.bind_address);

    if let Some(address) = &config.upstream.address {
        if address.parse::<Authority>().is_err() {
            errors.push(ValidationError::InvalidAddress {
                field: "upstream.address".to_string(),
                value: address.clone(),
            });
        }
    }

    if config.timeouts.request_secs == 0 {
        errors.push(zero("timeouts.request_secs"));
    }

    // Security
    let security = &config.security;
    if security.max_body_size == 0 {
        errors.push(zero("security.max_body_size"));
    }
    if let Err(e) = Whitelist::parse(&security.whitelist_ips) {
        errors.push(invalid("security.whitelist_ips", e));
    }
    if let Err(e) = Whitelist::parse(&security.trusted_proxies) {
        errors.push(invalid("security.trusted_proxies", e));
    }
    if axum::http::HeaderName::from_bytes(security.real_ip_header.as_bytes()).is_err() {
        errors.push(invalid("security.real_ip_header", "not a valid header name"));
    }
    if let Err(e) = SecurityHeaders::from_config(&security.headers) {
        errors.push(invalid("security.headers", e));
    }

    // DDoS
    let ddos = &config.ddos;
    if ddos.suspicious_threshold == 0 {
        errors.push(zero("ddos.suspicious_threshold"));
    }
    if ddos.block_duration_secs == 0 {
        errors.push(zero("ddos.block_duration_secs"));
    }
    if ddos.requests_per_second == 0 {
        errors.push(zero("ddos.requests_per_second"));
    }
    if ddos.score_ttl_secs == 0 {
        errors.push(zero("ddos.score_ttl_secs"));
    }

    // Rate limiting
    let limits = &config.rate_limit;
    for (field, value) in [
        ("rate_limit.default_calls", limits.default_calls),
        ("rate_limit.default_period_secs", limits.default_period_secs),
        ("rate_limit.burst_calls", limits.burst_calls),
        ("rate_limit.burst_period_secs", limits.burst_period_secs),
    ] {
        if value == 0 {
            errors.push(zero(field));
        }
    }
    for (endpoint, limit) in &limits.endpoint_limits {
        let field = format!("rate_limit.endpoint_limits.\"{endpoint}\"");
        if !endpoint.starts_with('/') {
            errors.push(invalid(field.clone(), "endpoint must start with '/'"));
        }
        if limit.calls == 0 {
            errors.push(zero(format!("{field}.calls")));
        }
        if limit.period_secs == 0 {
            errors.push(zero(format!("{field}.period_secs")));
        }
    }

    // Hosts and CORS
    if config.hosts.trusted_hosts.is_empty() {
        errors.push(invalid("hosts.trusted_hosts", "at least one pattern is required"));
    }
    for origin in &config.cors.allowed_origins {
        if let Err(e) = OriginRule::parse(origin) {
            errors.push(invalid("cors.allowed_origins", e));
        }
    }

    if config.observability.metrics_enabled {
        check_socket_addr(
            &mut errors,
            "observability.metrics_address",
            &config.observability.metrics_address,
        );
    }

    if config.admin.enabled {
        check_socket_addr(&mut errors, "admin.bind_address", &config.admin.bind_address);
        if config.admin.api_key.trim().is_empty() {
            errors.push(invalid("admin.api_key", "must not be empty when admin is enabled"));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
