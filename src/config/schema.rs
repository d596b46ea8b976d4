//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the guard.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Root configuration for the activation guard.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GuardConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Business backend the chain forwards to.
    pub upstream: UpstreamConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Request inspection and response hardening.
    pub security: SecurityConfig,

    /// Suspicion scoring and timed blocks.
    pub ddos: DdosConfig,

    /// Burst and sustained request windows.
    pub rate_limit: RateLimitConfig,

    /// Accepted Host header values.
    pub hosts: HostConfig,

    /// Cross-origin policy.
    pub cors: CorsConfig,

    /// What happens when a filter itself fails.
    pub failure: FailureConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Admin API settings.
    pub admin: AdminConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Upstream (business API) configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Address of the activation API (e.g., "127.0.0.1:5000").
    /// When absent the built-in status handler answers instead.
    pub address: Option<String>,
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// How injection filters act on a positive detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InjectionAction {
    /// Reject with 400 and report the offense to the DDoS guard.
    Reject,
    /// Let the request continue; the DDoS guard scores it.
    Flag,
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Enable security response headers.
    pub enable_headers: bool,

    /// Maximum body size in bytes buffered for inspection.
    pub max_body_size: usize,

    /// Action taken by the XSS and SQL-injection filters.
    pub injection_action: InjectionAction,

    /// Request headers scanned by the pattern detector.
    pub inspected_headers: Vec<String>,

    /// Addresses or CIDR prefixes exempt from DDoS and rate-limit rejection.
    pub whitelist_ips: Vec<String>,

    /// Peers allowed to set the client address header.
    pub trusted_proxies: Vec<String>,

    /// Header carrying the client address when the peer is a trusted proxy.
    pub real_ip_header: String,

    /// Response header policy.
    pub headers: HeaderPolicyConfig,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            enable_headers: true,
            max_body_size: 2 * 1024 * 1024, // 2MB
            injection_action: InjectionAction::Reject,
            inspected_headers: vec![
                "user-agent".to_string(),
                "referer".to_string(),
                "cookie".to_string(),
                "x-forwarded-host".to_string(),
            ],
            whitelist_ips: Vec::new(),
            trusted_proxies: Vec::new(),
            real_ip_header: "x-forwarded-for".to_string(),
            headers: HeaderPolicyConfig::default(),
        }
    }
}

/// Hardening headers added to every response.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HeaderPolicyConfig {
    /// Content-Security-Policy directives: directive -> allowed sources.
    pub csp: BTreeMap<String, Vec<String>>,

    /// X-Frame-Options value.
    pub frame_options: String,

    /// Referrer-Policy value.
    pub referrer_policy: String,

    /// Strict-Transport-Security max-age; 0 disables the header.
    pub hsts_max_age_secs: u64,

    /// Append includeSubDomains to HSTS.
    pub hsts_include_subdomains: bool,

    /// Permissions-Policy value; empty disables the header.
    pub permissions_policy: String,
}

impl Default for HeaderPolicyConfig {
    fn default() -> Self {
        let self_only = || vec!["'self'".to_string()];
        let mut csp = BTreeMap::new();
        csp.insert("default-src".to_string(), self_only());
        csp.insert("script-src".to_string(), self_only());
        csp.insert("style-src".to_string(), self_only());
        csp.insert(
            "img-src".to_string(),
            vec!["'self'".to_string(), "data:".to_string()],
        );
        csp.insert("connect-src".to_string(), self_only());
        csp.insert("font-src".to_string(), self_only());
        csp.insert("object-src".to_string(), vec!["'none'".to_string()]);
        csp.insert("frame-ancestors".to_string(), vec!["'none'".to_string()]);
        csp.insert("base-uri".to_string(), self_only());
        csp.insert("form-action".to_string(), self_only());

        Self {
            csp,
            frame_options: "DENY".to_string(),
            referrer_policy: "strict-origin-when-cross-origin".to_string(),
            hsts_max_age_secs: 31_536_000,
            hsts_include_subdomains: true,
            permissions_policy: "geolocation=(), microphone=(), camera=()".to_string(),
        }
    }
}

/// DDoS guard configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DdosConfig {
    /// Enable the DDoS guard.
    pub enabled: bool,

    /// Suspicion score at which a client is blocked.
    pub suspicious_threshold: u32,

    /// Block length in seconds.
    pub block_duration_secs: u64,

    /// Raw requests per second above which a request counts as suspicious.
    pub requests_per_second: u64,

    /// Seconds without a suspicious observation after which a score is forgotten.
    pub score_ttl_secs: u64,
}

impl Default for DdosConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            suspicious_threshold: 10,
            block_duration_secs: 300,
            requests_per_second: 50,
            score_ttl_secs: 600,
        }
    }
}

/// Override for a single endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct EndpointLimit {
    /// Requests allowed per period.
    pub calls: u64,

    /// Period length in seconds.
    pub period_secs: u64,
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Requests allowed per sustained window.
    pub default_calls: u64,

    /// Sustained window length in seconds.
    pub default_period_secs: u64,

    /// Requests allowed per burst window.
    pub burst_calls: u64,

    /// Burst window length in seconds.
    pub burst_period_secs: u64,

    /// Per-endpoint sustained limits. Keys ending in `*` match by prefix.
    pub endpoint_limits: BTreeMap<String, EndpointLimit>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            default_calls: 100,
            default_period_secs: 60,
            burst_calls: 20,
            burst_period_secs: 1,
            endpoint_limits: BTreeMap::new(),
        }
    }
}

/// Trusted host configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HostConfig {
    /// Accepted hosts: exact names, `*.suffix` or `*`.
    pub trusted_hosts: Vec<String>,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            trusted_hosts: vec!["*".to_string()],
        }
    }
}

/// CORS configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Enable CORS handling.
    pub enabled: bool,

    /// Allowed origins: exact, `scheme://*.suffix` or `*`.
    pub allowed_origins: Vec<String>,

    /// Allowed methods for preflight.
    pub allowed_methods: Vec<String>,

    /// Allowed request headers for preflight.
    pub allowed_headers: Vec<String>,

    /// Response headers exposed to the browser.
    pub expose_headers: Vec<String>,

    /// Preflight cache lifetime in seconds.
    pub max_age_secs: u64,

    /// Allow credentials.
    pub allow_credentials: bool,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            allowed_origins: Vec::new(),
            allowed_methods: ["GET", "POST", "PUT", "PATCH", "DELETE", "OPTIONS"]
                .iter()
                .map(|m| m.to_string())
                .collect(),
            allowed_headers: vec!["content-type".to_string(), "authorization".to_string()],
            expose_headers: vec!["x-request-id".to_string()],
            max_age_secs: 600,
            allow_credentials: false,
        }
    }
}

/// Behavior when a filter fails internally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureMode {
    /// Let the request through.
    Open,
    /// Reject the request.
    Closed,
}

/// Failure policy per filter group.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FailureConfig {
    /// Applies to header, injection, DDoS, rate-limit, host and CORS filters.
    pub security_filters: FailureMode,

    /// Applies to logging and monitoring filters.
    pub observability_filters: FailureMode,
}

impl Default for FailureConfig {
    fn default() -> Self {
        Self {
            security_filters: FailureMode::Closed,
            observability_filters: FailureMode::Open,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}
