//! Cross-origin policy.
//!
//! Origins are allowed by exact match, by wildcard subdomain
//! (`https://*.example.com`) or by `*`. A disallowed origin simply gets no
//! CORS headers; the browser then refuses the cross-origin read.

use axum::http::{header, HeaderMap, HeaderValue};
use url::Url;

use crate::config::CorsConfig;
use crate::security::PolicyError;

/// One allowed-origin entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OriginRule {
    Any,
    Exact(String),
    Subdomain {
        scheme: String,
        /// Includes the leading dot, e.g. `.example.com`.
        suffix: String,
        port: Option<u16>,
    },
}

impl OriginRule {
    pub fn parse(pattern: &str) -> Result<Self, PolicyError> {
        let pattern = pattern.trim().trim_end_matches('/');
        if pattern == "*" {
            return Ok(OriginRule::Any);
        }

        let invalid = || PolicyError::InvalidOrigin(pattern.to_string());
        let (scheme, rest) = pattern.split_once("://").ok_or_else(invalid)?;
        if scheme.is_empty() || rest.is_empty() {
            return Err(invalid());
        }

        match rest.strip_prefix("*.") {
            Some(domain) => {
                let (host, port) = match domain.rsplit_once(':') {
                    Some((host, port)) => (host, Some(port.parse::<u16>().map_err(|_| invalid())?)),
                    None => (domain, None),
                };
                if host.is_empty() || host.contains('*') {
                    return Err(invalid());
                }
                Ok(OriginRule::Subdomain {
                    scheme: scheme.to_ascii_lowercase(),
                    suffix: format!(".{}", host.to_ascii_lowercase()),
                    port,
                })
            }
            None => {
                let url = Url::parse(pattern).map_err(|_| invalid())?;
                if url.host_str().is_none() || rest.contains('*') {
                    return Err(invalid());
                }
                Ok(OriginRule::Exact(pattern.to_ascii_lowercase()))
            }
        }
    }

    pub fn matches(&self, origin: &str) -> bool {
        match self {
            OriginRule::Any => true,
            OriginRule::Exact(expected) => {
                origin.trim_end_matches('/').eq_ignore_ascii_case(expected)
            }
            OriginRule::Subdomain {
                scheme,
                suffix,
                port,
            } => {
                let Ok(url) = Url::parse(origin) else {
                    return false;
                };
                let Some(host) = url.host_str() else {
                    return false;
                };
                url.scheme() == scheme
                    && host.len() > suffix.len()
                    && host.ends_with(suffix.as_str())
                    && url.port() == *port
            }
        }
    }
}

/// Outcome of a preflight evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreflightDecision {
    Allowed(HeaderMap),
    Denied,
}

/// Compiled CORS configuration.
#[derive(Debug, Clone)]
pub struct CorsPolicy {
    enabled: bool,
    origins: Vec<OriginRule>,
    allow_methods: HeaderValue,
    allow_headers: HeaderValue,
    expose_headers: Option<HeaderValue>,
    max_age: HeaderValue,
    allow_credentials: bool,
}

impl CorsPolicy {
    pub fn from_config(config: &CorsConfig) -> Result<Self, PolicyError> {
        let origins = config
            .allowed_origins
            .iter()
            .map(|o| OriginRule::parse(o))
            .collect::<Result<Vec<_>, _>>()?;

        let list = |items: &[String], field: &str| {
            HeaderValue::from_str(&items.join(", "))
                .map_err(|_| PolicyError::InvalidHeaderValue(field.to_string()))
        };

        Ok(Self {
            enabled: config.enabled,
            origins,
            allow_methods: list(&config.allowed_methods, "cors.allowed_methods")?,
            allow_headers: list(&config.allowed_headers, "cors.allowed_headers")?,
            expose_headers: if config.expose_headers.is_empty() {
                None
            } else {
                Some(list(&config.expose_headers, "cors.expose_headers")?)
            },
            max_age: HeaderValue::from(config.max_age_secs),
            allow_credentials: config.allow_credentials,
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_allowed_origin(&self, origin: &str) -> bool {
        self.enabled && self.origins.iter().any(|rule| rule.matches(origin))
    }

    /// Value for `Access-Control-Allow-Origin`. `*` is only echoed literally
    /// when credentials are off.
    fn allow_origin_value(&self, origin: &str) -> Option<HeaderValue> {
        let wildcard_only = self.origins.iter().all(|r| *r == OriginRule::Any);
        if wildcard_only && !self.allow_credentials {
            return Some(HeaderValue::from_static("*"));
        }
        HeaderValue::from_str(origin).ok()
    }

    /// CORS headers for a simple (non-preflight) response, if the origin is allowed.
    pub fn response_headers(&self, origin: &str) -> Option<HeaderMap> {
        if !self.is_allowed_origin(origin) {
            return None;
        }
        let mut headers = HeaderMap::new();
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            self.allow_origin_value(origin)?,
        );
        headers.insert(header::VARY, HeaderValue::from_static("origin"));
        if self.allow_credentials {
            headers.insert(
                header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
                HeaderValue::from_static("true"),
            );
        }
        if let Some(expose) = &self.expose_headers {
            headers.insert(header::ACCESS_CONTROL_EXPOSE_HEADERS, expose.clone());
        }
        Some(headers)
    }

    /// Evaluate a preflight request from `origin`.
    pub fn preflight(&self, origin: &str) -> PreflightDecision {
        let Some(mut headers) = self.response_headers(origin) else {
            return PreflightDecision::Denied;
        };
        headers.remove(header::ACCESS_CONTROL_EXPOSE_HEADERS);
        headers.insert(header::ACCESS_CONTROL_ALLOW_METHODS, self.allow_methods.clone());
        headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, self.allow_headers.clone());
        headers.insert(header::ACCESS_CONTROL_MAX_AGE, self.max_age.clone());
        PreflightDecision::Allowed(headers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(origins: &[&str]) -> CorsPolicy {
        CorsPolicy::from_config(&CorsConfig {
            allowed_origins: origins.iter().map(|o| o.to_string()).collect(),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_exact_origin() {
        let p = policy(&["https://shop.example.com/"]);
        assert!(p.is_allowed_origin("https://shop.example.com"));
        assert!(p.is_allowed_origin("HTTPS://Shop.Example.com"));
        assert!(!p.is_allowed_origin("http://shop.example.com"));
        assert!(!p.is_allowed_origin("https://evil.com"));
    }

    #[test]
    fn test_wildcard_subdomain() {
        let p = policy(&["https://*.example.com"]);
        assert!(p.is_allowed_origin("https://app.example.com"));
        assert!(p.is_allowed_origin("https://a.b.example.com"));
        assert!(!p.is_allowed_origin("https://example.com"));
        assert!(!p.is_allowed_origin("https://evilexample.com"));
        assert!(!p.is_allowed_origin("http://app.example.com"));
        assert!(!p.is_allowed_origin("https://app.example.com:8443"));
    }

    #[test]
    fn test_empty_list_allows_nothing() {
        let p = policy(&[]);
        assert!(!p.is_allowed_origin("https://shop.example.com"));
        assert_eq!(p.preflight("https://shop.example.com"), PreflightDecision::Denied);
    }

    #[test]
    fn test_any_origin_echoes_star_without_credentials() {
        let p = policy(&["*"]);
        let headers = p.response_headers("https://x.test").unwrap();
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    }

    #[test]
    fn test_credentials_echo_origin() {
        let p = CorsPolicy::from_config(&CorsConfig {
            allowed_origins: vec!["*".into()],
            allow_credentials: true,
            ..Default::default()
        })
        .unwrap();
        let headers = p.response_headers("https://x.test").unwrap();
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "https://x.test");
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
    }

    #[test]
    fn test_preflight_headers() {
        let p = policy(&["https://shop.example.com"]);
        match p.preflight("https://shop.example.com") {
            PreflightDecision::Allowed(headers) => {
                assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "https://shop.example.com");
                assert!(headers[header::ACCESS_CONTROL_ALLOW_METHODS]
                    .to_str()
                    .unwrap()
                    .contains("POST"));
                assert_eq!(headers[header::ACCESS_CONTROL_MAX_AGE], "600");
            }
            PreflightDecision::Denied => panic!("preflight should be allowed"),
        }
    }

    #[test]
    fn test_disabled_policy_allows_nothing() {
        let p = CorsPolicy::from_config(&CorsConfig {
            enabled: false,
            allowed_origins: vec!["*".into()],
            ..Default::default()
        })
        .unwrap();
        assert!(!p.is_allowed_origin("https://x.test"));
    }

    #[test]
    fn test_invalid_patterns() {
        for pattern in ["example.com", "https://", "https://*.", "https://*.a.com:http", "https://a*.com"] {
            assert!(OriginRule::parse(pattern).is_err(), "{pattern} should be rejected");
        }
    }
}
