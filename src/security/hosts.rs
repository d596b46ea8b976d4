//! Trusted Host header matching.
//!
//! Host matching is case-insensitive and ignores the port. Patterns are
//! exact names, `*.suffix` for any subdomain, or `*` for anything.

/// One accepted-host pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
enum HostPattern {
    Any,
    Exact(String),
    /// Includes the leading dot.
    Suffix(String),
}

impl HostPattern {
    fn parse(pattern: &str) -> Self {
        let pattern = pattern.trim().to_ascii_lowercase();
        if pattern == "*" {
            HostPattern::Any
        } else if let Some(domain) = pattern.strip_prefix("*.") {
            HostPattern::Suffix(format!(".{domain}"))
        } else {
            HostPattern::Exact(pattern)
        }
    }

    fn matches(&self, host: &str) -> bool {
        match self {
            HostPattern::Any => true,
            HostPattern::Exact(expected) => host == expected,
            HostPattern::Suffix(suffix) => host.len() > suffix.len() && host.ends_with(suffix.as_str()),
        }
    }
}

/// Strip the port from a Host header value. Handles bracketed IPv6.
pub fn host_without_port(host: &str) -> &str {
    let host = host.trim();
    if let Some(rest) = host.strip_prefix('[') {
        return rest.split_once(']').map(|(h, _)| h).unwrap_or(rest);
    }
    match host.rsplit_once(':') {
        // A bare IPv6 literal has several colons and no port
        Some((name, port)) if !name.contains(':') && port.chars().all(|c| c.is_ascii_digit()) => name,
        _ => host,
    }
}

/// Accepted values of the Host header.
#[derive(Debug, Clone)]
pub struct HostPolicy {
    patterns: Vec<HostPattern>,
}

impl HostPolicy {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Self {
        Self {
            patterns: patterns.iter().map(|p| HostPattern::parse(p.as_ref())).collect(),
        }
    }

    /// Whether every host is accepted.
    pub fn accepts_any(&self) -> bool {
        self.patterns.contains(&HostPattern::Any)
    }

    pub fn is_trusted_host(&self, host: &str) -> bool {
        let host = host_without_port(host).trim_end_matches('.').to_ascii_lowercase();
        !host.is_empty() && self.patterns.iter().any(|p| p.matches(&host))
    }
}
