//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request (via the filter chain):
//!     → detector.rs   (classify path/query/headers/body)
//!     → ddos.rs       (suspicion score, timed blocks)
//!     → rate_limit.rs (burst + sustained windows)
//!     → hosts.rs      (trusted Host header)
//!     → cors.rs       (origin policy)
//! Outgoing response:
//!     → headers.rs    (CSP and hardening headers)
//! ```
//!
//! # Design Decisions
//! - Defense in depth: multiple layers of protection
//! - Detection is separated from response building
//! - All per-client state lives in-process behind [`store::CounterStore`]
//!   and the DDoS guard's own map

pub mod client_key;
pub mod cors;
pub mod ddos;
pub mod detector;
pub mod headers;
pub mod hosts;
pub mod rate_limit;
pub mod store;
pub mod whitelist;

use std::sync::Arc;
use thiserror::Error;

use crate::clock::{Clock, SystemClock};
use crate::config::GuardConfig;

pub use client_key::ClientKey;
pub use cors::CorsPolicy;
pub use ddos::{DdosDecision, DdosGuard};
pub use detector::{PatternDetector, PatternFamily, RequestView, Verdict};
pub use headers::SecurityHeaders;
pub use hosts::HostPolicy;
pub use rate_limit::{RateDecision, RateLimiter};
pub use store::{CounterStore, MemoryCounterStore};
pub use whitelist::{Whitelist, WhitelistError};

/// Errors raised while compiling header or CORS policies.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PolicyError {
    #[error("invalid CSP directive '{0}'")]
    InvalidCspDirective(String),

    #[error("invalid header value for {0}")]
    InvalidHeaderValue(String),

    #[error("invalid origin pattern '{0}'")]
    InvalidOrigin(String),

    #[error(transparent)]
    Whitelist(#[from] WhitelistError),
}

/// Every security component, built once from configuration and shared.
pub struct SecurityState {
    pub clock: Arc<dyn Clock>,
    pub counters: Arc<dyn CounterStore>,
    pub whitelist: Arc<Whitelist>,
    pub trusted_proxies: Arc<Whitelist>,
    pub detector: PatternDetector,
    pub ddos: Arc<DdosGuard>,
    pub limiter: Arc<RateLimiter>,
    pub headers: Arc<SecurityHeaders>,
    pub cors: Arc<CorsPolicy>,
    pub hosts: Arc<HostPolicy>,
}

impl SecurityState {
    /// Build with the system clock and an in-memory counter store.
    pub fn from_config(config: &GuardConfig) -> Result<Self, PolicyError> {
        Self::with_backends(
            config,
            Arc::new(SystemClock),
            Arc::new(MemoryCounterStore::new()),
        )
    }

    /// Build with an injected clock and counter store.
    pub fn with_backends(
        config: &GuardConfig,
        clock: Arc<dyn Clock>,
        counters: Arc<dyn CounterStore>,
    ) -> Result<Self, PolicyError> {
        let whitelist = Arc::new(Whitelist::parse(&config.security.whitelist_ips)?);
        let trusted_proxies = Arc::new(Whitelist::parse(&config.security.trusted_proxies)?);

        let ddos = Arc::new(DdosGuard::new(
            config.ddos.clone(),
            whitelist.clone(),
            counters.clone(),
            clock.clone(),
        ));
        let limiter = Arc::new(RateLimiter::new(
            &config.rate_limit,
            whitelist.clone(),
            counters.clone(),
            clock.clone(),
        ));

        Ok(Self {
            clock,
            counters,
            whitelist,
            trusted_proxies,
            detector: PatternDetector::new(),
            ddos,
            limiter,
            headers: Arc::new(SecurityHeaders::from_config(&config.security.headers)?),
            cors: Arc::new(CorsPolicy::from_config(&config.cors)?),
            hosts: Arc::new(HostPolicy::new(&config.hosts.trusted_hosts)),
        })
    }
}
