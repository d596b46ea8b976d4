//! The standard filters, one per concern.
//!
//! Order matters and is fixed here:
//! logging → security-headers → xss-protection → sqli-protection →
//! ddos-guard → rate-limiter → trusted-host → monitoring → cors

mod cors;
mod ddos;
mod headers;
mod hosts;
mod injection;
mod logging;
mod monitoring;
mod rate_limit;

use std::sync::Arc;

pub use cors::CorsFilter;
pub use ddos::DdosFilter;
pub use headers::SecurityHeadersFilter;
pub use hosts::TrustedHostFilter;
pub use injection::InjectionFilter;
pub use logging::LoggingFilter;
pub use monitoring::MonitoringFilter;
pub use rate_limit::RateLimitFilter;

use crate::config::GuardConfig;
use crate::http::chain::Filter;
use crate::observability::ObservabilitySink;
use crate::security::{PatternFamily, SecurityState};

/// Build the standard chain.
pub fn standard(
    config: &GuardConfig,
    security: &SecurityState,
    sink: Arc<dyn ObservabilitySink>,
) -> Vec<Box<dyn Filter>> {
    let guarded = config.failure.security_filters;
    let observed = config.failure.observability_filters;
    let inspected = Arc::new(config.security.inspected_headers.clone());

    vec![
        Box::new(LoggingFilter::new(observed)),
        Box::new(SecurityHeadersFilter::new(
            config.security.enable_headers,
            security.headers.clone(),
            guarded,
        )),
        Box::new(InjectionFilter::new(
            PatternFamily::Xss,
            config.security.injection_action,
            inspected.clone(),
            security.ddos.clone(),
            guarded,
        )),
        Box::new(InjectionFilter::new(
            PatternFamily::SqlInjection,
            config.security.injection_action,
            inspected.clone(),
            security.ddos.clone(),
            guarded,
        )),
        Box::new(DdosFilter::new(security.ddos.clone(), inspected, guarded)),
        Box::new(RateLimitFilter::new(security.limiter.clone(), guarded)),
        Box::new(TrustedHostFilter::new(security.hosts.clone(), guarded)),
        Box::new(MonitoringFilter::new(sink, observed)),
        Box::new(CorsFilter::new(security.cors.clone(), guarded)),
    ]
}
