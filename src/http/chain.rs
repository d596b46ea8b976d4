//! Filter chain orchestration.
//!
//! # Responsibilities
//! - Buffer the request body and resolve the client address once
//! - Run request hooks in order, stopping at the first filter that answers
//! - Call the business handler when every filter forwarded
//! - Run response hooks of the filters that forwarded, in reverse order
//! - Contain filter failures and apply each filter's failure mode
//!
//! # Design Decisions
//! - The order is data (a `Vec` of filters), composed by one loop, rather
//!   than nested middleware layers
//! - Hooks are synchronous; everything they touch is in-memory
//! - A panic inside a hook is caught here and treated like an internal error

use axum::{
    body::{Body, Bytes},
    extract::{connect_info::MockConnectInfo, ConnectInfo, State},
    http::{header, HeaderMap, Method, Request, Uri},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::future::Future;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use crate::config::{FailureMode, GuardConfig};
use crate::http::client_ip::resolve_client_ip;
use crate::http::error::FilterError;
use crate::http::filters;
use crate::observability::{ChainEvent, ObservabilitySink};
use crate::security::{ClientKey, PatternFamily, RequestView, SecurityState};

/// What a request hook decided.
#[derive(Debug)]
pub enum Action {
    /// Hand the request to the next filter.
    Forward,
    /// Answer now with this response.
    Respond(Response),
}

/// One link of the chain.
pub trait Filter: Send + Sync {
    fn name(&self) -> &'static str;

    fn failure_mode(&self) -> FailureMode;

    /// Inspect the request before the handler runs.
    ///
    /// `Err` with anything but [`FilterError::Internal`] is a rejection and
    /// becomes the response.
    fn on_request(&self, _ctx: &mut RequestContext) -> Result<Action, FilterError> {
        Ok(Action::Forward)
    }

    /// Adjust the final response.
    fn on_response(&self, _ctx: &RequestContext, _response: &mut Response) -> Result<(), FilterError> {
        Ok(())
    }
}

/// Per-request state shared by every filter.
#[derive(Debug)]
pub struct RequestContext {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub client: ClientKey,
    pub peer: IpAddr,
    /// Body decoded lossily as UTF-8. Empty when the body was too large.
    pub body: String,
    pub body_too_large: bool,
    pub started_at: Instant,
    pub request_id: Option<String>,
    /// Set by injection filters running in flag mode.
    pub flagged: Option<PatternFamily>,
    pub rejected_by: Option<&'static str>,
}

impl RequestContext {
    pub fn path(&self) -> &str {
        self.uri.path()
    }

    /// Host header, falling back to the URI authority (HTTP/2).
    pub fn host(&self) -> Option<&str> {
        self.headers
            .get(header::HOST)
            .and_then(|v| v.to_str().ok())
            .or_else(|| self.uri.host())
    }

    pub fn header(&self, name: impl header::AsHeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Detector input covering the selected headers.
    pub fn view<'a>(&'a self, inspected_headers: &'a [String]) -> RequestView<'a> {
        RequestView {
            method: self.method.as_str(),
            path: self.uri.path(),
            query: self.uri.query(),
            headers: inspected_headers
                .iter()
                .filter_map(|name| {
                    self.headers
                        .get(name.as_str())
                        .and_then(|v| v.to_str().ok())
                        .map(|v| (name.as_str(), v))
                })
                .collect(),
            body: (!self.body.is_empty()).then_some(self.body.as_str()),
        }
    }
}

/// Ordered filters plus what they share.
pub struct FilterChain {
    filters: Vec<Box<dyn Filter>>,
    security: Arc<SecurityState>,
    sink: Arc<dyn ObservabilitySink>,
    max_body_size: usize,
    real_ip_header: String,
}

enum Hook<T> {
    Done(T),
    Rejected(FilterError),
    Failed(String),
}

fn run_hook<T>(f: impl FnOnce() -> Result<T, FilterError>) -> Hook<T> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => Hook::Done(value),
        Ok(Err(FilterError::Internal(msg))) => Hook::Failed(msg),
        Ok(Err(rejection)) => Hook::Rejected(rejection),
        Err(panic) => Hook::Failed(panic_message(panic.as_ref())),
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("panic: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("panic: {s}")
    } else {
        "panic".to_string()
    }
}

impl FilterChain {
    /// The standard nine filters in their fixed order.
    pub fn from_config(
        config: &GuardConfig,
        security: Arc<SecurityState>,
        sink: Arc<dyn ObservabilitySink>,
    ) -> Self {
        let filters = filters::standard(config, &security, sink.clone());
        Self::with_filters(config, security, sink, filters)
    }

    /// A chain running the given filters in the given order.
    pub fn with_filters(
        config: &GuardConfig,
        security: Arc<SecurityState>,
        sink: Arc<dyn ObservabilitySink>,
        filters: Vec<Box<dyn Filter>>,
    ) -> Self {
        Self {
            filters,
            security,
            sink,
            max_body_size: config.security.max_body_size,
            real_ip_header: config.security.real_ip_header.to_ascii_lowercase(),
        }
    }

    pub fn filter_names(&self) -> Vec<&'static str> {
        self.filters.iter().map(|f| f.name()).collect()
    }

    pub fn security(&self) -> &Arc<SecurityState> {
        &self.security
    }

    fn record_failure(&self, filter: &dyn Filter, error: &str) {
        tracing::error!(filter = filter.name(), error = %error, "Filter failed");
        self.sink.record(&ChainEvent::FilterFailed {
            filter: filter.name(),
            error: error.to_string(),
        });
    }

    /// Run `request` through the chain, calling `forward` if every filter lets it pass.
    pub async fn process<F, Fut>(&self, request: Request<Body>, peer: IpAddr, forward: F) -> Response
    where
        F: FnOnce(Request<Body>) -> Fut,
        Fut: Future<Output = Response>,
    {
        let (parts, body) = request.into_parts();
        let (bytes, body_too_large) = self.buffer_body(&parts.headers, body).await;

        let client = ClientKey::new(resolve_client_ip(
            peer,
            &parts.headers,
            &self.security.trusted_proxies,
            &self.real_ip_header,
        ));

        let mut ctx = RequestContext {
            method: parts.method.clone(),
            uri: parts.uri.clone(),
            headers: parts.headers.clone(),
            client,
            peer,
            body: String::from_utf8_lossy(&bytes).into_owned(),
            body_too_large,
            started_at: Instant::now(),
            request_id: parts
                .headers
                .get("x-request-id")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
            flagged: None,
            rejected_by: None,
        };

        let mut passed = Vec::with_capacity(self.filters.len());
        let mut early = None;

        for (index, filter) in self.filters.iter().enumerate() {
            match run_hook(|| filter.on_request(&mut ctx)) {
                Hook::Done(Action::Forward) => passed.push(index),
                Hook::Done(Action::Respond(response)) => {
                    early = Some(response);
                    break;
                }
                Hook::Rejected(rejection) => {
                    ctx.rejected_by = Some(filter.name());
                    self.sink.record(&ChainEvent::Rejected {
                        filter: filter.name(),
                        reason: rejection.reason(),
                        client: ctx.client.ip(),
                        status: rejection.status(),
                    });
                    early = Some(rejection.into_response());
                    break;
                }
                Hook::Failed(error) => {
                    self.record_failure(filter.as_ref(), &error);
                    if filter.failure_mode() == FailureMode::Closed {
                        ctx.rejected_by = Some(filter.name());
                        early = Some(FilterError::Internal(error).into_response());
                        break;
                    }
                }
            }
        }

        let mut response = match early {
            Some(response) => response,
            None => {
                let request = Request::from_parts(parts, Body::from(bytes));
                forward(request).await
            }
        };

        for &index in passed.iter().rev() {
            let filter = &self.filters[index];
            let failure = match run_hook(|| filter.on_response(&ctx, &mut response)) {
                Hook::Done(()) => continue,
                Hook::Rejected(e) => e.to_string(),
                Hook::Failed(error) => error,
            };
            self.record_failure(filter.as_ref(), &failure);
            if filter.failure_mode() == FailureMode::Closed {
                response = FilterError::Internal(failure).into_response();
            }
        }

        response
    }

    /// Read the body up to the inspection limit.
    async fn buffer_body(&self, headers: &HeaderMap, body: Body) -> (Bytes, bool) {
        let declared = headers
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<usize>().ok());
        if declared.is_some_and(|len| len > self.max_body_size) {
            return (Bytes::new(), true);
        }

        match axum::body::to_bytes(body, self.max_body_size).await {
            Ok(bytes) => (bytes, false),
            Err(e) => {
                tracing::debug!(error = %e, "Request body not buffered");
                (Bytes::new(), true)
            }
        }
    }
}

pub(crate) fn peer_addr(request: &Request<Body>) -> Option<IpAddr> {
    let extensions = request.extensions();
    extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .or_else(|| {
            extensions
                .get::<MockConnectInfo<SocketAddr>>()
                .map(|MockConnectInfo(addr)| addr.ip())
        })
}

/// Axum middleware entry point.
pub async fn filter_chain_middleware(
    State(chain): State<Arc<FilterChain>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let peer = peer_addr(&request).unwrap_or_else(|| {
        tracing::warn!("No connection info on request; using unspecified address");
        IpAddr::V4(Ipv4Addr::UNSPECIFIED)
    });
    chain.process(request, peer, |request| next.run(request)).await
}
