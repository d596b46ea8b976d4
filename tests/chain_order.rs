//! Ordering and failure containment of the orchestrator, with custom filters.

use activation_guard::config::{FailureMode, GuardConfig};
use activation_guard::http::{filter_chain_middleware, Action, Filter, FilterChain, FilterError, RequestContext};
use activation_guard::observability::ChainEvent;
use activation_guard::security::SecurityState;
use axum::{
    body::Body,
    extract::connect_info::MockConnectInfo,
    http::{Request, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    Router,
};
use std::net::SocketAddr;
use std::sync::atomic::AtomicUsize;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

mod common;
use common::{body_json, business_router, RecordingSink};

type Trace = Arc<Mutex<Vec<String>>>;

/// Records when its hooks run; optionally answers or fails.
struct Probe {
    name: &'static str,
    trace: Trace,
    behavior: Behavior,
    mode: FailureMode,
}

#[derive(Clone, Copy)]
enum Behavior {
    Pass,
    Answer,
    Reject,
    Panic,
    Fail,
    FailOnResponse,
}

impl Probe {
    fn boxed(name: &'static str, trace: &Trace, behavior: Behavior, mode: FailureMode) -> Box<dyn Filter> {
        Box::new(Self {
            name,
            trace: trace.clone(),
            behavior,
            mode,
        })
    }
}

impl Filter for Probe {
    fn name(&self) -> &'static str {
        self.name
    }

    fn failure_mode(&self) -> FailureMode {
        self.mode
    }

    fn on_request(&self, _ctx: &mut RequestContext) -> Result<Action, FilterError> {
        self.trace.lock().unwrap().push(format!("{}:request", self.name));
        match self.behavior {
            Behavior::Answer => Ok(Action::Respond((StatusCode::ACCEPTED, "answered").into_response())),
            Behavior::Reject => Err(FilterError::UntrustedHost),
            Behavior::Panic => panic!("probe exploded"),
            Behavior::Fail => Err(FilterError::Internal("probe failed".to_string())),
            Behavior::Pass | Behavior::FailOnResponse => Ok(Action::Forward),
        }
    }

    fn on_response(&self, _ctx: &RequestContext, _response: &mut Response) -> Result<(), FilterError> {
        self.trace.lock().unwrap().push(format!("{}:response", self.name));
        match self.behavior {
            Behavior::FailOnResponse => Err(FilterError::Internal("late failure".to_string())),
            _ => Ok(()),
        }
    }
}

struct Harness {
    router: Router,
    trace: Trace,
    sink: Arc<RecordingSink>,
    hits: Arc<AtomicUsize>,
}

impl Harness {
    fn new(build: impl FnOnce(&Trace) -> Vec<Box<dyn Filter>>) -> Self {
        let config = GuardConfig::default();
        let trace: Trace = Arc::default();
        let sink = Arc::new(RecordingSink::default());
        let hits = Arc::new(AtomicUsize::new(0));

        let security = Arc::new(SecurityState::from_config(&config).unwrap());
        let chain = Arc::new(FilterChain::with_filters(
            &config,
            security,
            sink.clone(),
            build(&trace),
        ));
        let peer: SocketAddr = "192.0.2.1:50000".parse().unwrap();
        let router = business_router(hits.clone())
            .layer(middleware::from_fn_with_state(chain, filter_chain_middleware))
            .layer(MockConnectInfo(peer));

        Self {
            router,
            trace,
            sink,
            hits,
        }
    }

    async fn get(&self) -> Response {
        let request = Request::get("/api/plans").body(Body::empty()).unwrap();
        self.router.clone().oneshot(request).await.unwrap()
    }

    fn trace(&self) -> Vec<String> {
        self.trace.lock().unwrap().clone()
    }

    fn hits(&self) -> usize {
        self.hits.load(std::sync::atomic::Ordering::SeqCst)
    }
}

use Behavior::*;
use FailureMode::{Closed, Open};

#[tokio::test]
async fn test_response_hooks_run_in_reverse_order() {
    let harness = Harness::new(|t| {
        vec![
            Probe::boxed("a", t, Pass, Closed),
            Probe::boxed("b", t, Pass, Closed),
            Probe::boxed("c", t, Pass, Closed),
        ]
    });

    assert_eq!(harness.get().await.status(), StatusCode::OK);
    assert_eq!(
        harness.trace(),
        ["a:request", "b:request", "c:request", "c:response", "b:response", "a:response"]
    );
    assert_eq!(harness.hits(), 1);
}

#[tokio::test]
async fn test_answering_filter_short_circuits() {
    let harness = Harness::new(|t| {
        vec![
            Probe::boxed("a", t, Pass, Closed),
            Probe::boxed("b", t, Answer, Closed),
            Probe::boxed("c", t, Pass, Closed),
        ]
    });

    let response = harness.get().await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    // Only the filters that let the request through see the response
    assert_eq!(harness.trace(), ["a:request", "b:request", "a:response"]);
    assert_eq!(harness.hits(), 0);
}

#[tokio::test]
async fn test_rejection_is_reported() {
    let harness = Harness::new(|t| vec![Probe::boxed("gate", t, Reject, Closed)]);

    let response = harness.get().await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(harness.hits(), 0);
    assert!(matches!(
        harness.sink.events().as_slice(),
        [ChainEvent::Rejected { filter: "gate", reason: "untrusted_host", .. }]
    ));
}

#[tokio::test]
async fn test_panicking_fail_open_filter_is_skipped() {
    let harness = Harness::new(|t| {
        vec![
            Probe::boxed("logging", t, Panic, Open),
            Probe::boxed("guard", t, Pass, Closed),
        ]
    });

    let response = harness.get().await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(harness.hits(), 1);
    assert_eq!(harness.trace(), ["logging:request", "guard:request", "guard:response"]);

    let events = harness.sink.events();
    assert!(matches!(
        events.as_slice(),
        [ChainEvent::FilterFailed { filter: "logging", error }] if error.contains("probe exploded")
    ));
}

#[tokio::test]
async fn test_failing_fail_closed_filter_rejects() {
    let harness = Harness::new(|t| {
        vec![
            Probe::boxed("outer", t, Pass, Closed),
            Probe::boxed("guard", t, Fail, Closed),
        ]
    });

    let response = harness.get().await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(harness.hits(), 0);
    // The internal message is never sent to the client
    assert_eq!(body_json(response).await["error"], "Internal server error");
    assert_eq!(harness.trace(), ["outer:request", "guard:request", "outer:response"]);
}

#[tokio::test]
async fn test_panicking_fail_closed_filter_rejects() {
    let harness = Harness::new(|t| vec![Probe::boxed("guard", t, Panic, Closed)]);

    assert_eq!(harness.get().await.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(harness.hits(), 0);
}

#[tokio::test]
async fn test_response_hook_failure_follows_failure_mode() {
    let harness = Harness::new(|t| vec![Probe::boxed("monitoring", t, FailOnResponse, Open)]);
    assert_eq!(harness.get().await.status(), StatusCode::OK);

    let harness = Harness::new(|t| vec![Probe::boxed("headers", t, FailOnResponse, Closed)]);
    assert_eq!(harness.get().await.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(harness.hits(), 1);
}

#[tokio::test]
async fn test_standard_chain_order() {
    let config = GuardConfig::default();
    let security = Arc::new(SecurityState::from_config(&config).unwrap());
    let chain = FilterChain::from_config(&config, security, Arc::new(RecordingSink::default()));

    assert_eq!(
        chain.filter_names(),
        [
            "logging",
            "security-headers",
            "xss-protection",
            "sqli-protection",
            "ddos-guard",
            "rate-limiter",
            "trusted-host",
            "monitoring",
            "cors",
        ]
    );
}
