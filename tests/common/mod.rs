//! Shared utilities for integration tests.

#![allow(dead_code)]

use activation_guard::clock::ManualClock;
use activation_guard::config::GuardConfig;
use activation_guard::http::HttpServer;
use activation_guard::lifecycle::Shutdown;
use activation_guard::observability::{ChainEvent, ObservabilitySink};
use activation_guard::security::{MemoryCounterStore, SecurityState};
use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{HeaderMap, Request, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tower::ServiceExt;

/// Sink that keeps every event for inspection.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<ChainEvent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<ChainEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl ObservabilitySink for RecordingSink {
    fn record(&self, event: &ChainEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

/// Everything a chain test needs to drive and observe the guard.
pub struct TestApp {
    pub router: Router,
    pub clock: Arc<ManualClock>,
    pub security: Arc<SecurityState>,
    pub sink: Arc<RecordingSink>,
    pub hits: Arc<AtomicUsize>,
}

impl TestApp {
    pub fn new(config: GuardConfig) -> Self {
        let clock = Arc::new(ManualClock::new());
        let security = Arc::new(
            SecurityState::with_backends(&config, clock.clone(), Arc::new(MemoryCounterStore::new()))
                .unwrap(),
        );
        let sink = Arc::new(RecordingSink::default());
        let hits = Arc::new(AtomicUsize::new(0));

        let server = HttpServer::with_parts(
            config,
            security.clone(),
            sink.clone(),
            business_router(hits.clone()),
        );

        Self {
            router: server.router(),
            clock,
            security,
            sink,
            hits,
        }
    }

    /// Send one request as if it came from `peer`.
    pub async fn send(&self, peer: &str, mut request: Request<Body>) -> Response<Body> {
        let addr: SocketAddr = format!("{peer}:40000").parse().unwrap();
        request.extensions_mut().insert(ConnectInfo(addr));
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn get(&self, peer: &str, uri: &str) -> Response<Body> {
        self.send(peer, Request::get(uri).body(Body::empty()).unwrap()).await
    }

    pub fn handler_hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

/// Stand-in for the activation API.
pub fn business_router(hits: Arc<AtomicUsize>) -> Router {
    let plans_hits = hits.clone();
    let orders_hits = hits;
    Router::new()
        .route(
            "/api/plans",
            get(move || {
                let hits = plans_hits.clone();
                async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    Json(json!({ "plans": ["basic", "unlimited"] }))
                }
            }),
        )
        .route(
            "/api/orders",
            post(move |body: String| {
                let hits = orders_hits.clone();
                async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    Json(json!({ "received": body.len() }))
                }
            }),
        )
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Start the guard on an ephemeral port. Returns its address and the shutdown handle.
pub async fn spawn_guard(config: GuardConfig) -> (SocketAddr, Shutdown) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = HttpServer::new(config).unwrap();
    let shutdown = Shutdown::new();

    let handle = shutdown.clone();
    tokio::spawn(async move {
        server.run(listener, handle).await.unwrap();
    });
    (addr, shutdown)
}

/// Start a backend that answers every request with a JSON description of it.
pub async fn start_echo_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let app = Router::new().fallback(|request: Request<Body>| async move {
        let headers: &HeaderMap = request.headers();
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        Json(json!({
            "path": request.uri().path(),
            "forwarded_for": header("x-forwarded-for"),
            "request_id": header("x-request-id"),
        }))
    });

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

/// Start a raw TCP backend that closes the connection without answering.
pub async fn start_broken_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let _ = socket.shutdown().await;
        }
    });
    addr
}
