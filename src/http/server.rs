//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Build the business router (built-in handlers or upstream forwarding)
//! - Wire up middleware (request ID, timeout, filter chain)
//! - Serve until shutdown, draining in-flight requests

use axum::{
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
};

use crate::admin::{admin_router, AdminState};
use crate::config::GuardConfig;
use crate::http::chain::{filter_chain_middleware, FilterChain};
use crate::http::upstream::{proxy_handler, Upstream};
use crate::lifecycle::Shutdown;
use crate::observability::{metrics, MetricsSink, ObservabilitySink};
use crate::security::{PolicyError, SecurityState};

const BLOCKED_GAUGE_REFRESH: Duration = Duration::from_secs(15);

/// Errors raised while assembling the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid security policy: {0}")]
    Policy(#[from] PolicyError),

    #[error("invalid upstream address '{0}'")]
    InvalidUpstream(String),
}

/// HTTP server hosting the filter chain.
pub struct HttpServer {
    router: Router,
    chain: Arc<FilterChain>,
    config: GuardConfig,
    started_at: Instant,
}

impl HttpServer {
    /// Create a server with the system clock, in-memory counters and metrics sink.
    pub fn new(config: GuardConfig) -> Result<Self, ServerError> {
        let security = Arc::new(SecurityState::from_config(&config)?);
        let business = business_router(&config)?;
        Ok(Self::with_parts(config, security, Arc::new(MetricsSink), business))
    }

    /// Create a server around explicit components.
    pub fn with_parts(
        config: GuardConfig,
        security: Arc<SecurityState>,
        sink: Arc<dyn ObservabilitySink>,
        business: Router,
    ) -> Self {
        let chain = Arc::new(FilterChain::from_config(&config, security, sink));
        let router = Self::build_router(&config, chain.clone(), business);
        Self {
            router,
            chain,
            config,
            started_at: Instant::now(),
        }
    }

    /// Wrap the business router with the chain and the tower layers.
    #[allow(deprecated)]
    fn build_router(config: &GuardConfig, chain: Arc<FilterChain>, business: Router) -> Router {
        business
            .layer(middleware::from_fn_with_state(chain, filter_chain_middleware))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// The fully layered router.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn security(&self) -> &Arc<SecurityState> {
        self.chain.security()
    }

    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    /// Admin API over the same security state.
    pub fn admin_router(&self) -> Router {
        admin_router(AdminState {
            security: self.security().clone(),
            api_key: self.config.admin.api_key.as_str().into(),
            filters: self.chain.filter_names().into(),
            started_at: self.started_at,
        })
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(self, listener: TcpListener, shutdown: Shutdown) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            filters = ?self.chain.filter_names(),
            "HTTP server starting"
        );

        if self.config.observability.metrics_enabled {
            let security = self.security().clone();
            let stop = shutdown.signalled();
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(BLOCKED_GAUGE_REFRESH);
                tokio::pin!(stop);
                loop {
                    tokio::select! {
                        _ = ticker.tick() => metrics::set_blocked_clients(security.ddos.blocked_clients().len()),
                        _ = &mut stop => break,
                    }
                }
            });
        }

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown.signalled())
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Routes behind the chain: forwarding when an upstream is configured,
/// otherwise the built-in handlers.
pub fn business_router(config: &GuardConfig) -> Result<Router, ServerError> {
    match &config.upstream.address {
        Some(address) => {
            let upstream = Upstream::new(address)
                .map_err(|_| ServerError::InvalidUpstream(address.clone()))?;
            tracing::info!(upstream = %upstream.authority(), "Forwarding to upstream");
            Ok(Router::new()
                .fallback(proxy_handler)
                .with_state(upstream))
        }
        None => Ok(builtin_router()),
    }
}

fn builtin_router() -> Router {
    Router::new()
        .route("/health", get(health))
        .fallback(not_found)
}

async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "Not found" })))
}
