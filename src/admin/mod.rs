//! Admin API: guard status, blocked clients, manual unblock.

pub mod auth;
pub mod handlers;

use axum::{
    middleware,
    routing::{delete, get},
    Router,
};
use std::sync::Arc;
use std::time::Instant;

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::security::SecurityState;

/// State shared by admin handlers.
#[derive(Clone)]
pub struct AdminState {
    pub security: Arc<SecurityState>,
    pub api_key: Arc<str>,
    pub filters: Arc<[&'static str]>,
    pub started_at: Instant,
}

pub fn admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/blocked", get(get_blocked))
        .route("/admin/blocked/{ip}", delete(delete_blocked))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .with_state(state)
}
