use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use std::net::IpAddr;

use crate::admin::AdminState;
use crate::observability::metrics;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub uptime_secs: u64,
    pub filters: Vec<&'static str>,
    pub tracked_clients: usize,
    pub blocked_clients: usize,
    pub counters: usize,
}

#[derive(Serialize)]
pub struct BlockedClientView {
    pub ip: IpAddr,
    pub score: u32,
    pub remaining_secs: u64,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    let blocked = state.security.ddos.blocked_clients().len();
    metrics::set_blocked_clients(blocked);

    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        uptime_secs: state.started_at.elapsed().as_secs(),
        filters: state.filters.to_vec(),
        tracked_clients: state.security.ddos.tracked_clients(),
        blocked_clients: blocked,
        counters: state.security.counters.len(),
    })
}

pub async fn get_blocked(State(state): State<AdminState>) -> Json<Vec<BlockedClientView>> {
    let blocked = state.security.ddos.blocked_clients();
    metrics::set_blocked_clients(blocked.len());

    Json(
        blocked
            .into_iter()
            .map(|b| BlockedClientView {
                ip: b.ip,
                score: b.score,
                remaining_secs: b.remaining.as_secs(),
            })
            .collect(),
    )
}

pub async fn delete_blocked(State(state): State<AdminState>, Path(ip): Path<IpAddr>) -> Response {
    if state.security.ddos.unblock(ip) {
        metrics::set_blocked_clients(state.security.ddos.blocked_clients().len());
        StatusCode::NO_CONTENT.into_response()
    } else {
        (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Client is not tracked" })),
        )
            .into_response()
    }
}
