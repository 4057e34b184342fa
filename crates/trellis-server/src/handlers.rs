//! REST API handlers for the Trellis server

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use trellis_indexer::RequestOutcome;

use crate::{websocket::ServerMessage, ServerState};

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Reload request response
#[derive(Debug, Serialize)]
pub struct ReloadResponse {
    pub status: &'static str,
}

/// Get the cached graph in the same shape as the websocket `graph` message.
/// Answers 204 until the first successful recompute.
pub async fn get_graph(State(state): State<Arc<ServerState>>) -> Response {
    match state.cache().current() {
        Some(snapshot) => Json(ServerMessage::graph(&snapshot)).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

/// Request a recompute, same as a websocket `reload` message
pub async fn reload(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    let status = match state.request_reload() {
        RequestOutcome::Started => "started",
        RequestOutcome::Coalesced => "coalesced",
    };
    (StatusCode::ACCEPTED, Json(ReloadResponse { status }))
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    let health = HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    };
    Json(health)
}
