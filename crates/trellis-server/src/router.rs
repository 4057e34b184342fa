//! Axum router setup for the Trellis server

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    assets::{index_handler, static_handler},
    handlers::{get_graph, health_check, reload},
    websocket::ws_handler,
    ServerState,
};

/// Create the axum router with all routes
pub fn create_router(state: Arc<ServerState>) -> Router {
    Router::new()
        // WebSocket endpoint for real-time updates
        .route("/ws", get(ws_handler))
        // REST API endpoints
        .route("/api/graph", get(get_graph))
        .route("/api/reload", post(reload))
        .route("/api/health", get(health_check))
        // Static file serving
        .route("/", get(index_handler))
        .fallback(static_handler)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
