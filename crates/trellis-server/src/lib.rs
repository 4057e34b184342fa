//! HTTP + WebSocket server

pub mod router;
pub mod handlers;
pub mod websocket;
pub mod assets;

use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::info;
use trellis_core::{Broadcaster, GraphCache};
use trellis_indexer::{RecomputeCoordinator, RequestOutcome, Trigger};

use crate::router::create_router;

/// Where the server listens
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

/// State shared by every request handler and websocket connection
#[derive(Debug)]
pub struct ServerState {
    pub coordinator: Arc<RecomputeCoordinator>,
}

impl ServerState {
    pub fn new(coordinator: Arc<RecomputeCoordinator>) -> Self {
        ServerState { coordinator }
    }

    pub fn cache(&self) -> &GraphCache {
        self.coordinator.cache()
    }

    pub fn broadcaster(&self) -> &Broadcaster {
        self.coordinator.broadcaster()
    }

    pub fn request_reload(&self) -> RequestOutcome {
        self.coordinator.request_recompute(Trigger::ClientReload)
    }
}

pub struct TrellisServer {
    state: Arc<ServerState>,
    config: ServerConfig,
}

impl TrellisServer {
    pub fn new(coordinator: Arc<RecomputeCoordinator>, config: ServerConfig) -> Self {
        TrellisServer {
            state: Arc::new(ServerState::new(coordinator)),
            config,
        }
    }

    pub fn state(&self) -> Arc<ServerState> {
        Arc::clone(&self.state)
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Bind the configured address and serve until Ctrl-C.
    pub async fn start(self) -> anyhow::Result<()> {
        let addr = self.config.addr();
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("failed to bind {}", addr))?;
        self.serve(listener).await
    }

    /// Serve on an already bound listener until Ctrl-C.
    pub async fn serve(self, listener: TcpListener) -> anyhow::Result<()> {
        let local = listener.local_addr()?;
        info!("Server running at http://{}", local);

        axum::serve(listener, create_router(self.state))
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("server terminated unexpectedly")
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}
