//! WebSocket handling for real-time graph updates

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures_util::{Sink, SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use trellis_core::{GraphCache, GraphEvent, GraphSnapshot, Node};
use trellis_indexer::RequestOutcome;

use crate::ServerState;

/// Server → client messages
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerMessage<'a> {
    Graph { data: &'a [Node], elapsed: u64 },
    Error { message: &'a str },
}

impl<'a> ServerMessage<'a> {
    pub fn graph(snapshot: &'a GraphSnapshot) -> Self {
        ServerMessage::Graph {
            data: snapshot.graph().nodes(),
            elapsed: snapshot.elapsed_ms(),
        }
    }

    pub fn from_event(event: &'a GraphEvent) -> Self {
        match event {
            GraphEvent::Updated(snapshot) => ServerMessage::graph(snapshot),
            GraphEvent::Failed { message, .. } => ServerMessage::Error { message },
        }
    }

    pub fn to_json(&self) -> Option<String> {
        match serde_json::to_string(self) {
            Ok(json) => Some(json),
            Err(e) => {
                warn!("Failed to serialize server message: {}", e);
                None
            }
        }
    }
}

/// Client → server messages. Anything else is logged and dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    Reload,
}

/// Handle WebSocket upgrade requests
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<ServerState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn send<S>(sink: &mut S, message: &ServerMessage<'_>) -> Result<(), S::Error>
where
    S: Sink<Message> + Unpin,
{
    match message.to_json() {
        Some(json) => sink.send(Message::Text(json)).await,
        None => Ok(()),
    }
}

/// Send the cached graph, if there is one. Returns the run it covers, or 0
/// when nothing was sent.
async fn seed<S>(sink: &mut S, cache: &GraphCache) -> Result<u64, S::Error>
where
    S: Sink<Message> + Unpin,
{
    let Some(snapshot) = cache.current() else {
        return Ok(0);
    };
    send(sink, &ServerMessage::graph(&snapshot)).await?;
    debug!(run = snapshot.run(), "Seeded WebSocket client with cached graph");
    Ok(snapshot.run())
}

/// Forward recompute results until the channel closes or the client goes away.
///
/// Events for runs up to `seen` were already covered and are skipped. A lagging
/// receiver is resynchronised with the cached snapshot.
async fn forward_events<S>(
    rx: &mut broadcast::Receiver<GraphEvent>,
    cache: &GraphCache,
    mut seen: u64,
    sink: &mut S,
) where
    S: Sink<Message> + Unpin,
{
    loop {
        match rx.recv().await {
            Ok(event) => {
                if event.run() <= seen {
                    continue;
                }
                seen = event.run();
                if send(sink, &ServerMessage::from_event(&event)).await.is_err() {
                    debug!("Failed to send message to WebSocket client");
                    return;
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!("WebSocket client lagged behind by {} event(s), resending latest graph", skipped);
                let Some(snapshot) = cache.current() else {
                    continue;
                };
                if snapshot.run() <= seen {
                    continue;
                }
                seen = snapshot.run();
                if send(sink, &ServerMessage::graph(&snapshot)).await.is_err() {
                    return;
                }
            }
            Err(broadcast::error::RecvError::Closed) => return,
        }
    }
}

/// Handle an individual WebSocket connection
async fn handle_socket(socket: WebSocket, state: Arc<ServerState>) {
    info!("New WebSocket connection established");

    let (mut sender, mut receiver) = socket.split();

    // Subscribe before reading the cache so no publish can fall in between.
    // Events for runs the seed already covers are skipped.
    let mut rx = state.broadcaster().subscribe();
    let seen = match seed(&mut sender, state.cache()).await {
        Ok(seen) => seen,
        Err(_) => {
            warn!("Failed to send initial graph to WebSocket client");
            return;
        }
    };

    // Spawn a task to handle incoming messages from the client
    let recv_state = Arc::clone(&state);
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => {
                    handle_client_text(&text, &recv_state);
                }
                Message::Binary(bytes) => match std::str::from_utf8(&bytes) {
                    Ok(text) => {
                        handle_client_text(text, &recv_state);
                    }
                    Err(_) => warn!("Ignoring non UTF-8 binary message"),
                },
                Message::Close(_) => {
                    debug!("WebSocket client disconnected");
                    break;
                }
                _ => {}
            }
        }
    });

    // Spawn a task to forward recompute results to the client
    let send_state = Arc::clone(&state);
    let mut send_task = tokio::spawn(async move {
        forward_events(&mut rx, send_state.cache(), seen, &mut sender).await;
    });

    // Wait for either task to complete
    tokio::select! {
        _ = (&mut send_task) => {
            recv_task.abort();
        }
        _ = (&mut recv_task) => {
            send_task.abort();
        }
    }

    info!("WebSocket connection closed");
}

/// Act on one text frame from a client. Returns the reload outcome when the
/// frame was a valid reload request.
pub fn handle_client_text(text: &str, state: &ServerState) -> Option<RequestOutcome> {
    match serde_json::from_str::<ClientMessage>(text) {
        Ok(ClientMessage::Reload) => {
            let outcome = state.request_reload();
            info!("Client requested reload ({:?})", outcome);
            Some(outcome)
        }
        Err(e) => {
            warn!("Invalid message: {}", e);
            None
        }
    }
}
