//! Integration tests for Trellis
//!
//! These tests run the real server on an ephemeral port and talk to it the way
//! a viewer does, plus a few invocations of the compiled binary.

use std::net::SocketAddr;
use std::process::Command;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_test::assert_ok;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use trellis_core::{Broadcaster, GraphCache, RecomputeError};
use trellis_indexer::{testing::ScriptedSource, GraphSource, RecomputeCoordinator, Trigger};
use trellis_server::{ServerConfig, TrellisServer};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct TestServer {
    addr: SocketAddr,
    source: Arc<ScriptedSource>,
    coordinator: Arc<RecomputeCoordinator>,
}

impl TestServer {
    async fn start(source: ScriptedSource) -> Self {
        let source = Arc::new(source);
        let coordinator = RecomputeCoordinator::new(
            Arc::clone(&source) as Arc<dyn GraphSource>,
            Arc::new(GraphCache::new()),
            Broadcaster::default(),
        );
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = TrellisServer::new(Arc::clone(&coordinator), ServerConfig::default());
        tokio::spawn(server.serve(listener));

        TestServer { addr, source, coordinator }
    }

    async fn recompute(&self) {
        self.coordinator.request_recompute(Trigger::Startup);
        self.coordinator.wait_idle().await;
    }

    async fn connect(&self) -> Client {
        let (ws, _) = connect_async(format!("ws://{}/ws", self.addr)).await.unwrap();
        ws
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

async fn next_json(ws: &mut Client) -> Value {
    loop {
        let msg = assert_ok!(timeout(Duration::from_secs(5), ws.next()).await)
            .expect("websocket closed")
            .unwrap();
        if let Message::Text(text) = msg {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

async fn send_text(ws: &mut Client, text: &str) {
    ws.send(Message::Text(text.to_string())).await.unwrap();
}

/// A client connecting after the first recompute is seeded with exactly that graph
#[tokio::test]
async fn test_new_client_is_seeded_then_receives_updates() {
    let source = ScriptedSource::new();
    source.push_ok(vec![json!({"id": 1})]);
    source.push_ok(vec![json!({"id": 2}), json!({"id": 3})]);
    let server = TestServer::start(source).await;
    server.recompute().await;

    let mut ws = server.connect().await;
    let seed = next_json(&mut ws).await;
    assert_eq!(seed["type"], "graph");
    assert_eq!(seed["data"], json!([{"id": 1}]));
    assert!(seed["elapsed"].is_u64());

    send_text(&mut ws, r#"{"type":"reload"}"#).await;
    let update = next_json(&mut ws).await;
    assert_eq!(update["type"], "graph");
    assert_eq!(update["data"], json!([{"id": 2}, {"id": 3}]));
}

/// Unknown and malformed messages are dropped without closing the connection
#[tokio::test]
async fn test_ping_is_ignored_and_connection_stays_open() {
    let source = ScriptedSource::new();
    source.push_ok(vec![json!("first")]);
    source.push_ok(vec![json!("second")]);
    let server = TestServer::start(source).await;
    server.recompute().await;

    let mut ws = server.connect().await;
    next_json(&mut ws).await;

    send_text(&mut ws, r#"{"type":"ping"}"#).await;
    send_text(&mut ws, "definitely not json").await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(server.source.calls(), 1);

    send_text(&mut ws, r#"{"type":"reload"}"#).await;
    let update = next_json(&mut ws).await;
    assert_eq!(update["data"], json!(["second"]));
    assert_eq!(server.source.calls(), 2);
}

/// A failing tool run reaches every client as an error while the cache keeps the old graph
#[tokio::test]
async fn test_failure_is_broadcast_and_graph_is_kept() {
    let source = ScriptedSource::new();
    source.push_ok(vec![json!({"id": "stable"})]);
    source.push_err(RecomputeError::ExternalTool {
        code: Some(2),
        stderr: "boom".to_string(),
    });
    let server = TestServer::start(source).await;
    server.recompute().await;

    let mut first = server.connect().await;
    let mut second = server.connect().await;
    next_json(&mut first).await;
    next_json(&mut second).await;

    let http = reqwest::Client::new();
    let response = http.post(server.url("/api/reload")).send().await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::ACCEPTED);

    for ws in [&mut first, &mut second] {
        let msg = next_json(ws).await;
        assert_eq!(msg["type"], "error");
        assert!(msg["message"].as_str().unwrap().contains("boom"));
    }

    server.coordinator.wait_idle().await;
    let graph: Value = http
        .get(server.url("/api/graph"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(graph["data"], json!([{"id": "stable"}]));
}

/// Before the first successful recompute there is nothing to seed or serve
#[tokio::test]
async fn test_no_graph_before_first_recompute() {
    let server = TestServer::start(ScriptedSource::new()).await;

    let response = reqwest::get(server.url("/api/graph")).await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::NO_CONTENT);

    let page = reqwest::get(server.url("/")).await.unwrap().text().await.unwrap();
    assert!(page.contains("Trellis"));
}

/// Missing watch directory is a fatal usage error
#[test]
fn test_cli_requires_directory() {
    let output = Command::new(env!("CARGO_BIN_EXE_trellis"))
        .output()
        .expect("Failed to execute command");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Usage"), "stderr: {}", stderr);
}

#[cfg(unix)]
#[test]
fn test_cli_once_prints_flattened_graph() {
    let dir = std::env::temp_dir();
    let output = Command::new(env!("CARGO_BIN_EXE_trellis"))
        .arg("--once")
        .args(["--tool", "sh"])
        .arg("--tool-arg=-c")
        .arg(r#"--tool-arg=echo '[{"id":1}]'; echo '[{"id":2},{"id":3}]'"#)
        .arg(&dir)
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let graph: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(graph, json!([{"id": 1}, {"id": 2}, {"id": 3}]));
}

#[cfg(unix)]
#[test]
fn test_cli_once_reports_tool_failure() {
    let output = Command::new(env!("CARGO_BIN_EXE_trellis"))
        .arg("--once")
        .args(["--tool", "sh"])
        .arg("--tool-arg=-c")
        .arg("--tool-arg=echo boom >&2; exit 2")
        .arg(std::env::temp_dir())
        .output()
        .expect("Failed to execute command");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("exited with code 2: boom"), "stderr: {}", stderr);
}
