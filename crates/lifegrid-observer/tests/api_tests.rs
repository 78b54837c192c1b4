//! Integration tests for the visualization server endpoints.
//!
//! Tests use Axum's `Router` directly via `tower::ServiceExt` without
//! starting a TCP server, except for the startup and `WebSocket` tests
//! which bind an ephemeral port on loopback.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use lifegrid_observer::router::build_router;
use lifegrid_observer::server::ServerConfig;
use lifegrid_observer::startup::spawn_observer;
use lifegrid_observer::state::AppState;
use lifegrid_types::GridDims;
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tower::ServiceExt;

fn make_test_state() -> Arc<AppState> {
    Arc::new(AppState::new(GridDims::new(12, 8), 64))
}

async fn body_to_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn get(state: Arc<AppState>, path: &str) -> axum::response::Response {
    build_router(state)
        .oneshot(Request::get(path).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

#[tokio::test]
async fn test_index_returns_html() {
    let response = get(make_test_state(), "/").await;

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap();
    assert!(content_type.contains("text/html"));

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let html = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(html.contains("12x8"));
    assert!(html.contains("WAITING FOR VIEWER"));
}

#[tokio::test]
async fn test_status_before_start() {
    let response = get(make_test_state(), "/api/status").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["width"], 12);
    assert_eq!(json["height"], 8);
    assert_eq!(json["started"], false);
    assert_eq!(json["relayed"], 0);
    assert_eq!(json["clients"], 0);
    assert!(json["server_started_at"].is_string());
}

#[tokio::test]
async fn test_status_reflects_gate_and_feed() {
    let state = make_test_state();
    state.relay(String::from("3,4"));
    state.relay(String::from("propagate"));
    assert!(state.gate.open());

    let json = body_to_json(get(Arc::clone(&state), "/api/status").await.into_body()).await;
    assert_eq!(json["started"], true);
    assert_eq!(json["relayed"], 2);
}

#[tokio::test]
async fn test_unknown_route_is_json_404() {
    let response = get(make_test_state(), "/api/agents").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["status"], 404);
    assert_eq!(json["error"], "not found: /api/agents");
}

#[tokio::test]
async fn test_ws_requires_upgrade() {
    let response = get(make_test_state(), "/ws").await;
    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn test_spawned_server_answers_over_tcp() {
    let config = ServerConfig {
        host: String::from("127.0.0.1"),
        port: 0,
    };
    let running = spawn_observer(&config, make_test_state()).await.unwrap();

    let mut stream = tokio::net::TcpStream::connect(running.addr).await.unwrap();
    stream
        .write_all(b"GET /api/status HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();

    assert!(response.starts_with("HTTP/1.1 200"));
    assert!(response.contains("\"width\":12"));
    running.task.abort();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_viewer_frame_opens_gate_and_feed_arrives_in_order() {
    let config = ServerConfig {
        host: String::from("127.0.0.1"),
        port: 0,
    };
    let state = make_test_state();
    let running = spawn_observer(&config, Arc::clone(&state)).await.unwrap();
    let url = format!("ws://{}/ws", running.addr);

    let viewer = tokio::task::spawn_blocking(move || {
        let (mut socket, _) = tungstenite::connect(url).unwrap();
        socket.send(tungstenite::Message::text("start")).unwrap();
        let mut frames = Vec::new();
        while frames.len() < 3 {
            let msg = socket.read().unwrap();
            if msg.is_text() {
                frames.push(msg.to_text().unwrap().to_owned());
            }
        }
        socket.close(None).unwrap();
        frames
    });

    let opened = tokio::time::timeout(Duration::from_secs(5), state.gate.wait())
        .await
        .unwrap();
    assert!(opened);
    assert_eq!(state.clients(), 1);

    for payload in ["1,0", "propagate", "report"] {
        assert_eq!(state.relay(String::from(payload)), 1);
    }

    let frames = tokio::time::timeout(Duration::from_secs(5), viewer)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(frames, vec!["1,0", "propagate", "report"]);
    running.task.abort();
}
