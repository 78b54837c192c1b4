//! `WebSocket` handler for the live cell feed.
//!
//! Clients connect to `GET /ws` and receive every relayed payload as one
//! text frame, in the order the bridge received it. The first text or
//! binary frame a client sends is routed to the start gate; later frames
//! from the same client are ignored.
//!
//! A client that falls more than the feed capacity behind has already lost
//! payloads. Since cell payloads are toggles, its view can no longer be
//! repaired, so the connection is closed with code 1013 (try again) and
//! the viewer must reconnect.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::ws::{CloseFrame, Message, Utf8Bytes, WebSocket, close_code};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::gate::StartGate;
use crate::state::AppState;

/// Upgrade an HTTP request to a `WebSocket` connection and begin
/// streaming the feed.
///
/// # Route
///
/// `GET /ws`
pub async fn ws_feed(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_ws(socket, state))
}

async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
    let _client = state.client_connected();
    info!(clients = state.clients(), "viewer connected");

    let mut rx = state.subscribe();
    let mut session = Session::new(state.gate.clone());

    loop {
        tokio::select! {
            result = rx.recv() => {
                match forward(result) {
                    Outbound::Frame(payload) => {
                        if socket.send(Message::Text(payload.into())).await.is_err() {
                            debug!("viewer disconnected (send failed)");
                            return;
                        }
                    }
                    Outbound::Lagged(skipped) => {
                        warn!(skipped, "viewer lagged, closing connection");
                        let _ = socket.send(lagged_close()).await;
                        return;
                    }
                    Outbound::Closed => {
                        debug!("feed closed, shutting down WebSocket");
                        return;
                    }
                }
            }
            msg = socket.recv() => {
                match session.inbound(msg) {
                    Inbound::Continue => {}
                    Inbound::Pong(data) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            debug!("viewer disconnected (pong failed)");
                            return;
                        }
                    }
                    Inbound::Close => {
                        info!("viewer disconnected");
                        return;
                    }
                }
            }
        }
    }
}

/// What the connection loop should do with the next feed item.
#[derive(Debug, PartialEq, Eq)]
enum Outbound {
    Frame(String),
    Lagged(u64),
    Closed,
}

fn forward(result: Result<String, RecvError>) -> Outbound {
    match result {
        Ok(payload) => Outbound::Frame(payload),
        Err(RecvError::Lagged(skipped)) => Outbound::Lagged(skipped),
        Err(RecvError::Closed) => Outbound::Closed,
    }
}

fn lagged_close() -> Message {
    Message::Close(Some(CloseFrame {
        code: close_code::AGAIN,
        reason: Utf8Bytes::from_static("viewer fell behind the feed, reconnect"),
    }))
}

/// What the connection loop should do after an inbound frame.
#[derive(Debug, PartialEq, Eq)]
enum Inbound {
    Continue,
    Pong(Bytes),
    Close,
}

/// Per-connection inbound frame handling.
#[derive(Debug)]
struct Session {
    gate: StartGate,
    signalled: bool,
}

impl Session {
    const fn new(gate: StartGate) -> Self {
        Self {
            gate,
            signalled: false,
        }
    }

    fn inbound(&mut self, msg: Option<Result<Message, axum::Error>>) -> Inbound {
        match msg {
            Some(Ok(Message::Text(_) | Message::Binary(_))) => {
                if !self.signalled {
                    self.signalled = true;
                    if self.gate.open() {
                        info!("start signal received from viewer");
                    }
                }
                Inbound::Continue
            }
            Some(Ok(Message::Ping(data))) => Inbound::Pong(data),
            Some(Ok(Message::Pong(_))) => Inbound::Continue,
            Some(Ok(Message::Close(_))) | None => Inbound::Close,
            Some(Err(e)) => {
                debug!(error = %e, "WebSocket error");
                Inbound::Close
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use lifegrid_types::GridDims;

    use super::*;

    fn text(s: &'static str) -> Option<Result<Message, axum::Error>> {
        Some(Ok(Message::Text(s.into())))
    }

    #[test]
    fn first_frame_opens_the_gate() {
        let gate = StartGate::new();
        let mut session = Session::new(gate.clone());
        assert_eq!(session.inbound(text("start")), Inbound::Continue);
        assert!(gate.is_open());
    }

    #[test]
    fn binary_frame_also_opens_the_gate() {
        let gate = StartGate::new();
        let mut session = Session::new(gate.clone());
        let frame = Some(Ok(Message::Binary(Bytes::from_static(b"\x01"))));
        assert_eq!(session.inbound(frame), Inbound::Continue);
        assert!(gate.is_open());
    }

    #[test]
    fn later_frames_are_ignored() {
        let gate = StartGate::new();
        let mut session = Session::new(gate.clone());
        session.inbound(text("go"));
        assert!(session.signalled);
        assert_eq!(session.inbound(text("again")), Inbound::Continue);
        assert!(gate.is_open());
    }

    #[test]
    fn second_viewer_does_not_reopen() {
        let gate = StartGate::new();
        let mut first = Session::new(gate.clone());
        let mut second = Session::new(gate.clone());
        first.inbound(text("go"));
        second.inbound(text("go"));
        assert!(gate.is_open());
        assert!(!gate.open());
    }

    #[test]
    fn ping_is_answered_and_close_ends() {
        let mut session = Session::new(StartGate::new());
        let ping = Some(Ok(Message::Ping(Bytes::from_static(b"hi"))));
        assert_eq!(
            session.inbound(ping),
            Inbound::Pong(Bytes::from_static(b"hi"))
        );
        assert_eq!(session.inbound(None), Inbound::Close);
        assert_eq!(session.inbound(Some(Ok(Message::Close(None)))), Inbound::Close);
    }

    #[test]
    fn ping_does_not_open_the_gate() {
        let gate = StartGate::new();
        let mut session = Session::new(gate.clone());
        session.inbound(Some(Ok(Message::Ping(Bytes::new()))));
        assert!(!gate.is_open());
    }

    #[tokio::test]
    async fn overflowing_the_feed_ends_the_connection() {
        let state = AppState::new(GridDims::new(2, 2), 4);
        let mut rx = state.subscribe();
        for n in 0..6 {
            state.relay(format!("{n},1"));
        }

        assert_eq!(forward(rx.recv().await), Outbound::Lagged(2));
        // The receiver resumes after the gap, which a toggle feed cannot use.
        assert_eq!(forward(rx.recv().await), Outbound::Frame(String::from("2,1")));
    }

    #[test]
    fn lagged_close_asks_the_viewer_to_retry() {
        assert!(matches!(
            lagged_close(),
            Message::Close(Some(CloseFrame {
                code: close_code::AGAIN,
                ..
            }))
        ));
    }

    #[tokio::test]
    async fn closed_feed_ends_the_connection() {
        let state = AppState::new(GridDims::new(2, 2), 4);
        let mut rx = state.subscribe();
        drop(state);
        assert_eq!(forward(rx.recv().await), Outbound::Closed);
    }
}
