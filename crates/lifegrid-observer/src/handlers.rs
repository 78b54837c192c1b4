//! HTTP endpoint handlers for the visualization server.
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/` | Minimal HTML status page |
//! | `GET` | `/api/status` | Grid size, gate state, and feed counters |

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::Uri;
use axum::response::{Html, IntoResponse};
use serde::Serialize;

use crate::error::ObserverError;
use crate::state::AppState;

/// JSON body of `GET /api/status`.
#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    /// Grid width in cells.
    pub width: u32,
    /// Grid height in cells.
    pub height: u32,
    /// Whether a viewer has released the start gate.
    pub started: bool,
    /// Payloads relayed to viewers so far.
    pub relayed: u64,
    /// Connected `WebSocket` clients.
    pub clients: usize,
    /// RFC 3339 timestamp of server start.
    pub server_started_at: String,
}

impl StatusResponse {
    fn from_state(state: &AppState) -> Self {
        Self {
            width: state.dims.width,
            height: state.dims.height,
            started: state.gate.is_open(),
            relayed: state.relayed(),
            clients: state.clients(),
            server_started_at: state.created_at.to_rfc3339(),
        }
    }
}

/// Serve a minimal HTML page showing the simulation status.
pub async fn index(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let status = StatusResponse::from_state(&state);
    let phase = if status.started {
        "RUNNING"
    } else {
        "WAITING FOR VIEWER"
    };

    Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <title>Lifegrid</title>
    <style>
        body {{
            background: #0d1117;
            color: #c9d1d9;
            font-family: 'Fira Code', 'Consolas', monospace;
            padding: 2rem;
        }}
        .value {{ color: #58a6ff; font-weight: bold; }}
        .status {{ color: #3fb950; font-weight: bold; }}
    </style>
</head>
<body>
    <h1>Lifegrid</h1>
    <p>Status: <span class="status">{phase}</span></p>
    <p>Grid: <span class="value">{width}x{height}</span></p>
    <p>Viewers: <span class="value">{clients}</span></p>
    <p>Payloads relayed: <span class="value">{relayed}</span></p>
    <p>Connect a WebSocket to <code>/ws</code> and send any frame to start.</p>
</body>
</html>"#,
        width = status.width,
        height = status.height,
        clients = status.clients,
        relayed = status.relayed,
    ))
}

/// Return grid size, gate state, and feed counters.
pub async fn status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    Json(StatusResponse::from_state(&state))
}

/// Fallback for unknown routes.
pub async fn not_found(uri: Uri) -> ObserverError {
    ObserverError::NotFound(uri.path().to_owned())
}
