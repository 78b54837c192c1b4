//! Error types for the visualization server's HTTP layer.
//!
//! [`ObserverError`] converts into an Axum response with a JSON body via
//! its [`IntoResponse`] implementation.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Errors returned by HTTP handlers.
#[derive(Debug, thiserror::Error)]
pub enum ObserverError {
    /// No route matches the requested path.
    #[error("not found: {0}")]
    NotFound(String),
}

impl IntoResponse for ObserverError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
        };

        let body = serde_json::json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}
