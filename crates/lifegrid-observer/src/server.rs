//! Visualization server lifecycle management.
//!
//! [`bind`] resolves and binds the listening socket; [`serve`] runs the
//! Axum router on it until the task is aborted or the runtime shuts down.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;

use crate::router::build_router;
use crate::state::AppState;

/// Address the server listens on.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// The host address to bind to (e.g. `0.0.0.0`).
    pub host: String,
    /// The TCP port to listen on. Port 0 picks a free port.
    pub port: u16,
}

/// Errors that can occur when starting or running the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The configured host and port do not form a socket address.
    #[error("invalid address {addr}: {source}")]
    InvalidAddress {
        /// The rejected `host:port` string.
        addr: String,
        /// The underlying parse error.
        source: std::net::AddrParseError,
    },

    /// Failed to bind to the network address.
    #[error("bind failed on {addr}: {source}")]
    Bind {
        /// The address that could not be bound.
        addr: SocketAddr,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The server encountered a fatal error while serving.
    #[error("serve error: {source}")]
    Serve {
        /// The underlying I/O error.
        source: std::io::Error,
    },
}

/// Resolve the configured address and bind a listener to it.
///
/// # Errors
///
/// Returns [`ServerError::InvalidAddress`] or [`ServerError::Bind`].
pub async fn bind(config: &ServerConfig) -> Result<TcpListener, ServerError> {
    let text = format!("{}:{}", config.host, config.port);
    let addr: SocketAddr = text
        .parse()
        .map_err(|source| ServerError::InvalidAddress { addr: text, source })?;

    TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })
}

/// Serve the router on an already bound listener.
///
/// # Errors
///
/// Returns [`ServerError::Serve`] if the server hits a fatal I/O error.
pub async fn serve(listener: TcpListener, state: Arc<AppState>) -> Result<(), ServerError> {
    let router = build_router(state);
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "Visualization server listening");
    }
    axum::serve(listener, router)
        .await
        .map_err(|source| ServerError::Serve { source })
}
