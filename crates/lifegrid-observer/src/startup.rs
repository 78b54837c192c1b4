//! Server startup helper for embedding in the engine.
//!
//! [`spawn_observer`] binds the listener eagerly, so an address problem is
//! reported to the caller, and then serves on a background Tokio task so the
//! server runs concurrently with the simulation.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::server::{self, ServerConfig, ServerError};
use crate::state::AppState;

/// Errors that can occur when spawning the server.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    /// The server failed to bind or start.
    #[error("server start error: {0}")]
    Server(#[from] ServerError),
}

/// A server running on a background task.
#[derive(Debug)]
pub struct RunningObserver {
    /// The address actually bound.
    pub addr: SocketAddr,
    /// The serving task. Abort it to shut the server down.
    pub task: JoinHandle<()>,
}

/// Bind the server and serve it on a background task.
///
/// Serve failures after a successful bind are logged by the task.
///
/// # Errors
///
/// Returns [`StartupError::Server`] if the address is invalid or cannot
/// be bound.
pub async fn spawn_observer(
    config: &ServerConfig,
    state: Arc<AppState>,
) -> Result<RunningObserver, StartupError> {
    let listener = server::bind(config).await?;
    let addr = listener
        .local_addr()
        .map_err(|source| ServerError::Serve { source })?;

    let task = tokio::spawn(async move {
        if let Err(e) = server::serve(listener, state).await {
            error!(error = %e, "Visualization server exited with error");
        }
    });

    info!(%addr, "Visualization server spawned on background task");
    Ok(RunningObserver { addr, task })
}
