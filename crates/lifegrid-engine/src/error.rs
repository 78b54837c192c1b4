//! Error types for the engine binary.
//!
//! [`EngineError`] is the top-level error type that wraps all possible
//! failure modes during engine startup, the simulation run, and teardown.

/// Top-level error for the engine binary.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: lifegrid_core::config::ConfigError,
    },

    /// The simulation run failed.
    #[error("runner error: {source}")]
    Runner {
        /// The underlying runner error.
        #[from]
        source: lifegrid_core::runner::RunnerError,
    },

    /// The visualization server failed to start.
    #[error("observer error: {source}")]
    Observer {
        /// The underlying startup error.
        #[from]
        source: lifegrid_observer::StartupError,
    },

    /// The visualization bridge task failed.
    #[error("bridge task failed: {source}")]
    Bridge {
        /// The underlying join error.
        source: tokio::task::JoinError,
    },
}
