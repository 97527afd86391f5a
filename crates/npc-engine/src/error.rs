//! Error types for the engine binary.
//!
//! [`AppError`] wraps every failure mode during startup and while serving
//! submissions, so `main` can propagate with `?`.

/// Top-level error for the engine binary.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: npc_core::ConfigError,
    },

    /// A session store could not be reached.
    #[error("store error: {source}")]
    Store {
        /// The underlying store error.
        #[from]
        source: npc_db::StoreError,
    },

    /// A session could not be created or restored.
    #[error("engine error: {source}")]
    Engine {
        /// The underlying engine error.
        #[from]
        source: npc_core::EngineError,
    },

    /// The HTTP client for the decision service could not be built.
    #[error("HTTP client error: {source}")]
    Http {
        /// The underlying client error.
        #[from]
        source: reqwest::Error,
    },

    /// Reading submissions or writing results failed.
    #[error("I/O error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// A result could not be serialized.
    #[error("JSON error: {source}")]
    Json {
        /// The underlying serialization error.
        #[from]
        source: serde_json::Error,
    },
}
