//! Error types for the session stores.
//!
//! All backends report failures through [`StoreError`], which wraps the
//! underlying [`sqlx`] and [`fred`] errors.

use npc_types::SessionId;

/// Errors that can occur in a session store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No state is stored for the session.
    #[error("session not found in store: {0}")]
    NotFound(SessionId),

    /// A `PostgreSQL` operation failed.
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sqlx::Error),

    /// A `PostgreSQL` migration failed.
    #[error("PostgreSQL migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A `Dragonfly`/Redis operation failed.
    #[error("Dragonfly error: {0}")]
    Dragonfly(#[from] fred::error::Error),

    /// Session state could not be serialized or deserialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}
