//! The session store contract and backend selection.
//!
//! The orchestrator depends only on [`SessionStore`]. Which backend sits
//! behind it is decided once, from [`PersistenceConfig`], by
//! [`StoreBackend::connect`].

use std::future::Future;

use npc_types::{SessionId, SessionState};

use crate::config::{PersistenceConfig, StoreKind};
use crate::dragonfly::DragonflySessionStore;
use crate::error::StoreError;
use crate::memory::MemoryStore;
use crate::postgres::{PostgresConfig, PostgresPool, PostgresSessionStore};

/// Durable home of session state.
///
/// `save` must be atomic per call: after it returns, a `load` observes
/// either the complete new state or, on error, the complete previous one.
pub trait SessionStore: Send + Sync {
    /// Load the state of a session.
    ///
    /// Returns [`StoreError::NotFound`] when nothing is stored for `id`.
    fn load(&self, id: &SessionId) -> impl Future<Output = Result<SessionState, StoreError>> + Send;

    /// Store the complete state of a session, replacing any previous state.
    fn save(
        &self,
        id: &SessionId,
        state: &SessionState,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Remove the state of a session.
    ///
    /// Returns [`StoreError::NotFound`] when nothing is stored for `id`.
    fn delete(&self, id: &SessionId) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Identifiers of every stored session.
    fn list(&self) -> impl Future<Output = Result<Vec<SessionId>, StoreError>> + Send;
}

/// The configured session store.
///
/// An enum rather than a trait object so the async trait methods stay
/// statically dispatched.
#[derive(Clone)]
pub enum StoreBackend {
    /// Volatile in-process store.
    Memory(MemoryStore),
    /// Durable `PostgreSQL` store.
    Postgres(PostgresSessionStore),
    /// `Dragonfly` key-value store.
    Dragonfly(DragonflySessionStore),
}

impl StoreBackend {
    /// Build the backend selected by `config`, connecting (and migrating)
    /// as needed.
    pub async fn connect(config: &PersistenceConfig) -> Result<Self, StoreError> {
        let backend = match config.kind {
            StoreKind::Memory => Self::Memory(MemoryStore::new()),
            StoreKind::Postgres => {
                let pg_config = PostgresConfig::new(&config.postgres_url)
                    .with_max_connections(config.max_connections);
                let pool = PostgresPool::connect(&pg_config).await?;
                if config.run_migrations {
                    pool.run_migrations().await?;
                }
                Self::Postgres(PostgresSessionStore::new(pool))
            }
            StoreKind::Dragonfly => Self::Dragonfly(
                DragonflySessionStore::connect(&config.dragonfly_url)
                    .await?
                    .with_ttl_secs(config.dragonfly_ttl_secs),
            ),
        };
        tracing::info!(backend = %config.kind, "Session store ready");
        Ok(backend)
    }

    /// Which backend this is.
    pub const fn kind(&self) -> StoreKind {
        match self {
            Self::Memory(_) => StoreKind::Memory,
            Self::Postgres(_) => StoreKind::Postgres,
            Self::Dragonfly(_) => StoreKind::Dragonfly,
        }
    }
}

impl core::fmt::Debug for StoreBackend {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_tuple("StoreBackend").field(&self.kind()).finish()
    }
}

impl SessionStore for StoreBackend {
    async fn load(&self, id: &SessionId) -> Result<SessionState, StoreError> {
        match self {
            Self::Memory(s) => s.load(id).await,
            Self::Postgres(s) => s.load(id).await,
            Self::Dragonfly(s) => s.load(id).await,
        }
    }

    async fn save(&self, id: &SessionId, state: &SessionState) -> Result<(), StoreError> {
        match self {
            Self::Memory(s) => s.save(id, state).await,
            Self::Postgres(s) => s.save(id, state).await,
            Self::Dragonfly(s) => s.save(id, state).await,
        }
    }

    async fn delete(&self, id: &SessionId) -> Result<(), StoreError> {
        match self {
            Self::Memory(s) => s.delete(id).await,
            Self::Postgres(s) => s.delete(id).await,
            Self::Dragonfly(s) => s.delete(id).await,
        }
    }

    async fn list(&self) -> Result<Vec<SessionId>, StoreError> {
        match self {
            Self::Memory(s) => s.list().await,
            Self::Postgres(s) => s.list().await,
            Self::Dragonfly(s) => s.list().await,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_backend_from_config() {
        let store = StoreBackend::connect(&PersistenceConfig::memory()).await.unwrap();
        assert_eq!(store.kind(), StoreKind::Memory);

        let state = SessionState::new("village", "Village");
        store.save(&state.id, &state).await.unwrap();
        assert_eq!(store.load(&state.id).await.unwrap(), state);
        assert_eq!(store.list().await.unwrap(), vec![state.id.clone()]);
    }
}
