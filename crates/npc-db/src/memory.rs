//! Volatile in-process session store.
//!
//! State lives only as long as the process. Each `save` replaces the whole
//! entry under one write lock, so it is atomic per call.

use std::collections::BTreeMap;
use std::sync::Arc;

use npc_types::{SessionId, SessionState};
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::store::SessionStore;

/// In-memory session store. Clones share the same underlying map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    sessions: Arc<RwLock<BTreeMap<SessionId, SessionState>>>,
}

impl MemoryStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored sessions.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Whether no sessions are stored.
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

impl SessionStore for MemoryStore {
    async fn load(&self, id: &SessionId) -> Result<SessionState, StoreError> {
        self.sessions
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    async fn save(&self, id: &SessionId, state: &SessionState) -> Result<(), StoreError> {
        self.sessions.write().await.insert(id.clone(), state.clone());
        tracing::debug!(session_id = %id, version = state.version, "Saved session to memory");
        Ok(())
    }

    async fn delete(&self, id: &SessionId) -> Result<(), StoreError> {
        self.sessions
            .write()
            .await
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    async fn list(&self) -> Result<Vec<SessionId>, StoreError> {
        Ok(self.sessions.read().await.keys().cloned().collect())
    }
}
