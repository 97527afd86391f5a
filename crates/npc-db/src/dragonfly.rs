//! `Dragonfly` (Redis-compatible) session store.
//!
//! # Key Patterns
//!
//! | Pattern | Type | Description |
//! |---------|------|-------------|
//! | `session:{id}:state` | JSON | Full session state |
//! | `sessions` | Set | Identifiers of stored sessions |
//!
//! A save writes the state key and the `sessions` index in one
//! `MULTI`/`EXEC` transaction, and a delete removes both the same way, so
//! the index never names a session whose state was not written.

use fred::prelude::*;
use fred::types::{Expiration, Value};
use npc_types::{SessionId, SessionState};
use serde::de::DeserializeOwned;

use crate::error::StoreError;
use crate::store::SessionStore;

/// Set holding the identifiers of every stored session.
const SESSION_INDEX_KEY: &str = "sessions";

/// Connection handle to a `Dragonfly` (Redis-compatible) instance.
#[derive(Clone)]
pub struct DragonflyPool {
    client: Client,
}

impl DragonflyPool {
    /// Connect to `Dragonfly` at the given URL.
    ///
    /// The URL should follow the Redis URL scheme:
    /// `redis://host:port` or `redis://host:port/db`
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Config`] if the URL cannot be parsed.
    /// Returns [`StoreError::Dragonfly`] if the connection fails.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let config = Config::from_url(url)
            .map_err(|e| StoreError::Config(format!("Invalid Dragonfly URL: {e}")))?;

        let client = Builder::from_config(config).build()?;
        client.init().await?;

        tracing::info!("Connected to Dragonfly");
        Ok(Self { client })
    }

    /// Read the value at `key` and deserialize from JSON.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        let value: Option<String> = self.client.get(key).await?;
        value
            .map(|s| serde_json::from_str(&s))
            .transpose()
            .map_err(StoreError::from)
    }
}

impl core::fmt::Debug for DragonflyPool {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DragonflyPool").finish_non_exhaustive()
    }
}

/// Session store keeping each session under `session:{id}:state`.
#[derive(Debug, Clone)]
pub struct DragonflySessionStore {
    pool: DragonflyPool,
    ttl_secs: Option<i64>,
}

impl DragonflySessionStore {
    /// Create a store over an existing connection.
    pub const fn new(pool: DragonflyPool) -> Self {
        Self {
            pool,
            ttl_secs: None,
        }
    }

    /// Connect to `Dragonfly` and create a store.
    ///
    /// # Errors
    ///
    /// See [`DragonflyPool::connect`].
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        Ok(Self::new(DragonflyPool::connect(url).await?))
    }

    /// Expire session keys after `ttl_secs` seconds; `0` disables expiry.
    #[must_use]
    pub fn with_ttl_secs(mut self, ttl_secs: u64) -> Self {
        self.ttl_secs = (ttl_secs > 0).then(|| i64::try_from(ttl_secs).unwrap_or(i64::MAX));
        self
    }

    fn state_key(id: &SessionId) -> String {
        format!("session:{id}:state")
    }
}

impl SessionStore for DragonflySessionStore {
    async fn load(&self, id: &SessionId) -> Result<SessionState, StoreError> {
        self.pool
            .get_json(&Self::state_key(id))
            .await?
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    async fn save(&self, id: &SessionId, state: &SessionState) -> Result<(), StoreError> {
        let json = serde_json::to_string(state)?;
        let trx = self.pool.client.multi();
        let _: () = trx
            .set(
                Self::state_key(id),
                json.as_str(),
                self.ttl_secs.map(Expiration::EX),
                None,
                false,
            )
            .await?;
        let _: () = trx.sadd(SESSION_INDEX_KEY, id.as_str()).await?;
        let _: Value = trx.exec(true).await?;
        tracing::debug!(session_id = %id, version = state.version, "Saved session to Dragonfly");
        Ok(())
    }

    async fn delete(&self, id: &SessionId) -> Result<(), StoreError> {
        let trx = self.pool.client.multi();
        let _: () = trx.del(Self::state_key(id)).await?;
        let _: () = trx.srem(SESSION_INDEX_KEY, id.as_str()).await?;
        let (removed, _): (u32, u32) = trx.exec(true).await?;
        if removed == 0 {
            return Err(StoreError::NotFound(id.clone()));
        }
        Ok(())
    }

    async fn list(&self) -> Result<Vec<SessionId>, StoreError> {
        let mut members: Vec<String> = self.pool.client.smembers(SESSION_INDEX_KEY).await?;
        members.sort();
        Ok(members.into_iter().map(SessionId::from).collect())
    }
}
