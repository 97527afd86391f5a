//! Session persistence for the NPC engine.
//!
//! The orchestrator depends on the three-method [`SessionStore`] contract
//! (plus `list`). Three backends implement it:
//!
//! ```text
//! StoreBackend::connect(&PersistenceConfig)
//!     |
//!     +-- memory    --> MemoryStore            (volatile, in-process)
//!     +-- postgres  --> PostgresSessionStore   (npc_sessions table, JSONB)
//!     +-- dragonfly --> DragonflySessionStore  (session:{id}:state keys)
//! ```
//!
//! # Modules
//!
//! - [`store`] -- The [`SessionStore`] trait and [`StoreBackend`] selection
//! - [`memory`] -- In-memory store
//! - [`postgres`] -- `PostgreSQL` pool and store
//! - [`dragonfly`] -- `Dragonfly` (Redis-compatible) pool and store
//! - [`config`] -- Backend selection and connection settings
//! - [`error`] -- Shared error type

pub mod config;
pub mod dragonfly;
pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use config::{PersistenceConfig, StoreKind};
pub use dragonfly::{DragonflyPool, DragonflySessionStore};
pub use error::StoreError;
pub use memory::MemoryStore;
pub use postgres::{PostgresConfig, PostgresPool, PostgresSessionStore};
pub use store::{SessionStore, StoreBackend};
