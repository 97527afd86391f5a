//! Event routing and session orchestration for the NPC engine.
//!
//! This crate turns submitted events into committed session state:
//!
//! ```text
//! SessionManager::submit(EventSubmission)
//!     -> Session (locked for the whole event)
//!         -> validate / route / authorize
//!         -> DecisionCapability per routed agent (deadline-bounded)
//!         -> re-check every proposal, apply accepted effects
//!         -> SessionStore::save, then swap
//!     -> EventResult
//! ```
//!
//! # Modules
//!
//! - [`manager`] -- [`SessionManager`], the engine's entry point
//! - [`session`] -- A single session and the [`EventPipeline`]
//! - [`router`] -- Event routing and sequence batching
//! - [`decision`] -- [`DecisionCapability`] contract and [`AcknowledgeDecision`]
//! - [`config`] -- Engine and session configuration loading
//! - [`error`] -- [`EngineError`]

pub mod config;
pub mod decision;
pub mod error;
pub mod manager;
pub mod router;
pub mod session;

pub use config::{
    ConfigError, DecisionConfig, EngineConfig, EngineSettings, LoggingConfig, SessionConfig,
};
pub use decision::{
    AcknowledgeDecision, Decision, DecisionCapability, DecisionError, DecisionRequest,
};
pub use error::EngineError;
pub use manager::SessionManager;
pub use router::{RoutingError, route, sequence_batches};
pub use session::{EventPipeline, Session, SessionSummary};
