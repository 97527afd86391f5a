//! Error type for the session orchestrator.
//!
//! [`EngineError`] is what callers of the [`SessionManager`] see. It wraps
//! the per-stage errors of the action layer and the stores, and adds the
//! session lifecycle failures. Decision capability failures never appear
//! here: they are recovered per agent and reported in the
//! [`EventResult`](npc_types::EventResult).
//!
//! [`SessionManager`]: crate::manager::SessionManager

use npc_actions::{AuthorizationError, EffectError, SchemaError, ValidationError};
use npc_db::StoreError;
use npc_types::{AgentId, SessionId, SessionStatus};

use crate::router::RoutingError;

/// Errors returned by the session orchestrator.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The action is unknown or a definition is malformed.
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    /// The event's properties failed validation.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// The actor may not perform the action right now.
    #[error("authorization error: {0}")]
    Authorization(#[from] AuthorizationError),

    /// The planned effects could not be applied.
    #[error("effect error: {0}")]
    Effect(#[from] EffectError),

    /// The event could not be routed.
    #[error("routing error: {0}")]
    Routing(#[from] RoutingError),

    /// The session store failed; the session state was left unchanged.
    #[error("persistence error: {0}")]
    Persistence(#[from] StoreError),

    /// No session with this id is loaded.
    #[error("session not found: {0}")]
    SessionNotFound(SessionId),

    /// A session with this id already exists.
    #[error("session already exists: {0}")]
    SessionExists(SessionId),

    /// The session does not accept this operation in its current status.
    #[error("session {session_id} is {status}, not active")]
    SessionNotActive {
        /// The session.
        session_id: SessionId,
        /// Its current status.
        status: SessionStatus,
    },

    /// The lifecycle does not allow this transition.
    #[error("session {session_id} cannot move from {from} to {to}")]
    InvalidTransition {
        /// The session.
        session_id: SessionId,
        /// Current status.
        from: SessionStatus,
        /// Requested status.
        to: SessionStatus,
    },

    /// An agent with this id is already in the session.
    #[error("agent already in session: {0}")]
    AgentExists(AgentId),

    /// The agent is not part of the session.
    #[error("agent not found: {0}")]
    AgentNotFound(AgentId),

    /// A batch mixed events for different sessions.
    #[error("event for session {found} submitted in a batch for session {expected}")]
    SessionMismatch {
        /// The session the batch was submitted to.
        expected: SessionId,
        /// The session named by the offending event.
        found: SessionId,
    },
}
