//! Agent decision capability contract and stub implementation.
//!
//! When an event reaches an agent, the orchestrator asks a
//! [`DecisionCapability`] what the agent does in response. The capability
//! could be a language-model service, a scripted bot or a test stub; the
//! engine treats whatever it returns as untrusted proposals and re-checks
//! every one of them before applying it.
//!
//! The [`AcknowledgeDecision`] stub always returns an empty decision, which
//! lets the validation and routing core run end-to-end without any
//! external service.

use std::future::Future;
use std::time::Duration;

use npc_types::{
    ActionDefinition, AgentId, AgentState, Event, ProposedAction, ValidatedProperties, WorldState,
};
use serde::{Deserialize, Serialize};
use tokio::time::timeout;

/// Errors that can occur while obtaining a decision.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecisionError {
    /// The capability did not respond within the deadline.
    #[error("agent {agent_id} timed out (deadline: {deadline_ms}ms)")]
    Timeout {
        /// The agent that timed out.
        agent_id: AgentId,
        /// The deadline in milliseconds.
        deadline_ms: u64,
    },

    /// The capability failed.
    #[error("decision capability error: {message}")]
    Internal {
        /// Description of the error.
        message: String,
    },
}

/// Everything the capability gets to see. All fields are snapshots; the
/// capability cannot reach live session state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecisionRequest {
    /// The agent deciding.
    pub agent: AgentState,
    /// The event the agent reacts to.
    pub event: Event,
    /// Validated properties of the triggering action.
    pub properties: ValidatedProperties,
    /// The world as the agent sees it.
    pub world: WorldState,
    /// Actions the agent may propose.
    pub available_actions: Vec<ActionDefinition>,
}

/// What an agent decided to do.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    /// Free-form explanation.
    #[serde(default)]
    pub reasoning: Option<String>,
    /// Follow-up actions, in the order the agent wants them.
    #[serde(default)]
    pub proposed_actions: Vec<ProposedAction>,
}

impl Decision {
    /// A decision that does nothing.
    pub fn acknowledge(reasoning: impl Into<String>) -> Self {
        Self {
            reasoning: Some(reasoning.into()),
            proposed_actions: Vec::new(),
        }
    }
}

/// A source of agent decisions.
pub trait DecisionCapability: Send + Sync {
    /// Decide how `request.agent` reacts to `request.event`.
    fn decide(
        &self,
        request: &DecisionRequest,
    ) -> impl Future<Output = Result<Decision, DecisionError>> + Send;
}

/// Run `capability.decide` with a deadline.
pub async fn decide_with_timeout<D: DecisionCapability>(
    capability: &D,
    request: &DecisionRequest,
    deadline: Duration,
) -> Result<Decision, DecisionError> {
    match timeout(deadline, capability.decide(request)).await {
        Ok(result) => result,
        Err(_) => Err(DecisionError::Timeout {
            agent_id: request.agent.id.clone(),
            deadline_ms: u64::try_from(deadline.as_millis()).unwrap_or(u64::MAX),
        }),
    }
}

/// A decision capability that acknowledges every event and proposes nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcknowledgeDecision;

impl AcknowledgeDecision {
    /// Create a new acknowledging capability.
    pub const fn new() -> Self {
        Self
    }
}

impl DecisionCapability for AcknowledgeDecision {
    async fn decide(&self, request: &DecisionRequest) -> Result<Decision, DecisionError> {
        Ok(Decision::acknowledge(format!(
            "{} acknowledges {}",
            request.agent.id, request.event.action_id
        )))
    }
}
