//! Event submissions, proposed actions, effects and results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::actions::PropertyBag;
use crate::enums::InteractionKind;
use crate::ids::{ActionId, AgentId, EventId, LocationId, SessionId};
use crate::state::{MemoryEntry, WorldEventRecord};

/// Sequence number assumed for events that carry none.
pub const DEFAULT_SEQUENCE: u32 = 1;

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// A caller's request to perform an action in a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventSubmission {
    /// Session the event is addressed to.
    pub session_id: SessionId,
    /// Player or agent performing the action.
    pub source: String,
    /// Entity the action is directed at.
    #[serde(default)]
    pub target: Option<String>,
    /// Action to perform.
    pub action_id: ActionId,
    /// Raw, unvalidated properties.
    #[serde(default)]
    pub properties: PropertyBag,
    /// Declared interaction kind.
    #[serde(alias = "interaction_kind")]
    pub kind: InteractionKind,
    /// Batch the event belongs to within one submission.
    #[serde(default)]
    pub sequence: Option<u32>,
    /// Where the action takes place, if not the actor's location.
    #[serde(default)]
    pub location: Option<LocationId>,
}

impl EventSubmission {
    /// Assign an identifier, turning the submission into an event.
    pub fn into_event(self) -> (SessionId, Event) {
        let event = Event {
            id: EventId::new(),
            source: self.source,
            target: self.target,
            action_id: self.action_id,
            properties: self.properties,
            kind: self.kind,
            sequence: self.sequence,
            location: self.location,
        };
        (self.session_id, event)
    }
}

/// An accepted submission with its identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Event identifier.
    pub id: EventId,
    /// Player or agent performing the action.
    pub source: String,
    /// Entity the action is directed at.
    pub target: Option<String>,
    /// Action to perform.
    pub action_id: ActionId,
    /// Raw, unvalidated properties.
    pub properties: PropertyBag,
    /// Declared interaction kind.
    pub kind: InteractionKind,
    /// Batch the event belongs to.
    pub sequence: Option<u32>,
    /// Where the action takes place.
    pub location: Option<LocationId>,
}

impl Event {
    /// The sequence number, defaulting to [`DEFAULT_SEQUENCE`].
    pub fn sequence_number(&self) -> u32 {
        self.sequence.unwrap_or(DEFAULT_SEQUENCE)
    }
}

/// A follow-up action proposed by the decision capability. Untrusted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposedAction {
    /// Action to perform.
    pub action_id: ActionId,
    /// Entity the action is directed at.
    #[serde(default)]
    pub target: Option<String>,
    /// Raw properties.
    #[serde(default)]
    pub properties: PropertyBag,
    /// Batch the proposal belongs to.
    #[serde(default)]
    pub sequence: Option<u32>,
}

impl ProposedAction {
    /// A proposal with no target and no properties.
    pub fn new(action_id: impl Into<ActionId>) -> Self {
        Self {
            action_id: action_id.into(),
            target: None,
            properties: PropertyBag::new(),
            sequence: None,
        }
    }

    /// The sequence number, defaulting to [`DEFAULT_SEQUENCE`].
    pub fn sequence_number(&self) -> u32 {
        self.sequence.unwrap_or(DEFAULT_SEQUENCE)
    }
}

// ---------------------------------------------------------------------------
// Effects
// ---------------------------------------------------------------------------

/// A single state mutation produced by an accepted action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Effect {
    /// A resource was deducted from an agent.
    ResourceSpent {
        /// Paying agent.
        agent_id: AgentId,
        /// Resource name.
        resource: String,
        /// Amount deducted.
        amount: f64,
    },
    /// An action's cooldown started for an agent.
    CooldownStarted {
        /// Acting agent.
        agent_id: AgentId,
        /// Action used.
        action_id: ActionId,
        /// Time of use.
        at: DateTime<Utc>,
    },
    /// An agent's current activity changed.
    ActivityChanged {
        /// Agent.
        agent_id: AgentId,
        /// New activity.
        activity: String,
    },
    /// An agent's mood changed.
    MoodChanged {
        /// Agent.
        agent_id: AgentId,
        /// New mood.
        mood: String,
    },
    /// An agent moved to another location.
    Moved {
        /// Agent.
        agent_id: AgentId,
        /// Previous location.
        from: Option<LocationId>,
        /// New location.
        to: LocationId,
    },
    /// An agent remembered an interaction.
    MemoryRecorded {
        /// Remembering agent.
        agent_id: AgentId,
        /// Whether the memory is long-term.
        long_term: bool,
        /// The memory itself.
        entry: Box<MemoryEntry>,
    },
    /// An entry was appended to the world event log.
    WorldEventLogged {
        /// The log entry.
        record: Box<WorldEventRecord>,
    },
}

impl Effect {
    /// The agent affected, if the effect targets one.
    pub const fn agent_id(&self) -> Option<&AgentId> {
        match self {
            Self::ResourceSpent { agent_id, .. }
            | Self::CooldownStarted { agent_id, .. }
            | Self::ActivityChanged { agent_id, .. }
            | Self::MoodChanged { agent_id, .. }
            | Self::Moved { agent_id, .. }
            | Self::MemoryRecorded { agent_id, .. } => Some(agent_id),
            Self::WorldEventLogged { .. } => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// A proposed action that failed validation or authorization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalRejection {
    /// Proposed action.
    pub action_id: ActionId,
    /// Proposed target.
    pub target: Option<String>,
    /// Why it was rejected.
    pub reason: String,
}

/// Outcome of an event for one routed agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResult {
    /// Agent the event was routed to.
    pub agent_id: AgentId,
    /// `false` when the decision capability failed or timed out.
    pub success: bool,
    /// Reasoning returned by the decision capability.
    pub reasoning: Option<String>,
    /// Proposals that were accepted and applied.
    pub accepted_actions: Vec<ActionId>,
    /// Effects applied on behalf of this agent.
    pub applied_effects: Vec<Effect>,
    /// Proposals that were rejected.
    pub rejected_actions: Vec<ProposalRejection>,
    /// Capability error, if any.
    pub error: Option<String>,
}

impl AgentResult {
    /// An empty, successful result for `agent_id`.
    pub const fn new(agent_id: AgentId) -> Self {
        Self {
            agent_id,
            success: true,
            reasoning: None,
            accepted_actions: Vec::new(),
            applied_effects: Vec::new(),
            rejected_actions: Vec::new(),
            error: None,
        }
    }
}

/// Structured summary of one processed event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventResult {
    /// Event identifier.
    pub event_id: EventId,
    /// Session the event was applied to.
    pub session_id: SessionId,
    /// Whether the event itself was accepted and committed.
    pub success: bool,
    /// Effects of the triggering action itself.
    pub triggering_effects: Vec<Effect>,
    /// One entry per routed agent, in routing order.
    pub agent_results: Vec<AgentResult>,
    /// `false` when any agent's decision failed or timed out.
    pub processing_complete: bool,
}
