//! Constraint enforcement.
//!
//! Checks run in a fixed order and the first failure wins:
//! 1. target presence
//! 2. target type
//! 3. cooldown
//! 4. cost affordability
//!
//! Cooldown and cost only apply to agent actors. Players have no tracked
//! resources or cooldowns, so only the target checks apply to them.

use chrono::{DateTime, Utc};
use npc_types::{ActionDefinition, AgentState, SessionState, TargetKind, TargetType};

use crate::error::AuthorizationError;

/// Who is performing an action.
#[derive(Debug, Clone, Copy)]
pub enum Actor<'a> {
    /// An agent of the session.
    Agent(&'a AgentState),
    /// A player, identified by id.
    Player(&'a str),
}

impl Actor<'_> {
    /// Identifier of the actor.
    pub fn id(&self) -> &str {
        match self {
            Self::Agent(agent) => agent.id.as_str(),
            Self::Player(id) => id,
        }
    }
}

/// A target identifier resolved against session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedTarget<'a> {
    /// Target identifier.
    pub id: &'a str,
    /// What the identifier names.
    pub kind: TargetKind,
}

impl<'a> ResolvedTarget<'a> {
    /// Resolve `id` against a session. Unknown identifiers resolve to `None`.
    pub fn resolve(state: &SessionState, id: &'a str) -> Option<Self> {
        state
            .resolve_target(id)
            .map(|kind| ResolvedTarget { id, kind })
    }
}

/// Check whether `actor` may perform `definition` on `target` at `now`.
pub fn authorize(
    definition: &ActionDefinition,
    actor: Actor<'_>,
    target: Option<ResolvedTarget<'_>>,
    now: DateTime<Utc>,
) -> Result<(), AuthorizationError> {
    let action = &definition.id;

    // 1. Target presence
    if definition.requires_target && target.is_none() {
        return Err(AuthorizationError::TargetRequired {
            action: action.clone(),
        });
    }

    // 2. Target type
    if definition.target_type != TargetType::Any
        && let Some(t) = target
    {
        let is_self = t.id == actor.id();
        if !definition.target_type.accepts(t.kind, is_self) {
            return Err(AuthorizationError::TargetTypeMismatch {
                action: action.clone(),
                expected: definition.target_type,
                found: AuthorizationError::found(Some(t.kind)),
            });
        }
    }

    let Actor::Agent(agent) = actor else {
        return Ok(());
    };

    // 3. Cooldown
    if definition.cooldown_secs > 0.0
        && let Some(remaining_secs) = agent.cooldown_remaining(action, definition.cooldown_secs, now)
    {
        return Err(AuthorizationError::OnCooldown {
            action: action.clone(),
            remaining_secs,
        });
    }

    // 4. Cost
    for (resource, need) in &definition.cost {
        let have = agent.resource_level(resource);
        if have < *need {
            return Err(AuthorizationError::InsufficientResource {
                action: action.clone(),
                resource: resource.clone(),
                have,
                need: *need,
            });
        }
    }

    Ok(())
}
