//! Effect planning and application.
//!
//! An accepted action is first turned into a list of [`Effect`]s against a
//! read-only view of the session, then the effects are applied to a working
//! copy. Planning never mutates, so a rejected or abandoned action leaves
//! nothing behind.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use npc_types::state::MemoryEntry;
use npc_types::{
    ActionDefinition, AgentId, Effect, EventId, LocationId, PropertyValue, SessionState,
    TargetKind, ValidatedProperties, Visibility, WorldEventRecord,
};
use tracing::debug;

use crate::builtin;
use crate::enforcer::{Actor, ResolvedTarget};
use crate::error::EffectError;

/// Words in an action's text properties that make a memory long-term.
const IMPORTANT_KEYWORDS: [&str; 4] = ["threat", "gift", "quest", "important"];

/// Bounds applied while applying effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffectLimits {
    /// Maximum short-term memories kept per agent.
    pub max_short_term_memories: usize,
    /// Maximum entries kept in the world event log.
    pub max_recent_events: usize,
}

impl Default for EffectLimits {
    fn default() -> Self {
        Self {
            max_short_term_memories: 20,
            max_recent_events: 100,
        }
    }
}

/// Everything needed to plan the effects of one accepted action.
#[derive(Debug, Clone, Copy)]
pub struct ActionContext<'a> {
    /// Event the action belongs to.
    pub event_id: EventId,
    /// Session state the action was authorized against.
    pub state: &'a SessionState,
    /// The action.
    pub definition: &'a ActionDefinition,
    /// Who performs it.
    pub actor: Actor<'a>,
    /// Resolved target, if any.
    pub target: Option<ResolvedTarget<'a>>,
    /// Validated properties.
    pub properties: &'a ValidatedProperties,
    /// Explicit location of the action.
    pub location: Option<&'a LocationId>,
    /// Time of the action.
    pub now: DateTime<Utc>,
}

/// Plan the effects of an accepted action.
pub fn plan(ctx: &ActionContext<'_>) -> Vec<Effect> {
    let mut effects = Vec::new();
    let def = ctx.definition;

    if let Actor::Agent(agent) = ctx.actor {
        for (resource, amount) in &def.cost {
            if *amount > 0.0 {
                effects.push(Effect::ResourceSpent {
                    agent_id: agent.id.clone(),
                    resource: resource.clone(),
                    amount: *amount,
                });
            }
        }
        effects.push(Effect::CooldownStarted {
            agent_id: agent.id.clone(),
            action_id: def.id.clone(),
            at: ctx.now,
        });
        effects.push(Effect::ActivityChanged {
            agent_id: agent.id.clone(),
            activity: activity_for(def),
        });

        if def.affects_mood
            && let Some(mood) = ["emotion", "mood"]
                .iter()
                .find_map(|key| ctx.properties.get(*key).and_then(PropertyValue::as_str))
        {
            effects.push(Effect::MoodChanged {
                agent_id: agent.id.clone(),
                mood: mood.to_owned(),
            });
        }

        if def.id.as_str() == builtin::MOVE {
            if let Some(to) = destination(ctx) {
                effects.push(Effect::Moved {
                    agent_id: agent.id.clone(),
                    from: agent.location.clone(),
                    to,
                });
            } else {
                debug!(agent_id = %agent.id, "move without a known destination");
            }
        }
    }

    if def.creates_memory {
        let entry = MemoryEntry {
            timestamp: ctx.now,
            event_id: ctx.event_id,
            action_id: def.id.clone(),
            source: ctx.actor.id().to_owned(),
            target: ctx.target.map(|t| t.id.to_owned()),
            details: details(ctx.properties),
        };
        let long_term = is_important(ctx);
        for agent_id in participants(ctx) {
            effects.push(Effect::MemoryRecorded {
                agent_id,
                long_term,
                entry: Box::new(entry.clone()),
            });
        }
    }

    if def.visibility != Visibility::Private {
        effects.push(Effect::WorldEventLogged {
            record: Box::new(WorldEventRecord {
                event_id: ctx.event_id,
                timestamp: ctx.now,
                action_id: def.id.clone(),
                source: ctx.actor.id().to_owned(),
                target: ctx.target.map(|t| t.id.to_owned()),
                location: action_location(ctx),
                details: details(ctx.properties),
            }),
        });
    }

    effects
}

/// Apply planned effects to session state.
///
/// Effects naming agents that are not in the session are skipped. Spending
/// is checked up front: if the effects spend more of a resource than an
/// agent holds, nothing is applied.
pub fn apply(
    state: &mut SessionState,
    effects: &[Effect],
    limits: EffectLimits,
) -> Result<(), EffectError> {
    check_spending(state, effects)?;
    for effect in effects {
        match effect {
            Effect::ResourceSpent {
                agent_id,
                resource,
                amount,
            } => {
                if let Some(agent) = state.agents.get_mut(agent_id) {
                    let left = agent.resource_level(resource) - amount;
                    agent.set_resource_level(resource, left);
                }
            }
            Effect::CooldownStarted {
                agent_id,
                action_id,
                at,
            } => {
                if let Some(agent) = state.agents.get_mut(agent_id) {
                    agent.last_used.insert(action_id.clone(), *at);
                }
            }
            Effect::ActivityChanged { agent_id, activity } => {
                if let Some(agent) = state.agents.get_mut(agent_id) {
                    agent.activity.clone_from(activity);
                }
            }
            Effect::MoodChanged { agent_id, mood } => {
                if let Some(agent) = state.agents.get_mut(agent_id) {
                    agent.mood.clone_from(mood);
                }
            }
            Effect::Moved { agent_id, to, .. } => {
                if state.world.move_agent(agent_id, to)
                    && let Some(agent) = state.agents.get_mut(agent_id)
                {
                    agent.location = Some(to.clone());
                }
            }
            Effect::MemoryRecorded {
                agent_id,
                long_term,
                entry,
            } => {
                if let Some(agent) = state.agents.get_mut(agent_id) {
                    agent.memories.record(
                        (**entry).clone(),
                        *long_term,
                        limits.max_short_term_memories,
                    );
                }
            }
            Effect::WorldEventLogged { record } => {
                state
                    .world
                    .log_event((**record).clone(), limits.max_recent_events);
            }
        }
    }
    Ok(())
}

/// Total spending per agent and resource must fit what the agent holds.
fn check_spending(state: &SessionState, effects: &[Effect]) -> Result<(), EffectError> {
    let mut spending: BTreeMap<(&AgentId, &str), f64> = BTreeMap::new();
    for effect in effects {
        if let Effect::ResourceSpent {
            agent_id,
            resource,
            amount,
        } = effect
        {
            *spending.entry((agent_id, resource.as_str())).or_insert(0.0) += amount;
        }
    }
    for ((agent_id, resource), spend) in spending {
        let Some(agent) = state.agents.get(agent_id) else {
            continue;
        };
        let have = agent.resource_level(resource);
        if spend > have {
            return Err(EffectError::Overdraw {
                agent: agent_id.clone(),
                resource: resource.to_owned(),
                have,
                spend,
            });
        }
    }
    Ok(())
}

fn activity_for(def: &ActionDefinition) -> String {
    match def.id.as_str() {
        builtin::SPEAK => "talking".to_owned(),
        builtin::MOVE => "moving".to_owned(),
        other => other.to_owned(),
    }
}

/// Destination of a move: the `destination` property, else a location target.
fn destination(ctx: &ActionContext<'_>) -> Option<LocationId> {
    let named = ctx
        .properties
        .get("destination")
        .and_then(PropertyValue::as_str)
        .or_else(|| {
            ctx.target
                .filter(|t| t.kind == TargetKind::Location)
                .map(|t| t.id)
        })?;
    ctx.state
        .world
        .locations
        .contains_key(named)
        .then(|| LocationId::new(named))
}

fn action_location(ctx: &ActionContext<'_>) -> Option<LocationId> {
    ctx.location.cloned().or_else(|| match ctx.actor {
        Actor::Agent(agent) => agent.location.clone(),
        Actor::Player(_) => match ctx.target {
            Some(t) if t.kind == TargetKind::Agent => ctx
                .state
                .agents
                .get(t.id)
                .and_then(|a| a.location.clone()),
            _ => None,
        },
    })
}

/// Agents that remember the action: the acting agent and an agent target.
fn participants(ctx: &ActionContext<'_>) -> Vec<AgentId> {
    let mut ids = Vec::with_capacity(2);
    if let Actor::Agent(agent) = ctx.actor {
        ids.push(agent.id.clone());
    }
    if let Some(t) = ctx.target
        && t.kind == TargetKind::Agent
        && t.id != ctx.actor.id()
        && let Some(agent) = ctx.state.agents.get(t.id)
    {
        ids.push(agent.id.clone());
    }
    ids
}

fn is_important(ctx: &ActionContext<'_>) -> bool {
    if matches!(ctx.actor, Actor::Player(_)) {
        return true;
    }
    if matches!(ctx.definition.id.as_str(), builtin::MOVE | builtin::REMEMBER) {
        return true;
    }
    ctx.properties
        .values()
        .filter_map(PropertyValue::as_str)
        .map(str::to_lowercase)
        .any(|text| IMPORTANT_KEYWORDS.iter().any(|k| text.contains(k)))
}

fn details(properties: &ValidatedProperties) -> BTreeMap<String, serde_json::Value> {
    properties
        .iter()
        .map(|(k, v)| (k.clone(), v.clone().into_json()))
        .collect()
}
