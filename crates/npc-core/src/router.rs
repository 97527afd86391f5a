//! Event routing.
//!
//! Decides which agents react to an event and in what order submitted
//! events are processed.
//!
//! ```text
//! player_to_agent:  target must be an agent of the session
//! agent_to_agent:   target agent if named
//!                   else the source, when the action targets `self`
//!                   else the source, when the target is a place/thing/player
//! ```

use std::collections::BTreeMap;

use npc_actions::ActionRegistry;
use npc_types::{AgentId, Event, EventId, InteractionKind, SessionState, TargetType};
use tracing::debug;

/// Errors raised while routing an event.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoutingError {
    /// The event names nobody to react to.
    #[error("event {event_id} has no target agents")]
    NoTargets {
        /// The unroutable event.
        event_id: EventId,
    },

    /// The named target is not an agent of the session.
    #[error("target {target:?} is not an agent of this session")]
    TargetNotFound {
        /// The unresolved target identifier.
        target: String,
    },

    /// The source of an agent-to-agent event is not an agent of the session.
    #[error("source agent {source_id:?} is not part of this session")]
    SourceNotFound {
        /// The unresolved source identifier.
        source_id: String,
    },
}

/// Resolve the agents that must react to `event`, in reaction order.
///
/// The result is never empty.
pub fn route(
    state: &SessionState,
    registry: &ActionRegistry,
    event: &Event,
) -> Result<Vec<AgentId>, RoutingError> {
    let targets = match event.kind {
        InteractionKind::PlayerToAgent => {
            let Some(target) = event.target.as_deref() else {
                return Err(RoutingError::NoTargets { event_id: event.id });
            };
            let Some(agent) = state.agents.get(target) else {
                return Err(RoutingError::TargetNotFound {
                    target: target.to_owned(),
                });
            };
            vec![agent.id.clone()]
        }
        InteractionKind::AgentToAgent => {
            let Some(source) = state.agents.get(event.source.as_str()) else {
                return Err(RoutingError::SourceNotFound {
                    source_id: event.source.clone(),
                });
            };
            match event.target.as_deref() {
                Some(target) => {
                    if let Some(agent) = state.agents.get(target) {
                        vec![agent.id.clone()]
                    } else if state.resolve_target(target).is_some() {
                        vec![source.id.clone()]
                    } else {
                        return Err(RoutingError::TargetNotFound {
                            target: target.to_owned(),
                        });
                    }
                }
                None => {
                    let self_targeted = registry
                        .get(&event.action_id)
                        .is_ok_and(|def| matches!(def.target_type, TargetType::SelfTarget));
                    if !self_targeted {
                        return Err(RoutingError::NoTargets { event_id: event.id });
                    }
                    vec![source.id.clone()]
                }
            }
        }
    };

    debug!(
        event_id = %event.id,
        action_id = %event.action_id,
        targets = targets.len(),
        "event routed"
    );
    Ok(targets)
}

/// Group items into batches by sequence number, ascending.
///
/// Items keep their submission order within a batch.
pub fn sequence_batches<T>(items: Vec<T>, sequence: impl Fn(&T) -> u32) -> Vec<(u32, Vec<T>)> {
    let mut batches: BTreeMap<u32, Vec<T>> = BTreeMap::new();
    for item in items {
        batches.entry(sequence(&item)).or_default().push(item);
    }
    batches.into_iter().collect()
}
