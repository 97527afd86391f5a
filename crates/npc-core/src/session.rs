//! A single session and the event pipeline that drives it.
//!
//! Every mutation follows the same commit discipline: work on a copy of the
//! session state, save the copy through the session store, and only then
//! swap it in. A failed save leaves the live state untouched.
//!
//! Event processing, per submission:
//!
//! ```text
//! for each sequence batch (ascending):
//!     reserved <- working copy
//!     for each event: validate + route + authorize against reserved,
//!         then charge its costs and cooldowns to reserved
//!     apply triggering effects to working copy
//!     ask every routed agent for a decision (concurrently, with deadline)
//!     for each agent's proposals, in sequence order:
//!         re-validate + re-authorize against working copy
//!         apply accepted effects to working copy
//! save working copy, then swap
//! ```
//!
//! Events of one batch are not ordered against each other, but they share
//! their actors' budgets: a second event that the first one's cost or
//! cooldown leaves unaffordable fails the submission.

use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use npc_actions::effects::{self, ActionContext};
use npc_actions::{
    ActionRegistry, Actor, EffectLimits, PropertyValidator, ResolvedTarget, authorize,
};
use npc_db::{SessionStore, StoreError};
use npc_types::{
    AgentId, AgentResult, AgentState, Effect, Event, EventResult, InteractionKind,
    ProposalRejection, ProposedAction, SessionId, SessionState, SessionStatus,
    ValidatedProperties, WorldState,
};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::EngineSettings;
use crate::decision::{
    Decision, DecisionCapability, DecisionError, DecisionRequest, decide_with_timeout,
};
use crate::error::EngineError;
use crate::router::{RoutingError, route, sequence_batches};

/// Status overview of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSummary {
    /// Session identifier.
    pub id: SessionId,
    /// Human-readable title.
    pub title: String,
    /// Lifecycle status.
    pub status: SessionStatus,
    /// Number of agents.
    pub agents: usize,
    /// Number of known players.
    pub players: usize,
    /// Number of committed events.
    pub events_processed: u64,
    /// Commit counter.
    pub version: u64,
    /// Time of the last commit.
    pub updated_at: DateTime<Utc>,
}

/// A loaded session: its state, its action registry and its store.
pub struct Session<S> {
    state: SessionState,
    registry: ActionRegistry,
    store: S,
}

impl<S> std::fmt::Debug for Session<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.state.id)
            .field("status", &self.state.status)
            .field("version", &self.state.version)
            .finish_non_exhaustive()
    }
}

impl<S: SessionStore> Session<S> {
    /// Wrap `state`, building its registry from the session catalog.
    ///
    /// Agents are seeded with every resource an action costs and placed at
    /// their starting locations. Nothing is persisted yet.
    pub fn new(mut state: SessionState, store: S) -> Result<Self, EngineError> {
        let registry = ActionRegistry::from_catalog(&state.catalog)?;
        let resources = registry.cost_resources();
        for agent in state.agents.values_mut() {
            agent.seed_resources(resources.iter().copied());
            if let Some(location) = &agent.location {
                state.world.place_agent(&agent.id, location);
            }
        }
        Ok(Self {
            state,
            registry,
            store,
        })
    }

    /// Current committed state.
    pub const fn state(&self) -> &SessionState {
        &self.state
    }

    /// The session's action registry.
    pub const fn registry(&self) -> &ActionRegistry {
        &self.registry
    }

    /// Status overview.
    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.state.id.clone(),
            title: self.state.title.clone(),
            status: self.state.status,
            agents: self.state.agents.len(),
            players: self.state.players.len(),
            events_processed: self.state.events_processed,
            version: self.state.version,
            updated_at: self.state.updated_at,
        }
    }

    /// Save the current state as-is.
    pub async fn persist(&mut self) -> Result<(), EngineError> {
        let working = self.state.clone();
        self.commit(working).await
    }

    /// Move the session to `next`.
    ///
    /// Deleting removes the session from its store.
    pub async fn transition(&mut self, next: SessionStatus) -> Result<(), EngineError> {
        let from = self.state.status;
        if !from.can_transition_to(next) {
            return Err(EngineError::InvalidTransition {
                session_id: self.state.id.clone(),
                from,
                to: next,
            });
        }

        if next == SessionStatus::Deleted {
            match self.store.delete(&self.state.id).await {
                Ok(()) | Err(StoreError::NotFound(_)) => {}
                Err(e) => return Err(e.into()),
            }
            self.state.status = next;
        } else {
            let mut working = self.state.clone();
            working.status = next;
            self.commit(working).await?;
        }

        info!(session_id = %self.state.id, %from, to = %next, "session status changed");
        Ok(())
    }

    /// Add an agent, seeding its resources and placing it in the world.
    pub async fn add_agent(&mut self, mut agent: AgentState) -> Result<(), EngineError> {
        self.ensure_editable()?;
        if self.state.agents.contains_key(&agent.id) {
            return Err(EngineError::AgentExists(agent.id));
        }
        agent.seed_resources(self.registry.cost_resources());

        let mut working = self.state.clone();
        if let Some(location) = &agent.location {
            working.world.place_agent(&agent.id, location);
        }
        let agent_id = agent.id.clone();
        working.agents.insert(agent_id.clone(), agent);
        self.commit(working).await?;

        info!(session_id = %self.state.id, agent_id = %agent_id, "agent added");
        Ok(())
    }

    /// Remove an agent and return its final state.
    pub async fn remove_agent(&mut self, agent_id: &AgentId) -> Result<AgentState, EngineError> {
        self.ensure_editable()?;
        let mut working = self.state.clone();
        let agent = working
            .agents
            .remove(agent_id)
            .ok_or_else(|| EngineError::AgentNotFound(agent_id.clone()))?;
        working.world.remove_agent(agent_id);
        self.commit(working).await?;

        info!(session_id = %self.state.id, agent_id = %agent_id, "agent removed");
        Ok(agent)
    }

    /// Apply a change to the world, committing only if the world changed.
    pub async fn update_world<T>(
        &mut self,
        change: impl FnOnce(&mut WorldState) -> T,
    ) -> Result<T, EngineError> {
        self.ensure_editable()?;
        let mut working = self.state.clone();
        let outcome = change(&mut working.world);
        if working.world != self.state.world {
            self.commit(working).await?;
        }
        Ok(outcome)
    }

    /// Process a submission of events and commit the outcome.
    ///
    /// Either every event is committed or none is: a rejected event or a
    /// failed save leaves the session unchanged. Results are returned in
    /// submission order.
    pub async fn process<D: DecisionCapability>(
        &mut self,
        events: Vec<Event>,
        pipeline: &EventPipeline<D>,
    ) -> Result<Vec<EventResult>, EngineError> {
        if self.state.status != SessionStatus::Active {
            return Err(EngineError::SessionNotActive {
                session_id: self.state.id.clone(),
                status: self.state.status,
            });
        }

        let now = Utc::now();
        let count = u64::try_from(events.len()).unwrap_or(u64::MAX);
        let mut working = self.state.clone();
        let mut results = Vec::with_capacity(events.len());

        let indexed: Vec<(usize, Event)> = events.into_iter().enumerate().collect();
        for (sequence, batch) in sequence_batches(indexed, |(_, event)| event.sequence_number()) {
            debug!(
                session_id = %working.id,
                sequence,
                events = batch.len(),
                "processing batch"
            );
            let batch_results = pipeline
                .run_batch(&self.registry, &mut working, batch, now)
                .await?;
            results.extend(batch_results);
        }

        working.events_processed = working.events_processed.saturating_add(count);
        self.commit(working).await?;

        results.sort_by_key(|(index, _)| *index);
        let results: Vec<EventResult> = results.into_iter().map(|(_, result)| result).collect();
        info!(
            session_id = %self.state.id,
            events = results.len(),
            version = self.state.version,
            complete = results.iter().all(|r| r.processing_complete),
            "events committed"
        );
        Ok(results)
    }

    fn ensure_editable(&self) -> Result<(), EngineError> {
        match self.state.status {
            SessionStatus::Created | SessionStatus::Active => Ok(()),
            status => Err(EngineError::SessionNotActive {
                session_id: self.state.id.clone(),
                status,
            }),
        }
    }

    async fn commit(&mut self, mut working: SessionState) -> Result<(), EngineError> {
        working.version = working.version.saturating_add(1);
        working.updated_at = Utc::now();
        if let Err(e) = self.store.save(&working.id, &working).await {
            warn!(session_id = %working.id, error = %e, "save failed, session state unchanged");
            return Err(e.into());
        }
        self.state = working;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Event pipeline
// ---------------------------------------------------------------------------

/// Shared processing machinery: the decision capability plus the settings
/// every session is processed with.
#[derive(Debug)]
pub struct EventPipeline<D> {
    decision: D,
    validator: PropertyValidator,
    decision_timeout: Duration,
    limits: EffectLimits,
}

/// An event that passed validation, routing and authorization.
struct Admitted {
    event: Event,
    properties: ValidatedProperties,
    targets: Vec<AgentId>,
    effects: Vec<Effect>,
}

impl<D: DecisionCapability> EventPipeline<D> {
    /// Create a pipeline from engine settings.
    pub const fn new(decision: D, settings: &EngineSettings) -> Self {
        Self {
            decision,
            validator: PropertyValidator::new(settings.unknown_properties),
            decision_timeout: settings.decision_timeout(),
            limits: settings.effect_limits(),
        }
    }

    /// The decision capability.
    pub const fn decision(&self) -> &D {
        &self.decision
    }

    /// Bounds used when applying effects.
    pub const fn limits(&self) -> EffectLimits {
        self.limits
    }

    async fn run_batch(
        &self,
        registry: &ActionRegistry,
        working: &mut SessionState,
        batch: Vec<(usize, Event)>,
        now: DateTime<Utc>,
    ) -> Result<Vec<(usize, EventResult)>, EngineError> {
        let mut reserved = working.clone();
        let mut admitted = Vec::with_capacity(batch.len());
        for (index, event) in batch {
            let entry = self.admit(registry, &reserved, event, now)?;
            effects::apply(&mut reserved, &reservations(&entry.effects), self.limits)?;
            admitted.push((index, entry));
        }

        for (_, entry) in &admitted {
            if entry.event.kind == InteractionKind::PlayerToAgent {
                working.players.insert(entry.event.source.clone());
            }
            effects::apply(working, &entry.effects, self.limits)?;
        }

        let available: Vec<_> = registry.list(None).into_iter().cloned().collect();
        let requests: Vec<Vec<DecisionRequest>> = admitted
            .iter()
            .map(|(_, entry)| {
                entry
                    .targets
                    .iter()
                    .filter_map(|agent_id| working.agents.get(agent_id))
                    .map(|agent| DecisionRequest {
                        agent: agent.clone(),
                        event: entry.event.clone(),
                        properties: entry.properties.clone(),
                        world: working.world.clone(),
                        available_actions: available.clone(),
                    })
                    .collect()
            })
            .collect();

        let mut outcomes = join_all(
            requests
                .iter()
                .flatten()
                .map(|request| decide_with_timeout(&self.decision, request, self.decision_timeout)),
        )
        .await
        .into_iter();

        let mut results = Vec::with_capacity(admitted.len());
        for ((index, entry), event_requests) in admitted.into_iter().zip(requests) {
            let mut agent_results = Vec::with_capacity(event_requests.len());
            for (request, outcome) in event_requests.into_iter().zip(outcomes.by_ref()) {
                agent_results.push(self.settle(
                    registry,
                    working,
                    &entry.event,
                    request.agent.id,
                    outcome,
                    now,
                ));
            }
            let processing_complete = agent_results.iter().all(|r| r.success);
            results.push((
                index,
                EventResult {
                    event_id: entry.event.id,
                    session_id: working.id.clone(),
                    success: true,
                    triggering_effects: entry.effects,
                    agent_results,
                    processing_complete,
                },
            ));
        }
        Ok(results)
    }

    /// Validate, route and authorize an incoming event against `state`
    /// and plan its own effects.
    fn admit(
        &self,
        registry: &ActionRegistry,
        state: &SessionState,
        event: Event,
        now: DateTime<Utc>,
    ) -> Result<Admitted, EngineError> {
        let definition = registry.get(&event.action_id)?;
        let properties = self.validator.validate(definition, &event.properties)?;
        let targets = route(state, registry, &event)?;

        let effects = {
            let actor = match event.kind {
                InteractionKind::PlayerToAgent => Actor::Player(&event.source),
                InteractionKind::AgentToAgent => Actor::Agent(
                    state
                        .agents
                        .get(event.source.as_str())
                        .ok_or_else(|| RoutingError::SourceNotFound {
                            source_id: event.source.clone(),
                        })?,
                ),
            };
            let target = event
                .target
                .as_deref()
                .and_then(|id| ResolvedTarget::resolve(state, id));
            authorize(definition, actor, target, now)?;

            effects::plan(&ActionContext {
                event_id: event.id,
                state,
                definition,
                actor,
                target,
                properties: &properties,
                location: event.location.as_ref(),
                now,
            })
        };

        debug!(
            event_id = %event.id,
            action_id = %event.action_id,
            source = %event.source,
            effects = effects.len(),
            "event admitted"
        );
        Ok(Admitted {
            event,
            properties,
            targets,
            effects,
        })
    }

    /// Turn one agent's decision into applied effects.
    fn settle(
        &self,
        registry: &ActionRegistry,
        working: &mut SessionState,
        event: &Event,
        agent_id: AgentId,
        outcome: Result<Decision, DecisionError>,
        now: DateTime<Utc>,
    ) -> AgentResult {
        let mut result = AgentResult::new(agent_id);
        let decision = match outcome {
            Ok(decision) => decision,
            Err(e) => {
                match &e {
                    DecisionError::Timeout { deadline_ms, .. } => warn!(
                        agent_id = %result.agent_id,
                        event_id = %event.id,
                        timeout_ms = deadline_ms,
                        "decision deadline exceeded, agent acknowledges only"
                    ),
                    DecisionError::Internal { .. } => warn!(
                        agent_id = %result.agent_id,
                        event_id = %event.id,
                        error = %e,
                        "decision failed, agent acknowledges only"
                    ),
                }
                result.success = false;
                result.error = Some(e.to_string());
                return result;
            }
        };
        result.reasoning = decision.reasoning;

        let groups = sequence_batches(decision.proposed_actions, ProposedAction::sequence_number);
        for proposal in groups.into_iter().flat_map(|(_, group)| group) {
            let outcome = self
                .review(registry, working, &result.agent_id, event, &proposal, now)
                .and_then(|planned| {
                    effects::apply(working, &planned, self.limits)?;
                    Ok(planned)
                });
            match outcome {
                Ok(planned) => {
                    result.accepted_actions.push(proposal.action_id);
                    result.applied_effects.extend(planned);
                }
                Err(e) => {
                    warn!(
                        agent_id = %result.agent_id,
                        action_id = %proposal.action_id,
                        error = %e,
                        "proposed action rejected"
                    );
                    result.rejected_actions.push(ProposalRejection {
                        action_id: proposal.action_id,
                        target: proposal.target,
                        reason: e.to_string(),
                    });
                }
            }
        }
        result
    }

    /// Re-check a proposed action as if it were a fresh, untrusted event,
    /// against the state left by every action accepted before it.
    fn review(
        &self,
        registry: &ActionRegistry,
        state: &SessionState,
        agent_id: &AgentId,
        event: &Event,
        proposal: &ProposedAction,
        now: DateTime<Utc>,
    ) -> Result<Vec<Effect>, EngineError> {
        let definition = registry.get(&proposal.action_id)?;
        let properties = self.validator.validate(definition, &proposal.properties)?;
        let agent = state
            .agents
            .get(agent_id)
            .ok_or_else(|| EngineError::AgentNotFound(agent_id.clone()))?;

        // An untargeted reply goes back to whoever triggered the event.
        let target = match proposal.target.as_deref() {
            Some(id) => ResolvedTarget::resolve(state, id),
            None if definition.requires_target => ResolvedTarget::resolve(state, &event.source)
                .filter(|t| {
                    definition
                        .target_type
                        .accepts(t.kind, t.id == agent.id.as_str())
                }),
            None => None,
        };
        let actor = Actor::Agent(agent);
        authorize(definition, actor, target, now)?;

        Ok(effects::plan(&ActionContext {
            event_id: event.id,
            state,
            definition,
            actor,
            target,
            properties: &properties,
            location: None,
            now,
        }))
    }
}

/// Costs and cooldown stamps of admitted effects, which later events of the
/// same batch are authorized against.
fn reservations(effects: &[Effect]) -> Vec<Effect> {
    effects
        .iter()
        .filter(|e| matches!(e, Effect::ResourceSpent { .. } | Effect::CooldownStarted { .. }))
        .cloned()
        .collect()
}
