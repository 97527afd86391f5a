//! The session manager: entry point for callers of the engine.
//!
//! Holds every loaded session behind its own mutex. A submission locks its
//! session for the whole event, so events on one session are applied in
//! the order they acquired the lock, while different sessions proceed in
//! parallel.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use npc_db::SessionStore;
use npc_types::{
    AgentId, AgentState, EventResult, EventSubmission, LocationId, SessionId, SessionState,
    SessionStatus, TimeOfDay, Weather, WorldEventRecord,
};
use serde_json::Value;
use tokio::sync::{Mutex, RwLock};
use tracing::info;

use crate::config::{EngineSettings, SessionConfig};
use crate::decision::DecisionCapability;
use crate::error::EngineError;
use crate::session::{EventPipeline, Session, SessionSummary};

type SharedSession<S> = Arc<Mutex<Session<S>>>;

/// Owns the loaded sessions and processes submissions against them.
pub struct SessionManager<S, D> {
    sessions: RwLock<BTreeMap<SessionId, SharedSession<S>>>,
    pipeline: EventPipeline<D>,
}

impl<S, D> std::fmt::Debug for SessionManager<S, D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager").finish_non_exhaustive()
    }
}

impl<S: SessionStore, D: DecisionCapability> SessionManager<S, D> {
    /// Create an empty manager.
    pub fn new(decision: D, settings: &EngineSettings) -> Self {
        Self {
            sessions: RwLock::new(BTreeMap::new()),
            pipeline: EventPipeline::new(decision, settings),
        }
    }

    /// The decision capability agents consult.
    pub const fn decision(&self) -> &D {
        self.pipeline.decision()
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Create a session from `state`, persist it and register it.
    ///
    /// The session starts in the `created` status regardless of `state`.
    pub async fn create_session(
        &self,
        mut state: SessionState,
        store: S,
    ) -> Result<SessionSummary, EngineError> {
        state.status = SessionStatus::Created;
        let id = state.id.clone();
        if self.sessions.read().await.contains_key(&id) {
            return Err(EngineError::SessionExists(id));
        }

        let mut session = Session::new(state, store)?;
        session.persist().await?;
        let summary = session.summary();

        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&id) {
            return Err(EngineError::SessionExists(id));
        }
        sessions.insert(id.clone(), Arc::new(Mutex::new(session)));
        drop(sessions);

        info!(session_id = %id, agents = summary.agents, "session created");
        Ok(summary)
    }

    /// Create a session from a definition file, activating it if requested.
    pub async fn create_from_config(
        &self,
        config: SessionConfig,
        store: S,
    ) -> Result<SessionSummary, EngineError> {
        let activate = config.activate;
        let summary = self.create_session(config.into_state(), store).await?;
        if activate {
            return self.activate(&summary.id).await;
        }
        Ok(summary)
    }

    /// Register a session previously saved in `store`, in whatever status
    /// it was saved.
    pub async fn restore_session(
        &self,
        id: &SessionId,
        store: S,
    ) -> Result<SessionSummary, EngineError> {
        if self.sessions.read().await.contains_key(id) {
            return Err(EngineError::SessionExists(id.clone()));
        }
        let state = store.load(id).await?;
        let session = Session::new(state, store)?;
        let summary = session.summary();

        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(id) {
            return Err(EngineError::SessionExists(id.clone()));
        }
        sessions.insert(id.clone(), Arc::new(Mutex::new(session)));
        drop(sessions);

        info!(session_id = %id, status = %summary.status, "session restored");
        Ok(summary)
    }

    /// `created -> active` or `archived -> active`.
    pub async fn activate(&self, id: &SessionId) -> Result<SessionSummary, EngineError> {
        self.transition(id, SessionStatus::Active).await
    }

    /// `active -> archived`.
    pub async fn archive(&self, id: &SessionId) -> Result<SessionSummary, EngineError> {
        self.transition(id, SessionStatus::Archived).await
    }

    /// `archived -> active`.
    pub async fn reactivate(&self, id: &SessionId) -> Result<SessionSummary, EngineError> {
        let session = self.session(id).await?;
        let status = session.lock().await.state().status;
        if status != SessionStatus::Archived {
            return Err(EngineError::InvalidTransition {
                session_id: id.clone(),
                from: status,
                to: SessionStatus::Active,
            });
        }
        self.transition(id, SessionStatus::Active).await
    }

    /// Delete a session from its store and unload it.
    pub async fn delete_session(&self, id: &SessionId) -> Result<SessionSummary, EngineError> {
        let summary = self.transition(id, SessionStatus::Deleted).await?;
        self.sessions.write().await.remove(id);
        Ok(summary)
    }

    /// Apply a lifecycle transition.
    pub async fn transition(
        &self,
        id: &SessionId,
        next: SessionStatus,
    ) -> Result<SessionSummary, EngineError> {
        let session = self.session(id).await?;
        let mut session = session.lock().await;
        session.transition(next).await?;
        Ok(session.summary())
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Summaries of every loaded session, ordered by id.
    pub async fn list_sessions(&self) -> Vec<SessionSummary> {
        let handles: Vec<SharedSession<S>> = self.sessions.read().await.values().cloned().collect();
        let mut summaries = Vec::with_capacity(handles.len());
        for handle in handles {
            summaries.push(handle.lock().await.summary());
        }
        summaries
    }

    /// Summary of one session.
    pub async fn session_summary(&self, id: &SessionId) -> Result<SessionSummary, EngineError> {
        let session = self.session(id).await?;
        let summary = session.lock().await.summary();
        Ok(summary)
    }

    /// Full copy of a session's committed state.
    pub async fn snapshot(&self, id: &SessionId) -> Result<SessionState, EngineError> {
        let session = self.session(id).await?;
        let state = session.lock().await.state().clone();
        Ok(state)
    }

    /// Copy of one agent's committed state.
    pub async fn agent_snapshot(
        &self,
        id: &SessionId,
        agent_id: &AgentId,
    ) -> Result<AgentState, EngineError> {
        let session = self.session(id).await?;
        let session = session.lock().await;
        session
            .state()
            .agents
            .get(agent_id)
            .cloned()
            .ok_or_else(|| EngineError::AgentNotFound(agent_id.clone()))
    }

    // -----------------------------------------------------------------------
    // Agents
    // -----------------------------------------------------------------------

    /// Add an agent to a created or active session.
    pub async fn add_agent(&self, id: &SessionId, agent: AgentState) -> Result<(), EngineError> {
        let session = self.session(id).await?;
        let mut session = session.lock().await;
        session.add_agent(agent).await
    }

    /// Remove an agent from a created or active session.
    pub async fn remove_agent(
        &self,
        id: &SessionId,
        agent_id: &AgentId,
    ) -> Result<AgentState, EngineError> {
        let session = self.session(id).await?;
        let mut session = session.lock().await;
        session.remove_agent(agent_id).await
    }

    // -----------------------------------------------------------------------
    // Environment
    // -----------------------------------------------------------------------

    /// Set a session's weather. Returns `false` if it was already `weather`.
    pub async fn change_weather(
        &self,
        id: &SessionId,
        weather: Weather,
        reason: &str,
    ) -> Result<bool, EngineError> {
        let log_limit = self.pipeline.limits().max_recent_events;
        let session = self.session(id).await?;
        let mut session = session.lock().await;
        let changed = session
            .update_world(|world| world.change_weather(weather, reason, Utc::now(), log_limit))
            .await?;
        if changed {
            info!(session_id = %id, %weather, reason, "weather changed");
        }
        Ok(changed)
    }

    /// Advance a session's game clock and return the current time of day.
    pub async fn advance_time(&self, id: &SessionId, minutes: u64) -> Result<TimeOfDay, EngineError> {
        let log_limit = self.pipeline.limits().max_recent_events;
        let session = self.session(id).await?;
        let mut session = session.lock().await;
        let changed = session
            .update_world(|world| world.advance_time(minutes, Utc::now(), log_limit))
            .await?;
        if let Some(period) = changed {
            info!(session_id = %id, time_of_day = %period, "time of day changed");
        }
        Ok(session.state().world.time_of_day)
    }

    /// Start a world-wide event. Returns `false` if it is already active.
    pub async fn trigger_global_event(
        &self,
        id: &SessionId,
        name: &str,
        description: &str,
        properties: BTreeMap<String, Value>,
    ) -> Result<bool, EngineError> {
        let log_limit = self.pipeline.limits().max_recent_events;
        let session = self.session(id).await?;
        let mut session = session.lock().await;
        let started = session
            .update_world(|world| {
                world.trigger_global_event(name, description, properties, Utc::now(), log_limit)
            })
            .await?;
        if started {
            info!(session_id = %id, event = name, "global event started");
        }
        Ok(started)
    }

    /// End a world-wide event. Returns `false` if it was not active.
    pub async fn end_global_event(&self, id: &SessionId, name: &str) -> Result<bool, EngineError> {
        let log_limit = self.pipeline.limits().max_recent_events;
        let session = self.session(id).await?;
        let mut session = session.lock().await;
        let ended = session
            .update_world(|world| world.end_global_event(name, Utc::now(), log_limit))
            .await?;
        if ended {
            info!(session_id = %id, event = name, "global event ended");
        }
        Ok(ended)
    }

    /// Agents within `max_distance` connection hops of an agent.
    pub async fn nearby_agents(
        &self,
        id: &SessionId,
        agent_id: &AgentId,
        max_distance: usize,
    ) -> Result<Vec<AgentId>, EngineError> {
        let session = self.session(id).await?;
        let session = session.lock().await;
        let state = session.state();
        if !state.agents.contains_key(agent_id) {
            return Err(EngineError::AgentNotFound(agent_id.clone()));
        }
        Ok(state.world.nearby_agents(agent_id, max_distance))
    }

    /// The last `limit` logged events at a location, oldest first.
    pub async fn events_at_location(
        &self,
        id: &SessionId,
        location: &LocationId,
        limit: usize,
    ) -> Result<Vec<WorldEventRecord>, EngineError> {
        let session = self.session(id).await?;
        let session = session.lock().await;
        Ok(session
            .state()
            .world
            .events_at(location, limit)
            .into_iter()
            .cloned()
            .collect())
    }

    /// The last `limit` logged events performed by or directed at
    /// `subject`, oldest first.
    pub async fn events_involving(
        &self,
        id: &SessionId,
        subject: &str,
        limit: usize,
    ) -> Result<Vec<WorldEventRecord>, EngineError> {
        let session = self.session(id).await?;
        let session = session.lock().await;
        Ok(session
            .state()
            .world
            .events_involving(subject, limit)
            .into_iter()
            .cloned()
            .collect())
    }

    // -----------------------------------------------------------------------
    // Events
    // -----------------------------------------------------------------------

    /// Process a single event.
    pub async fn submit(&self, submission: EventSubmission) -> Result<EventResult, EngineError> {
        let (session_id, event) = submission.into_event();
        let session = self.session(&session_id).await?;
        let mut session = session.lock().await;
        let mut results = session.process(vec![event], &self.pipeline).await?;
        results
            .pop()
            .ok_or(EngineError::SessionNotFound(session_id))
    }

    /// Process several events for one session as a single atomic
    /// submission, ordered by their sequence numbers.
    pub async fn submit_batch(
        &self,
        session_id: &SessionId,
        submissions: Vec<EventSubmission>,
    ) -> Result<Vec<EventResult>, EngineError> {
        let mut events = Vec::with_capacity(submissions.len());
        for submission in submissions {
            let (found, event) = submission.into_event();
            if found != *session_id {
                return Err(EngineError::SessionMismatch {
                    expected: session_id.clone(),
                    found,
                });
            }
            events.push(event);
        }
        if events.is_empty() {
            return Ok(Vec::new());
        }

        let session = self.session(session_id).await?;
        let mut session = session.lock().await;
        session.process(events, &self.pipeline).await
    }

    async fn session(&self, id: &SessionId) -> Result<SharedSession<S>, EngineError> {
        self.sessions
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| EngineError::SessionNotFound(id.clone()))
    }
}
