//! End-to-end behaviour of the session manager against the in-memory store.

#![allow(
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::panic,
    clippy::arithmetic_side_effects
)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use npc_actions::{AuthorizationError, UnknownPropertyPolicy, ValidationError};
use npc_core::{
    Decision, DecisionCapability, DecisionError, DecisionRequest, EngineError, EngineSettings,
    RoutingError, SessionConfig, SessionManager,
};
use npc_db::{MemoryStore, SessionStore, StoreError};
use npc_types::{
    ActionDefinition, ActionId, AgentId, AgentState, Effect, EventSubmission, InteractionKind,
    Location, LocationId, Personality, PropertyBag, ProposedAction, SessionId, SessionState,
    SessionStatus, TargetType, TimeOfDay, Weather,
};
use serde_json::{Value, json};

// =============================================================================
// Fixtures
// =============================================================================

#[derive(Debug, Clone)]
enum Reply {
    Propose(Vec<ProposedAction>),
    Fail,
    Stall,
}

/// Replies per agent and remembers every request it was shown.
#[derive(Debug, Default)]
struct Scripted {
    replies: BTreeMap<AgentId, Reply>,
    seen: Mutex<Vec<DecisionRequest>>,
}

impl Scripted {
    fn reply(mut self, agent: &str, reply: Reply) -> Self {
        self.replies.insert(AgentId::new(agent), reply);
        self
    }

    fn seen_by(&self, agent: &str) -> Vec<DecisionRequest> {
        self.seen
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.agent.id.as_str() == agent)
            .cloned()
            .collect()
    }
}

impl DecisionCapability for Scripted {
    async fn decide(&self, request: &DecisionRequest) -> Result<Decision, DecisionError> {
        self.seen.lock().unwrap().push(request.clone());
        match self.replies.get(&request.agent.id).cloned() {
            None => Ok(Decision::acknowledge("nods")),
            Some(Reply::Propose(proposed_actions)) => Ok(Decision {
                reasoning: Some("scripted".to_owned()),
                proposed_actions,
            }),
            Some(Reply::Fail) => Err(DecisionError::Internal {
                message: "model unavailable".to_owned(),
            }),
            Some(Reply::Stall) => {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok(Decision::default())
            }
        }
    }
}

/// A memory store whose saves can be made to fail.
#[derive(Debug, Clone, Default)]
struct FlakyStore {
    inner: MemoryStore,
    fail: Arc<AtomicBool>,
}

impl SessionStore for FlakyStore {
    async fn load(&self, id: &SessionId) -> Result<SessionState, StoreError> {
        self.inner.load(id).await
    }

    async fn save(&self, id: &SessionId, state: &SessionState) -> Result<(), StoreError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(StoreError::Config("disk full".to_owned()));
        }
        self.inner.save(id, state).await
    }

    async fn delete(&self, id: &SessionId) -> Result<(), StoreError> {
        self.inner.delete(id).await
    }

    async fn list(&self) -> Result<Vec<SessionId>, StoreError> {
        self.inner.list().await
    }
}

fn tavern() -> SessionState {
    let mut state = SessionState::new("tavern", "The Prancing Pony");
    state.world.add_location(Location::new("tavern_hall", "Tavern Hall"));
    state.world.add_location(Location::new("market", "Market"));

    let mut marcus = AgentState::new("marcus", Personality::default()).at("tavern_hall");
    marcus.resources.insert("mana".to_owned(), 100.0);
    let elara = AgentState::new("elara", Personality::default()).at("tavern_hall");
    for agent in [marcus, elara] {
        state.agents.insert(agent.id.clone(), agent);
    }

    let mut fireball = ActionDefinition::new("fireball", "Fireball");
    fireball.target_type = TargetType::Agent;
    fireball.requires_target = true;
    fireball.cost.insert("mana".to_owned(), 30.0);
    fireball.cooldown_secs = 0.3;

    let mut spark = ActionDefinition::new("spark", "Spark");
    spark.target_type = TargetType::Agent;
    spark.requires_target = true;
    spark.cost.insert("mana".to_owned(), 10.0);

    state.catalog.custom_actions = vec![fireball, spark];
    state
}

fn settings() -> EngineSettings {
    EngineSettings {
        decision_timeout_ms: 200,
        ..EngineSettings::default()
    }
}

async fn active_manager(decision: Scripted) -> (SessionManager<MemoryStore, Scripted>, MemoryStore) {
    let store = MemoryStore::new();
    let manager = SessionManager::new(decision, &settings());
    manager.create_session(tavern(), store.clone()).await.unwrap();
    manager.activate(&sid()).await.unwrap();
    (manager, store)
}

fn sid() -> SessionId {
    SessionId::new("tavern")
}

fn bag(value: Value) -> PropertyBag {
    serde_json::from_value(value).unwrap()
}

fn player_event(target: &str, action: &str, properties: Value) -> EventSubmission {
    EventSubmission {
        session_id: sid(),
        source: "player_1".to_owned(),
        target: Some(target.to_owned()),
        action_id: action.into(),
        properties: bag(properties),
        kind: InteractionKind::PlayerToAgent,
        sequence: None,
        location: None,
    }
}

fn agent_event(source: &str, target: &str, action: &str, properties: Value) -> EventSubmission {
    EventSubmission {
        source: source.to_owned(),
        kind: InteractionKind::AgentToAgent,
        ..player_event(target, action, properties)
    }
}

fn proposal(action: &str, target: Option<&str>, properties: Value) -> ProposedAction {
    ProposedAction {
        target: target.map(str::to_owned),
        properties: bag(properties),
        ..ProposedAction::new(action)
    }
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

// =============================================================================
// End-to-end speak
// =============================================================================

#[tokio::test]
async fn speak_succeeds_and_creates_memory() {
    let (manager, store) = active_manager(Scripted::default()).await;

    let result = manager
        .submit(player_event("marcus", "speak", json!({"message": "Hello there"})))
        .await
        .unwrap();

    assert!(result.success);
    assert!(result.processing_complete);
    assert_eq!(result.session_id, sid());
    assert_eq!(result.agent_results.len(), 1);
    assert_eq!(result.agent_results[0].agent_id.as_str(), "marcus");
    assert!(
        result
            .triggering_effects
            .iter()
            .any(|e| matches!(e, Effect::MemoryRecorded { agent_id, .. } if agent_id.as_str() == "marcus"))
    );

    let marcus = manager.agent_snapshot(&sid(), &AgentId::new("marcus")).await.unwrap();
    assert_eq!(marcus.memories.long_term.len(), 1);
    assert_eq!(marcus.memories.long_term[0].source, "player_1");

    let stored = store.load(&sid()).await.unwrap();
    assert_eq!(stored.events_processed, 1);
    assert!(stored.players.contains("player_1"));
    assert_eq!(stored, manager.snapshot(&sid()).await.unwrap());
}

#[tokio::test]
async fn missing_target_fails_without_state_change() {
    let (manager, _store) = active_manager(Scripted::default()).await;
    let before = manager.snapshot(&sid()).await.unwrap();

    let err = manager
        .submit(player_event("nobody", "speak", json!({"message": "Hello?"})))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        EngineError::Routing(RoutingError::TargetNotFound { ref target }) if target == "nobody"
    ));
    assert_eq!(manager.snapshot(&sid()).await.unwrap(), before);
}

// =============================================================================
// Validation
// =============================================================================

#[tokio::test]
async fn missing_required_property_is_named() {
    let (manager, _store) = active_manager(Scripted::default()).await;

    let err = manager
        .submit(player_event("marcus", "speak", json!({"tone": "friendly"})))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        EngineError::Validation(ValidationError::MissingRequiredProperty { ref property }) if property == "message"
    ));
}

#[tokio::test]
async fn agents_see_a_complete_validated_bag() {
    let (manager, _store) = active_manager(Scripted::default()).await;

    manager
        .submit(player_event("marcus", "speak", json!({"message": "Hi", "mood": "ignored"})))
        .await
        .unwrap();

    let seen = manager.decision().seen_by("marcus");
    assert_eq!(seen.len(), 1);
    let properties = &seen[0].properties;
    assert_eq!(properties.len(), 2);
    assert_eq!(properties["message"].as_str(), Some("Hi"));
    assert_eq!(properties["tone"].as_str(), Some("neutral"));
    assert!(seen[0].available_actions.iter().any(|a| a.id.as_str() == "fireball"));
}

#[tokio::test]
async fn strict_policy_rejects_unknown_properties() {
    let strict = EngineSettings {
        unknown_properties: UnknownPropertyPolicy::Reject,
        ..settings()
    };
    let manager = SessionManager::new(Scripted::default(), &strict);
    manager.create_session(tavern(), MemoryStore::new()).await.unwrap();
    manager.activate(&sid()).await.unwrap();

    let err = manager
        .submit(player_event("marcus", "speak", json!({"message": "Hi", "volume": 11})))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        EngineError::Validation(ValidationError::UnknownProperty { ref property }) if property == "volume"
    ));
}

// =============================================================================
// Constraints
// =============================================================================

#[tokio::test]
async fn cooldown_rejects_then_allows() {
    let (manager, _store) = active_manager(Scripted::default()).await;

    manager
        .submit(agent_event("marcus", "elara", "fireball", json!({})))
        .await
        .unwrap();

    let err = manager
        .submit(agent_event("marcus", "elara", "fireball", json!({})))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Authorization(AuthorizationError::OnCooldown { ref action, .. }) if action.as_str() == "fireball"
    ));

    tokio::time::sleep(Duration::from_millis(350)).await;
    manager
        .submit(agent_event("marcus", "elara", "fireball", json!({})))
        .await
        .unwrap();

    let marcus = manager.agent_snapshot(&sid(), &AgentId::new("marcus")).await.unwrap();
    assert!(close(marcus.resource_level("mana"), 40.0));
}

#[tokio::test]
async fn insufficient_resource_then_affordable_action() {
    let (manager, _store) = active_manager(Scripted::default()).await;
    let mut poor = AgentState::new("bram", Personality::default()).at("market");
    poor.resources.insert("mana".to_owned(), 20.0);
    manager.add_agent(&sid(), poor).await.unwrap();

    let err = manager
        .submit(agent_event("bram", "elara", "fireball", json!({})))
        .await
        .unwrap_err();
    match err {
        EngineError::Authorization(AuthorizationError::InsufficientResource {
            resource,
            have,
            need,
            ..
        }) => {
            assert_eq!(resource, "mana");
            assert!(close(have, 20.0));
            assert!(close(need, 30.0));
        }
        other => panic!("expected InsufficientResource, got {other}"),
    }

    manager
        .submit(agent_event("bram", "elara", "spark", json!({})))
        .await
        .unwrap();
    let bram = manager.agent_snapshot(&sid(), &AgentId::new("bram")).await.unwrap();
    assert!(close(bram.resource_level("mana"), 10.0));
}

#[tokio::test]
async fn players_skip_cost_checks() {
    let (manager, _store) = active_manager(Scripted::default()).await;

    let result = manager
        .submit(player_event("elara", "fireball", json!({})))
        .await
        .unwrap();

    assert!(
        !result
            .triggering_effects
            .iter()
            .any(|e| matches!(e, Effect::ResourceSpent { .. }))
    );
}

// =============================================================================
// Sequencing
// =============================================================================

#[tokio::test]
async fn earlier_sequence_is_visible_to_later_one() {
    let (manager, _store) = active_manager(Scripted::default()).await;

    let greet = EventSubmission {
        sequence: Some(2),
        ..player_event("marcus", "speak", json!({"message": "Where are you?"}))
    };
    let walk = EventSubmission {
        sequence: Some(1),
        ..agent_event("marcus", "market", "move", json!({"destination": "market"}))
    };

    let results = manager.submit_batch(&sid(), vec![greet, walk]).await.unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].agent_results[0].agent_id.as_str(), "marcus");
    assert!(
        results[1]
            .triggering_effects
            .iter()
            .any(|e| matches!(e, Effect::Moved { .. }))
    );

    let seen = manager.decision().seen_by("marcus");
    assert_eq!(seen.len(), 2);
    let when_greeted = seen
        .iter()
        .find(|r| r.event.action_id.as_str() == "speak")
        .unwrap();
    assert_eq!(
        when_greeted.agent.location.as_ref().map(LocationId::as_str),
        Some("market")
    );

    let state = manager.snapshot(&sid()).await.unwrap();
    assert_eq!(state.events_processed, 2);
    assert!(state.world.agents_at(&"market".into()).contains(&AgentId::new("marcus")));
    assert!(!state.world.agents_at(&"tavern_hall".into()).contains(&AgentId::new("marcus")));
}

#[tokio::test]
async fn failing_event_rejects_the_whole_batch() {
    let (manager, _store) = active_manager(Scripted::default()).await;
    let before = manager.snapshot(&sid()).await.unwrap();

    let ok = agent_event("marcus", "elara", "spark", json!({}));
    let bad = EventSubmission {
        sequence: Some(2),
        ..player_event("ghost", "speak", json!({"message": "boo"}))
    };

    assert!(manager.submit_batch(&sid(), vec![ok, bad]).await.is_err());
    assert_eq!(manager.snapshot(&sid()).await.unwrap(), before);
}

#[tokio::test]
async fn batch_for_another_session_is_rejected() {
    let (manager, _store) = active_manager(Scripted::default()).await;
    let stray = EventSubmission {
        session_id: SessionId::new("elsewhere"),
        ..player_event("marcus", "speak", json!({"message": "hi"}))
    };

    let err = manager.submit_batch(&sid(), vec![stray]).await.unwrap_err();
    assert!(matches!(err, EngineError::SessionMismatch { .. }));
}

// =============================================================================
// Proposals
// =============================================================================

#[tokio::test]
async fn proposals_are_rechecked_before_applying() {
    let script = Scripted::default().reply(
        "marcus",
        Reply::Propose(vec![
            proposal("speak", None, json!({"message": "Welcome, traveller"})),
            proposal("emote", None, json!({"emotion": "smug"})),
            proposal("fly", None, json!({})),
        ]),
    );
    let (manager, _store) = active_manager(script).await;

    let result = manager
        .submit(player_event("marcus", "speak", json!({"message": "Hello"})))
        .await
        .unwrap();

    let marcus = &result.agent_results[0];
    assert!(marcus.success);
    assert_eq!(marcus.reasoning.as_deref(), Some("scripted"));
    assert_eq!(
        marcus.accepted_actions.iter().map(ActionId::as_str).collect::<Vec<_>>(),
        vec!["speak"]
    );
    assert_eq!(marcus.rejected_actions.len(), 2);
    assert!(marcus.rejected_actions[0].reason.contains("emotion"));
    assert!(marcus.rejected_actions[1].reason.contains("fly"));

    let state = manager.snapshot(&sid()).await.unwrap();
    let reply = state
        .world
        .recent_events
        .iter()
        .find(|e| e.source == "marcus")
        .unwrap();
    assert_eq!(reply.target.as_deref(), Some("player_1"));
    assert_eq!(state.agents[&AgentId::new("marcus")].activity, "talking");
}

#[tokio::test]
async fn proposal_groups_see_earlier_groups() {
    let script = Scripted::default().reply(
        "marcus",
        Reply::Propose(vec![
            ProposedAction {
                sequence: Some(2),
                ..proposal("fireball", Some("elara"), json!({}))
            },
            ProposedAction {
                sequence: Some(1),
                ..proposal("fireball", Some("elara"), json!({}))
            },
        ]),
    );
    let (manager, _store) = active_manager(script).await;

    let result = manager
        .submit(player_event("marcus", "speak", json!({"message": "Show me"})))
        .await
        .unwrap();

    let marcus = &result.agent_results[0];
    assert_eq!(marcus.accepted_actions.len(), 1);
    assert_eq!(marcus.rejected_actions.len(), 1);
    assert!(marcus.rejected_actions[0].reason.contains("cooldown"));

    let marcus = manager.agent_snapshot(&sid(), &AgentId::new("marcus")).await.unwrap();
    assert!(close(marcus.resource_level("mana"), 70.0));
}

#[tokio::test]
async fn repeated_proposals_in_one_group_hit_the_cooldown() {
    let script = Scripted::default().reply(
        "marcus",
        Reply::Propose(vec![proposal("fireball", Some("elara"), json!({})); 5]),
    );
    let (manager, _store) = active_manager(script).await;

    let result = manager
        .submit(player_event("marcus", "speak", json!({"message": "Again!"})))
        .await
        .unwrap();

    let marcus = &result.agent_results[0];
    assert_eq!(marcus.accepted_actions.len(), 1);
    assert_eq!(marcus.rejected_actions.len(), 4);
    assert!(marcus.rejected_actions.iter().all(|r| r.reason.contains("cooldown")));

    let marcus = manager.agent_snapshot(&sid(), &AgentId::new("marcus")).await.unwrap();
    assert!(close(marcus.resource_level("mana"), 70.0));
}

#[tokio::test]
async fn repeated_proposals_stop_at_the_budget() {
    let script = Scripted::default().reply(
        "marcus",
        Reply::Propose(vec![proposal("spark", Some("elara"), json!({})); 12]),
    );
    let (manager, _store) = active_manager(script).await;

    let result = manager
        .submit(player_event("marcus", "speak", json!({"message": "Light show?"})))
        .await
        .unwrap();

    let marcus = &result.agent_results[0];
    assert_eq!(marcus.accepted_actions.len(), 10);
    assert_eq!(marcus.rejected_actions.len(), 2);
    assert!(marcus.rejected_actions.iter().all(|r| r.reason.contains("insufficient mana")));

    let marcus = manager.agent_snapshot(&sid(), &AgentId::new("marcus")).await.unwrap();
    assert!(close(marcus.resource_level("mana"), 0.0));
}

#[tokio::test]
async fn proposed_moves_leave_a_single_occupancy() {
    let script = Scripted::default().reply(
        "marcus",
        Reply::Propose(vec![
            proposal("move", None, json!({"destination": "market"})),
            proposal("move", None, json!({"destination": "tavern_hall"})),
        ]),
    );
    let (manager, _store) = active_manager(script).await;

    let result = manager
        .submit(player_event("marcus", "speak", json!({"message": "Fetch bread"})))
        .await
        .unwrap();
    assert_eq!(result.agent_results[0].accepted_actions.len(), 2);

    let state = manager.snapshot(&sid()).await.unwrap();
    let marcus = AgentId::new("marcus");
    let listed: Vec<&str> = state
        .world
        .locations
        .values()
        .filter(|l| l.occupants.contains(&marcus))
        .map(|l| l.id.as_str())
        .collect();
    assert_eq!(listed, vec!["tavern_hall"]);
    assert_eq!(
        state.agents[&marcus].location.as_ref().map(LocationId::as_str),
        Some("tavern_hall")
    );
}

// =============================================================================
// Batches share budgets
// =============================================================================

#[tokio::test]
async fn same_sequence_batch_respects_cooldowns() {
    let (manager, _store) = active_manager(Scripted::default()).await;
    let before = manager.snapshot(&sid()).await.unwrap();

    let volley: Vec<EventSubmission> = (0..4)
        .map(|_| EventSubmission {
            sequence: Some(1),
            ..agent_event("marcus", "elara", "fireball", json!({}))
        })
        .collect();

    let err = manager.submit_batch(&sid(), volley).await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::Authorization(AuthorizationError::OnCooldown { .. })
    ));
    assert_eq!(manager.snapshot(&sid()).await.unwrap(), before);
}

#[tokio::test]
async fn same_sequence_batch_cannot_overdraw() {
    let (manager, _store) = active_manager(Scripted::default()).await;
    let sparks = |n: usize| -> Vec<EventSubmission> {
        (0..n)
            .map(|_| agent_event("marcus", "elara", "spark", json!({})))
            .collect()
    };

    let err = manager.submit_batch(&sid(), sparks(11)).await.unwrap_err();
    match err {
        EngineError::Authorization(AuthorizationError::InsufficientResource { have, .. }) => {
            assert!(close(have, 0.0));
        }
        other => panic!("expected InsufficientResource, got {other}"),
    }
    let marcus = manager.agent_snapshot(&sid(), &AgentId::new("marcus")).await.unwrap();
    assert!(close(marcus.resource_level("mana"), 100.0));

    let results = manager.submit_batch(&sid(), sparks(10)).await.unwrap();
    assert_eq!(results.len(), 10);
    let marcus = manager.agent_snapshot(&sid(), &AgentId::new("marcus")).await.unwrap();
    assert!(close(marcus.resource_level("mana"), 0.0));
}

#[tokio::test]
async fn decision_timeout_marks_processing_incomplete() {
    let (manager, _store) = active_manager(Scripted::default().reply("elara", Reply::Stall)).await;

    let result = manager
        .submit(player_event("elara", "speak", json!({"message": "Elara?"})))
        .await
        .unwrap();

    assert!(result.success);
    assert!(!result.processing_complete);
    let elara = &result.agent_results[0];
    assert!(!elara.success);
    assert!(elara.error.as_deref().unwrap().contains("timed out"));
    assert!(elara.applied_effects.is_empty());

    let state = manager.snapshot(&sid()).await.unwrap();
    assert_eq!(state.events_processed, 1);
}

#[tokio::test]
async fn decision_failure_is_recovered() {
    let (manager, _store) = active_manager(Scripted::default().reply("marcus", Reply::Fail)).await;

    let result = manager
        .submit(player_event("marcus", "speak", json!({"message": "Hello"})))
        .await
        .unwrap();

    assert!(!result.processing_complete);
    assert!(
        result.agent_results[0]
            .error
            .as_deref()
            .unwrap()
            .contains("model unavailable")
    );
}

// =============================================================================
// Persistence
// =============================================================================

#[tokio::test]
async fn failed_save_leaves_session_unchanged() {
    let store = FlakyStore::default();
    let manager = SessionManager::new(Scripted::default(), &settings());
    manager.create_session(tavern(), store.clone()).await.unwrap();
    manager.activate(&sid()).await.unwrap();
    let before = manager.snapshot(&sid()).await.unwrap();

    store.fail.store(true, Ordering::SeqCst);
    let err = manager
        .submit(player_event("marcus", "speak", json!({"message": "Hello"})))
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::Persistence(_)));
    assert_eq!(manager.snapshot(&sid()).await.unwrap(), before);
    assert_eq!(store.load(&sid()).await.unwrap(), before);
}

#[tokio::test]
async fn sessions_restore_from_their_store() {
    let (manager, store) = active_manager(Scripted::default()).await;
    manager
        .submit(player_event("marcus", "speak", json!({"message": "Remember me"})))
        .await
        .unwrap();

    let fresh = SessionManager::new(Scripted::default(), &settings());
    let summary = fresh.restore_session(&sid(), store).await.unwrap();
    assert_eq!(summary.status, SessionStatus::Active);
    assert_eq!(summary.events_processed, 1);

    let marcus = fresh.agent_snapshot(&sid(), &AgentId::new("marcus")).await.unwrap();
    assert_eq!(marcus.memories.len(), 1);
}

// =============================================================================
// Lifecycle and management
// =============================================================================

#[tokio::test]
async fn only_active_sessions_accept_events() {
    let store = MemoryStore::new();
    let manager = SessionManager::new(Scripted::default(), &settings());
    manager.create_session(tavern(), store.clone()).await.unwrap();

    let hello = || player_event("marcus", "speak", json!({"message": "Hello"}));
    let err = manager.submit(hello()).await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::SessionNotActive {
            status: SessionStatus::Created,
            ..
        }
    ));

    manager.activate(&sid()).await.unwrap();
    manager.archive(&sid()).await.unwrap();
    assert!(manager.submit(hello()).await.is_err());

    manager.reactivate(&sid()).await.unwrap();
    manager.submit(hello()).await.unwrap();
}

#[tokio::test]
async fn invalid_transitions_are_rejected() {
    let store = MemoryStore::new();
    let manager = SessionManager::new(Scripted::default(), &settings());
    manager.create_session(tavern(), store).await.unwrap();

    let err = manager.archive(&sid()).await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::InvalidTransition {
            from: SessionStatus::Created,
            to: SessionStatus::Archived,
            ..
        }
    ));
    assert!(matches!(
        manager.reactivate(&sid()).await.unwrap_err(),
        EngineError::InvalidTransition { .. }
    ));
}

#[tokio::test]
async fn delete_removes_session_everywhere() {
    let (manager, store) = active_manager(Scripted::default()).await;
    manager.archive(&sid()).await.unwrap();
    let summary = manager.delete_session(&sid()).await.unwrap();

    assert_eq!(summary.status, SessionStatus::Deleted);
    assert!(store.is_empty().await);
    assert!(manager.list_sessions().await.is_empty());
    assert!(matches!(
        manager.session_summary(&sid()).await.unwrap_err(),
        EngineError::SessionNotFound(_)
    ));
}

#[tokio::test]
async fn duplicate_sessions_are_rejected() {
    let (manager, _store) = active_manager(Scripted::default()).await;
    let err = manager
        .create_session(tavern(), MemoryStore::new())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::SessionExists(_)));
}

#[tokio::test]
async fn agents_can_join_and_leave() {
    let (manager, _store) = active_manager(Scripted::default()).await;
    manager
        .add_agent(&sid(), AgentState::new("bram", Personality::default()).at("market"))
        .await
        .unwrap();

    let bram = manager.agent_snapshot(&sid(), &AgentId::new("bram")).await.unwrap();
    assert!(bram.resources.contains_key("mana"));
    let state = manager.snapshot(&sid()).await.unwrap();
    assert!(state.world.agents_at(&"market".into()).contains(&AgentId::new("bram")));

    let err = manager
        .add_agent(&sid(), AgentState::new("bram", Personality::default()))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::AgentExists(_)));

    manager.remove_agent(&sid(), &AgentId::new("bram")).await.unwrap();
    let state = manager.snapshot(&sid()).await.unwrap();
    assert!(!state.agents.contains_key("bram"));
    assert!(state.world.agents_at(&"market".into()).is_empty());
    assert_eq!(manager.session_summary(&sid()).await.unwrap().agents, 2);
}

#[tokio::test]
async fn sessions_load_from_definitions() {
    let yaml = r"
id: docks
title: Harbour Docks
players: [captain]
agents:
  - id: finn
    location: pier
world:
  locations:
    pier:
      id: pier
      name: Pier
";
    let config = SessionConfig::parse(yaml).unwrap();
    let manager = SessionManager::new(Scripted::default(), &settings());
    let summary = manager
        .create_from_config(config, MemoryStore::new())
        .await
        .unwrap();

    assert_eq!(summary.status, SessionStatus::Active);
    assert_eq!(summary.agents, 1);
    assert_eq!(summary.players, 1);

    let listed = manager.list_sessions().await;
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].title, "Harbour Docks");

    let state = manager.snapshot(&SessionId::new("docks")).await.unwrap();
    assert!(state.world.agents_at(&"pier".into()).contains(&AgentId::new("finn")));
}

// =============================================================================
// Environment
// =============================================================================

#[tokio::test]
async fn weather_changes_commit_and_log() {
    let (manager, store) = active_manager(Scripted::default()).await;
    let version = manager.session_summary(&sid()).await.unwrap().version;

    assert!(manager.change_weather(&sid(), Weather::Stormy, "a storm breaks").await.unwrap());
    assert!(!manager.change_weather(&sid(), Weather::Stormy, "still storming").await.unwrap());

    let state = manager.snapshot(&sid()).await.unwrap();
    assert_eq!(state.version, version + 1);
    assert_eq!(state.world.weather, Weather::Stormy);
    assert_eq!(store.load(&sid()).await.unwrap(), state);
    let record = state.world.recent_events.back().unwrap();
    assert_eq!(record.action_id.as_str(), "weather_change");
    assert_eq!(record.details.get("reason"), Some(&json!("a storm breaks")));
}

#[tokio::test]
async fn game_clock_and_global_events() {
    let (manager, _store) = active_manager(Scripted::default()).await;

    assert_eq!(manager.advance_time(&sid(), 19 * 60).await.unwrap(), TimeOfDay::Evening);
    assert_eq!(manager.advance_time(&sid(), 30).await.unwrap(), TimeOfDay::Evening);

    let props = BTreeMap::from([("stalls".to_owned(), json!(12))]);
    assert!(
        manager
            .trigger_global_event(&sid(), "night_market", "Lanterns go up in the square", props)
            .await
            .unwrap()
    );
    assert!(manager.end_global_event(&sid(), "night_market").await.unwrap());
    assert!(!manager.end_global_event(&sid(), "night_market").await.unwrap());

    let state = manager.snapshot(&sid()).await.unwrap();
    assert_eq!(state.world.game_time_minutes, 19 * 60 + 30);
    assert!(state.world.active_events.is_empty());
    let logged: Vec<&str> = state
        .world
        .recent_events
        .iter()
        .map(|r| r.action_id.as_str())
        .collect();
    assert_eq!(logged, vec!["time_change", "global_event", "global_event_end"]);
}

#[tokio::test]
async fn environment_changes_need_an_editable_session_and_a_working_store() {
    let store = FlakyStore::default();
    let manager = SessionManager::new(Scripted::default(), &settings());
    manager.create_session(tavern(), store.clone()).await.unwrap();
    manager.activate(&sid()).await.unwrap();
    let before = manager.snapshot(&sid()).await.unwrap();

    store.fail.store(true, Ordering::SeqCst);
    let err = manager.change_weather(&sid(), Weather::Foggy, "mist").await.unwrap_err();
    assert!(matches!(err, EngineError::Persistence(_)));
    assert_eq!(manager.snapshot(&sid()).await.unwrap(), before);

    store.fail.store(false, Ordering::SeqCst);
    manager.archive(&sid()).await.unwrap();
    let err = manager.advance_time(&sid(), 60).await.unwrap_err();
    assert!(matches!(err, EngineError::SessionNotActive { .. }));
}

#[tokio::test]
async fn nearby_agents_and_event_queries() {
    let mut state = tavern();
    for (from, to) in [("tavern_hall", "market"), ("market", "tavern_hall")] {
        state
            .world
            .locations
            .get_mut(from)
            .unwrap()
            .connections
            .push(LocationId::new(to));
    }
    let store = MemoryStore::new();
    let manager = SessionManager::new(Scripted::default(), &settings());
    manager.create_session(state, store).await.unwrap();
    manager.activate(&sid()).await.unwrap();
    let trader = AgentState::new("bram", Personality::default()).at("market");
    manager.add_agent(&sid(), trader).await.unwrap();

    let marcus = AgentId::new("marcus");
    let here = manager.nearby_agents(&sid(), &marcus, 0).await.unwrap();
    assert_eq!(here, vec![AgentId::new("elara")]);
    let around = manager.nearby_agents(&sid(), &marcus, 1).await.unwrap();
    assert_eq!(around, vec![AgentId::new("bram"), AgentId::new("elara")]);
    assert!(matches!(
        manager.nearby_agents(&sid(), &AgentId::new("ghost"), 1).await,
        Err(EngineError::AgentNotFound(_))
    ));

    manager
        .submit(player_event("marcus", "speak", json!({"message": "Ale, please"})))
        .await
        .unwrap();
    manager
        .submit(agent_event("bram", "elara", "speak", json!({"message": "Fresh fish!"})))
        .await
        .unwrap();

    let in_hall = manager
        .events_at_location(&sid(), &LocationId::new("tavern_hall"), 10)
        .await
        .unwrap();
    assert_eq!(in_hall.len(), 1);
    assert_eq!(in_hall[0].source, "player_1");
    assert_eq!(in_hall[0].details.get("message"), Some(&json!("Ale, please")));

    let with_elara = manager.events_involving(&sid(), "elara", 10).await.unwrap();
    assert_eq!(with_elara.len(), 1);
    assert_eq!(with_elara[0].source, "bram");
}
