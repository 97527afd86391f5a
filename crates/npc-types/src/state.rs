//! Agent, world and session state.
//!
//! These are the records a session store persists. They carry no behaviour
//! beyond small helpers for lookups and bounded logs; all mutation driven
//! by actions goes through the effect layer in `npc-actions`.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::actions::ActionCatalog;
use crate::enums::{LocationKind, SessionStatus, TargetKind, TimeOfDay, Weather};
use crate::ids::{ActionId, AgentId, EventId, LocationId, SessionId};

/// Resource names backed by dedicated [`AgentState`] fields.
pub const ENERGY: &str = "energy";
/// See [`ENERGY`].
pub const HEALTH: &str = "health";

/// Source recorded for world changes not caused by an actor.
pub const SYSTEM_SOURCE: &str = "system";

// ---------------------------------------------------------------------------
// Agent
// ---------------------------------------------------------------------------

/// Personality of an agent. Opaque to the engine; forwarded to the
/// decision capability.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Personality {
    /// Display name.
    pub name: String,
    /// Role or profession.
    #[serde(default)]
    pub role: String,
    /// Traits such as `friendly` or `gruff`.
    #[serde(default, alias = "personality_traits")]
    pub traits: Vec<String>,
    /// Backstory.
    #[serde(default)]
    pub background: String,
    /// Current goals.
    #[serde(default)]
    pub goals: Vec<String>,
    /// Character name -> relationship label.
    #[serde(default)]
    pub relationships: BTreeMap<String, String>,
    /// How the agent speaks.
    #[serde(default)]
    pub dialogue_style: String,
}

/// One remembered interaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryEntry {
    /// When the interaction happened.
    pub timestamp: DateTime<Utc>,
    /// Event that produced the memory.
    pub event_id: EventId,
    /// Action performed.
    pub action_id: ActionId,
    /// Who performed it.
    pub source: String,
    /// Who or what it was directed at.
    #[serde(default)]
    pub target: Option<String>,
    /// Validated properties of the action.
    #[serde(default)]
    pub details: BTreeMap<String, Value>,
}

/// Short-term (bounded) and long-term memory of an agent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Memories {
    /// Recent interactions, oldest first.
    #[serde(default)]
    pub short_term: VecDeque<MemoryEntry>,
    /// Important interactions, never evicted.
    #[serde(default)]
    pub long_term: Vec<MemoryEntry>,
}

impl Memories {
    /// Record a memory. Short-term memory keeps at most `short_term_limit`
    /// entries, dropping the oldest.
    pub fn record(&mut self, entry: MemoryEntry, important: bool, short_term_limit: usize) {
        if important {
            self.long_term.push(entry);
            return;
        }
        self.short_term.push_back(entry);
        while self.short_term.len() > short_term_limit {
            self.short_term.pop_front();
        }
    }

    /// Total number of memories held.
    pub fn len(&self) -> usize {
        self.short_term.len().saturating_add(self.long_term.len())
    }

    /// Whether no memories are held.
    pub fn is_empty(&self) -> bool {
        self.short_term.is_empty() && self.long_term.is_empty()
    }

    /// Iterate over all memories, long-term first.
    pub fn iter(&self) -> impl Iterator<Item = &MemoryEntry> {
        self.long_term.iter().chain(self.short_term.iter())
    }
}

/// Full state of one agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentState {
    /// Agent identifier.
    pub id: AgentId,
    /// Personality handed to the decision capability.
    #[serde(default)]
    pub personality: Personality,
    /// Current location.
    #[serde(default)]
    pub location: Option<LocationId>,
    /// What the agent is doing.
    #[serde(default = "default_activity")]
    pub activity: String,
    /// Emotional state.
    #[serde(default = "default_mood")]
    pub mood: String,
    /// Health, 0-100.
    #[serde(default = "default_full")]
    pub health: f64,
    /// Energy, 0-100.
    #[serde(default = "default_full")]
    pub energy: f64,
    /// Items held.
    #[serde(default)]
    pub inventory: Vec<Value>,
    /// Named numeric resources other than energy and health.
    #[serde(default)]
    pub resources: BTreeMap<String, f64>,
    /// Game-specific attributes.
    #[serde(default, alias = "custom_attributes")]
    pub custom: BTreeMap<String, Value>,
    /// Temporary effects.
    #[serde(default)]
    pub status_effects: Vec<String>,
    /// Last use of each action, for cooldown tracking.
    #[serde(default)]
    pub last_used: BTreeMap<ActionId, DateTime<Utc>>,
    /// Remembered interactions.
    #[serde(default)]
    pub memories: Memories,
}

fn default_activity() -> String {
    "idle".to_owned()
}

fn default_mood() -> String {
    "neutral".to_owned()
}

const fn default_full() -> f64 {
    100.0
}

impl AgentState {
    /// A fresh agent at full health and energy.
    pub fn new(id: impl Into<AgentId>, personality: Personality) -> Self {
        Self {
            id: id.into(),
            personality,
            location: None,
            activity: default_activity(),
            mood: default_mood(),
            health: default_full(),
            energy: default_full(),
            inventory: Vec::new(),
            resources: BTreeMap::new(),
            custom: BTreeMap::new(),
            status_effects: Vec::new(),
            last_used: BTreeMap::new(),
            memories: Memories::default(),
        }
    }

    /// Place the agent at a location.
    #[must_use]
    pub fn at(mut self, location: impl Into<LocationId>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Current amount of a named resource; unknown resources read as `0.0`.
    pub fn resource_level(&self, name: &str) -> f64 {
        match name {
            ENERGY => self.energy,
            HEALTH => self.health,
            other => self.resources.get(other).copied().unwrap_or(0.0),
        }
    }

    /// Overwrite the amount of a named resource.
    pub fn set_resource_level(&mut self, name: &str, amount: f64) {
        match name {
            ENERGY => self.energy = amount,
            HEALTH => self.health = amount,
            other => {
                self.resources.insert(other.to_owned(), amount);
            }
        }
    }

    /// Make sure every named resource exists, seeding missing ones with `0.0`.
    pub fn seed_resources<'a>(&mut self, names: impl IntoIterator<Item = &'a str>) {
        for name in names {
            if name != ENERGY && name != HEALTH {
                self.resources.entry(name.to_owned()).or_insert(0.0);
            }
        }
    }

    /// Seconds remaining before `action` may be used again, if any.
    pub fn cooldown_remaining(
        &self,
        action: &ActionId,
        cooldown_secs: f64,
        now: DateTime<Utc>,
    ) -> Option<f64> {
        let last = self.last_used.get(action)?;
        #[allow(clippy::cast_precision_loss)] // millisecond deltas fit f64 exactly
        let elapsed = now.signed_duration_since(*last).num_milliseconds() as f64 / 1000.0;
        (elapsed < cooldown_secs).then_some(cooldown_secs - elapsed)
    }
}

// ---------------------------------------------------------------------------
// World
// ---------------------------------------------------------------------------

/// A location in the world graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Location identifier.
    #[serde(alias = "location_id")]
    pub id: LocationId,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Category.
    #[serde(default, alias = "location_type")]
    pub kind: LocationKind,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// Adjacent locations.
    #[serde(default, alias = "connected_locations")]
    pub connections: Vec<LocationId>,
    /// Agents currently here.
    #[serde(default, alias = "npcs_present")]
    pub occupants: Vec<AgentId>,
    /// Items lying here, e.g. `{"item": "anvil", "interactable": true}`.
    #[serde(default, alias = "items_present")]
    pub items: Vec<Value>,
    /// Location-specific properties.
    #[serde(default)]
    pub properties: BTreeMap<String, Value>,
}

impl Location {
    /// An empty location.
    pub fn new(id: impl Into<LocationId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: LocationKind::default(),
            description: String::new(),
            connections: Vec::new(),
            occupants: Vec::new(),
            items: Vec::new(),
            properties: BTreeMap::new(),
        }
    }

    /// Kind of the item named `name` at this location, if present.
    ///
    /// Entries flagged `interactable` are objects; everything else is an item.
    pub fn item_kind(&self, name: &str) -> Option<TargetKind> {
        self.items.iter().find_map(|item| {
            let matches = ["item", "id", "name"]
                .iter()
                .any(|key| item.get(key).and_then(Value::as_str) == Some(name))
                || item.as_str() == Some(name);
            if !matches {
                return None;
            }
            let interactable = item
                .get("interactable")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            Some(if interactable {
                TargetKind::Object
            } else {
                TargetKind::Item
            })
        })
    }
}

/// Entry of the bounded world event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldEventRecord {
    /// Event that produced the entry.
    pub event_id: EventId,
    /// When it happened.
    pub timestamp: DateTime<Utc>,
    /// Action performed.
    pub action_id: ActionId,
    /// Who performed it.
    pub source: String,
    /// Who or what it was directed at.
    #[serde(default)]
    pub target: Option<String>,
    /// Where it happened; `None` for world-wide changes.
    #[serde(default)]
    pub location: Option<LocationId>,
    /// Properties of the action, or what changed.
    #[serde(default)]
    pub details: BTreeMap<String, Value>,
}

/// Shared world of a session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorldState {
    /// All locations keyed by id.
    #[serde(default)]
    pub locations: BTreeMap<LocationId, Location>,
    /// Current time of day.
    #[serde(default)]
    pub time_of_day: TimeOfDay,
    /// Current weather.
    #[serde(default)]
    pub weather: Weather,
    /// Minutes of game time since the session started.
    #[serde(default, alias = "game_time")]
    pub game_time_minutes: u64,
    /// Global world properties.
    #[serde(default, alias = "world_properties")]
    pub properties: BTreeMap<String, Value>,
    /// Currently active world events.
    #[serde(default)]
    pub active_events: Vec<String>,
    /// Recent actions, oldest first.
    #[serde(default)]
    pub recent_events: VecDeque<WorldEventRecord>,
}

impl WorldState {
    /// Add or replace a location.
    pub fn add_location(&mut self, location: Location) {
        self.locations.insert(location.id.clone(), location);
    }

    /// Agents at a location; empty for unknown locations.
    pub fn agents_at(&self, location: &LocationId) -> &[AgentId] {
        self.locations
            .get(location)
            .map_or(&[], |l| l.occupants.as_slice())
    }

    /// Register `agent` as an occupant of `location`, if it exists.
    pub fn place_agent(&mut self, agent: &AgentId, location: &LocationId) {
        if let Some(loc) = self.locations.get_mut(location)
            && !loc.occupants.contains(agent)
        {
            loc.occupants.push(agent.clone());
        }
    }

    /// Remove `agent` from every location's occupant list.
    pub fn remove_agent(&mut self, agent: &AgentId) {
        for loc in self.locations.values_mut() {
            loc.occupants.retain(|a| a != agent);
        }
    }

    /// Move an agent to `to`, leaving whatever location currently lists it.
    ///
    /// Returns `false` without changes when `to` is not a known location.
    pub fn move_agent(&mut self, agent: &AgentId, to: &LocationId) -> bool {
        if !self.locations.contains_key(to) {
            return false;
        }
        self.remove_agent(agent);
        self.place_agent(agent, to);
        true
    }

    /// Append to the event log, keeping at most `limit` entries.
    pub fn log_event(&mut self, record: WorldEventRecord, limit: usize) {
        self.recent_events.push_back(record);
        while self.recent_events.len() > limit {
            self.recent_events.pop_front();
        }
    }

    /// Kind of the item or object named `name` anywhere in the world.
    pub fn item_kind(&self, name: &str) -> Option<TargetKind> {
        self.locations.values().find_map(|l| l.item_kind(name))
    }

    /// Location currently listing `agent` as an occupant.
    pub fn location_of(&self, agent: &AgentId) -> Option<&Location> {
        self.locations.values().find(|l| l.occupants.contains(agent))
    }

    /// Agents within `max_distance` connection hops of `agent`, excluding
    /// `agent` itself. Distance 0 means the same location.
    pub fn nearby_agents(&self, agent: &AgentId, max_distance: usize) -> Vec<AgentId> {
        let Some(start) = self.location_of(agent) else {
            return Vec::new();
        };
        let mut reached: BTreeSet<&LocationId> = BTreeSet::from([&start.id]);
        let mut frontier = vec![&start.id];
        for _ in 0..max_distance {
            let next: Vec<&LocationId> = frontier
                .iter()
                .filter_map(|id| self.locations.get(*id))
                .flat_map(|l| l.connections.iter())
                .filter(|id| reached.insert(*id))
                .collect();
            if next.is_empty() {
                break;
            }
            frontier = next;
        }

        let mut nearby: BTreeSet<AgentId> = reached
            .iter()
            .filter_map(|id| self.locations.get(*id))
            .flat_map(|l| l.occupants.iter().cloned())
            .collect();
        nearby.remove(agent);
        nearby.into_iter().collect()
    }

    /// The last `limit` logged events that happened at `location`, oldest
    /// first.
    pub fn events_at(&self, location: &LocationId, limit: usize) -> Vec<&WorldEventRecord> {
        self.latest(limit, |r| r.location.as_ref() == Some(location))
    }

    /// The last `limit` logged events performed by or directed at `subject`,
    /// oldest first.
    pub fn events_involving(&self, subject: &str, limit: usize) -> Vec<&WorldEventRecord> {
        self.latest(limit, |r| r.source == subject || r.target.as_deref() == Some(subject))
    }

    fn latest(
        &self,
        limit: usize,
        matches: impl Fn(&WorldEventRecord) -> bool,
    ) -> Vec<&WorldEventRecord> {
        let mut found: Vec<&WorldEventRecord> = self
            .recent_events
            .iter()
            .rev()
            .filter(|r| matches(r))
            .take(limit)
            .collect();
        found.reverse();
        found
    }

    /// Set the weather. Returns `false` without logging when it is unchanged.
    pub fn change_weather(
        &mut self,
        weather: Weather,
        reason: &str,
        now: DateTime<Utc>,
        log_limit: usize,
    ) -> bool {
        if self.weather == weather {
            return false;
        }
        let details = BTreeMap::from([
            ("from".to_owned(), Value::from(self.weather.to_string())),
            ("to".to_owned(), Value::from(weather.to_string())),
            ("reason".to_owned(), Value::from(reason)),
        ]);
        self.weather = weather;
        self.log_change("weather_change", details, now, log_limit);
        true
    }

    /// Advance game time by `minutes` and recompute the time of day.
    ///
    /// Returns the new period when the time of day changed.
    pub fn advance_time(
        &mut self,
        minutes: u64,
        now: DateTime<Utc>,
        log_limit: usize,
    ) -> Option<TimeOfDay> {
        self.game_time_minutes = self.game_time_minutes.saturating_add(minutes);
        let period = TimeOfDay::at_game_minute(self.game_time_minutes);
        if period == self.time_of_day {
            return None;
        }
        let details = BTreeMap::from([
            ("from".to_owned(), Value::from(self.time_of_day.to_string())),
            ("to".to_owned(), Value::from(period.to_string())),
            ("game_time".to_owned(), Value::from(self.game_time_minutes)),
        ]);
        self.time_of_day = period;
        self.log_change("time_change", details, now, log_limit);
        Some(period)
    }

    /// Start a world-wide event. Returns `false` if it is already active.
    pub fn trigger_global_event(
        &mut self,
        name: &str,
        description: &str,
        properties: BTreeMap<String, Value>,
        now: DateTime<Utc>,
        log_limit: usize,
    ) -> bool {
        if self.active_events.iter().any(|e| e == name) {
            return false;
        }
        self.active_events.push(name.to_owned());
        let mut details = properties;
        details.insert("event_name".to_owned(), Value::from(name));
        details.insert("description".to_owned(), Value::from(description));
        self.log_change("global_event", details, now, log_limit);
        true
    }

    /// End a world-wide event. Returns `false` if it was not active.
    pub fn end_global_event(&mut self, name: &str, now: DateTime<Utc>, log_limit: usize) -> bool {
        let before = self.active_events.len();
        self.active_events.retain(|e| e != name);
        if self.active_events.len() == before {
            return false;
        }
        let details = BTreeMap::from([("event_name".to_owned(), Value::from(name))]);
        self.log_change("global_event_end", details, now, log_limit);
        true
    }

    fn log_change(
        &mut self,
        action: &str,
        details: BTreeMap<String, Value>,
        now: DateTime<Utc>,
        log_limit: usize,
    ) {
        self.log_event(
            WorldEventRecord {
                event_id: EventId::new(),
                timestamp: now,
                action_id: ActionId::new(action),
                source: SYSTEM_SOURCE.to_owned(),
                target: None,
                location: None,
                details,
            },
            log_limit,
        );
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Everything a session store persists for one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    /// Session identifier.
    pub id: SessionId,
    /// Human-readable title.
    #[serde(default)]
    pub title: String,
    /// Lifecycle status.
    #[serde(default)]
    pub status: SessionStatus,
    /// Declarative catalog the registry is rebuilt from.
    #[serde(default)]
    pub catalog: ActionCatalog,
    /// Agents keyed by id.
    #[serde(default)]
    pub agents: BTreeMap<AgentId, AgentState>,
    /// Registered player identifiers.
    #[serde(default)]
    pub players: BTreeSet<String>,
    /// Shared world.
    #[serde(default)]
    pub world: WorldState,
    /// Number of events committed.
    #[serde(default)]
    pub events_processed: u64,
    /// Incremented on every commit.
    #[serde(default)]
    pub version: u64,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Time of the last commit.
    pub updated_at: DateTime<Utc>,
}

impl SessionState {
    /// A new session in the `created` state with no agents.
    pub fn new(id: impl Into<SessionId>, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            title: title.into(),
            status: SessionStatus::Created,
            catalog: ActionCatalog::default(),
            agents: BTreeMap::new(),
            players: BTreeSet::new(),
            world: WorldState::default(),
            events_processed: 0,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Resolve an identifier to the kind of entity it names.
    ///
    /// Agents win over players, players over locations, locations over
    /// items and objects.
    pub fn resolve_target(&self, target: &str) -> Option<TargetKind> {
        if self.agents.contains_key(target) {
            Some(TargetKind::Agent)
        } else if self.players.contains(target) {
            Some(TargetKind::Player)
        } else if self.world.locations.contains_key(target) {
            Some(TargetKind::Location)
        } else {
            self.world.item_kind(target)
        }
    }
}
