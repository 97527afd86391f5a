//! Enumeration types for the NPC engine.
//!
//! All enums serialize as `snake_case` strings so catalog and session
//! files can be written by hand.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Action schema
// ---------------------------------------------------------------------------

/// What kind of entity an action may be directed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetType {
    /// The action takes no target.
    #[default]
    None,
    /// The action targets the acting agent itself.
    #[serde(rename = "self")]
    SelfTarget,
    /// The action targets another agent.
    #[serde(alias = "npc")]
    Agent,
    /// The action targets a player.
    Player,
    /// The action targets a location.
    Location,
    /// The action targets an item.
    Item,
    /// The action targets an interactable object.
    Object,
    /// Any resolvable target is accepted.
    Any,
}

impl TargetType {
    /// Whether a resolved target of `kind` satisfies this target type.
    ///
    /// `is_self` is true when the resolved target is the acting agent.
    pub const fn accepts(self, kind: TargetKind, is_self: bool) -> bool {
        match self {
            Self::Any => true,
            Self::None => false,
            Self::SelfTarget => is_self,
            Self::Agent => matches!(kind, TargetKind::Agent),
            Self::Player => matches!(kind, TargetKind::Player),
            Self::Location => matches!(kind, TargetKind::Location),
            Self::Item => matches!(kind, TargetKind::Item),
            Self::Object => matches!(kind, TargetKind::Object),
        }
    }
}

impl core::fmt::Display for TargetType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            Self::None => "none",
            Self::SelfTarget => "self",
            Self::Agent => "agent",
            Self::Player => "player",
            Self::Location => "location",
            Self::Item => "item",
            Self::Object => "object",
            Self::Any => "any",
        };
        f.write_str(name)
    }
}

/// The kind of an entity a target identifier resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    /// An agent of the session.
    Agent,
    /// A player registered with the session.
    Player,
    /// A location of the world.
    Location,
    /// An item lying at some location.
    Item,
    /// An interactable object at some location.
    Object,
}

impl core::fmt::Display for TargetKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            Self::Agent => "agent",
            Self::Player => "player",
            Self::Location => "location",
            Self::Item => "item",
            Self::Object => "object",
        };
        f.write_str(name)
    }
}

/// Primitive type of an action property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyType {
    /// UTF-8 text.
    String,
    /// Signed 64-bit integer.
    #[serde(alias = "int")]
    Integer,
    /// 64-bit float.
    Float,
    /// Boolean flag.
    #[serde(alias = "bool")]
    Boolean,
    /// JSON array.
    List,
    /// JSON object.
    Dict,
}

impl core::fmt::Display for PropertyType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Boolean => "boolean",
            Self::List => "list",
            Self::Dict => "dict",
        };
        f.write_str(name)
    }
}

/// Who can observe an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    /// Everyone in the session.
    #[default]
    Public,
    /// Only the participants.
    Private,
    /// Agents at the same location.
    Nearby,
}

// ---------------------------------------------------------------------------
// Events and sessions
// ---------------------------------------------------------------------------

/// Declared interaction kind of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    /// A player addressing an agent directly.
    PlayerToAgent,
    /// An agent acting on another agent (or itself).
    AgentToAgent,
}

/// Lifecycle status of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Built from configuration, not yet accepting events.
    #[default]
    Created,
    /// Accepting events.
    Active,
    /// Frozen; may be reactivated or deleted.
    Archived,
    /// Removed from the store; terminal.
    Deleted,
}

impl SessionStatus {
    /// Whether the lifecycle allows moving from `self` to `next`.
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Created, Self::Active | Self::Deleted)
                | (Self::Active, Self::Archived | Self::Deleted)
                | (Self::Archived, Self::Active | Self::Deleted)
        )
    }
}

impl core::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            Self::Created => "created",
            Self::Active => "active",
            Self::Archived => "archived",
            Self::Deleted => "deleted",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// World
// ---------------------------------------------------------------------------

/// Category of a location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationKind {
    /// A settlement.
    Town,
    /// An enclosed building.
    #[default]
    Building,
    /// A room inside a building.
    Room,
    /// Open terrain.
    Outdoor,
    /// Underground or hostile area.
    Dungeon,
    /// Anything else.
    Special,
}

/// Time period of the in-game day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeOfDay {
    /// Early morning.
    Dawn,
    /// Morning.
    #[default]
    Morning,
    /// Midday.
    Noon,
    /// Afternoon.
    Afternoon,
    /// Evening.
    Evening,
    /// Night.
    Night,
    /// Middle of the night.
    Midnight,
}

/// Minutes in one in-game day.
pub const MINUTES_PER_DAY: u64 = 1440;

impl TimeOfDay {
    /// Period of the day that `game_minutes` of game time falls into.
    pub const fn at_game_minute(game_minutes: u64) -> Self {
        match (game_minutes % MINUTES_PER_DAY) / 60 {
            5..=6 => Self::Dawn,
            7..=11 => Self::Morning,
            12 => Self::Noon,
            13..=17 => Self::Afternoon,
            18..=20 => Self::Evening,
            21..=23 => Self::Night,
            _ => Self::Midnight,
        }
    }
}

impl core::fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            Self::Dawn => "dawn",
            Self::Morning => "morning",
            Self::Noon => "noon",
            Self::Afternoon => "afternoon",
            Self::Evening => "evening",
            Self::Night => "night",
            Self::Midnight => "midnight",
        };
        f.write_str(name)
    }
}

/// Weather condition of the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Weather {
    /// Clear skies.
    #[default]
    Sunny,
    /// Overcast.
    Cloudy,
    /// Rain.
    Rainy,
    /// Storm.
    Stormy,
    /// Fog.
    Foggy,
    /// Snow.
    Snowy,
}

impl core::fmt::Display for Weather {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            Self::Sunny => "sunny",
            Self::Cloudy => "cloudy",
            Self::Rainy => "rainy",
            Self::Stormy => "stormy",
            Self::Foggy => "foggy",
            Self::Snowy => "snowy",
        };
        f.write_str(name)
    }
}
