//! Shared type definitions for the NPC engine.
//!
//! This crate is the single source of truth for the data that flows between
//! the action layer, the session orchestrator and the session stores.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe identifier wrappers
//! - [`enums`] -- Enumeration types (targets, property types, lifecycle, world)
//! - [`actions`] -- Action definitions, property schemas and validated values
//! - [`state`] -- Agent, world and session state
//! - [`events`] -- Event submissions, proposed actions, effects and results

pub mod actions;
pub mod enums;
pub mod events;
pub mod ids;
pub mod state;

// Re-export all public types at crate root for convenience.
pub use actions::{
    ActionCatalog, ActionDefinition, FloatRules, IntegerRules, PropertyBag, PropertyDefinition,
    PropertyKind, PropertySchemaError, PropertyValue, StringRules, ValidatedProperties,
};
pub use enums::{
    InteractionKind, LocationKind, PropertyType, SessionStatus, TargetKind, TargetType, TimeOfDay,
    Visibility, Weather,
};
pub use events::{
    AgentResult, DEFAULT_SEQUENCE, Effect, Event, EventResult, EventSubmission, ProposalRejection,
    ProposedAction,
};
pub use ids::{ActionId, AgentId, EventId, LocationId, SessionId};
pub use state::{
    AgentState, Location, Memories, MemoryEntry, Personality, SessionState, WorldEventRecord,
    WorldState,
};
