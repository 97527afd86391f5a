//! Action validation for the NPC engine.
//!
//! This crate is the pure logic layer between the shared types and the
//! session orchestrator: it never performs I/O and never holds locks.
//!
//! # Modules
//!
//! - [`registry`] -- Action schema registry ([`ActionRegistry`])
//! - [`builtin`] -- The built-in action set (`speak`, `move`, `emote`, ...)
//! - [`validator`] -- Property type coercion, defaults and constraints
//! - [`enforcer`] -- Target, cooldown and cost preconditions
//! - [`effects`] -- Effect planning and application
//! - [`error`] -- Error types ([`SchemaError`], [`ValidationError`], [`AuthorizationError`],
//!   [`EffectError`])

pub mod builtin;
pub mod effects;
pub mod enforcer;
pub mod error;
pub mod registry;
pub mod validator;

pub use effects::{ActionContext, EffectLimits};
pub use enforcer::{Actor, ResolvedTarget, authorize};
pub use error::{AuthorizationError, EffectError, SchemaError, ValidationError};
pub use registry::ActionRegistry;
pub use validator::{PropertyValidator, UnknownPropertyPolicy, validate};
