//! Error types for the npc-actions crate.
//!
//! Each stage of action processing has its own error type so callers can
//! tell schema problems, bad properties and failed preconditions apart.
//! Every variant names the rule that failed and the property, action or
//! resource it failed for.

use npc_types::{ActionId, AgentId, PropertySchemaError, PropertyType, TargetKind, TargetType};

/// Errors raised by the action schema registry.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SchemaError {
    /// The action id is not registered, or names a disabled built-in.
    #[error("unknown action: {0}")]
    UnknownAction(ActionId),

    /// An action with this id is already registered.
    #[error("duplicate action: {0} (register with override to replace it)")]
    DuplicateAction(ActionId),

    /// A definition is internally inconsistent.
    #[error("definition mismatch in action {action}: {reason}")]
    DefinitionMismatch {
        /// The offending action.
        action: ActionId,
        /// What is wrong with it.
        reason: String,
    },

    /// A property schema could not be parsed.
    #[error(transparent)]
    Property(#[from] PropertySchemaError),
}

/// Errors raised while validating a property bag.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    /// A required property was not supplied.
    #[error("missing required property: {property}")]
    MissingRequiredProperty {
        /// Property name.
        property: String,
    },

    /// A property could not be coerced into its declared type.
    #[error("type mismatch for property {property}: expected {expected}, got {got}")]
    TypeMismatch {
        /// Property name.
        property: String,
        /// Declared type.
        expected: PropertyType,
        /// JSON type actually supplied.
        got: String,
    },

    /// A property value violates a declared constraint.
    #[error("constraint violation for property {property}: {rule} (value {value})")]
    ConstraintViolation {
        /// Property name.
        property: String,
        /// The rule that failed, e.g. `max_length <= 500`.
        rule: String,
        /// The offending value.
        value: String,
    },

    /// An undeclared property was supplied under the strict policy.
    #[error("unknown property: {property}")]
    UnknownProperty {
        /// Property name.
        property: String,
    },
}

/// Errors raised when an actor may not perform an action right now.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AuthorizationError {
    /// The action needs a target and none could be resolved.
    #[error("action {action} requires a target")]
    TargetRequired {
        /// The action.
        action: ActionId,
    },

    /// The resolved target is of the wrong kind.
    #[error("action {action} expects a {expected} target, found {found}")]
    TargetTypeMismatch {
        /// The action.
        action: ActionId,
        /// Declared target type.
        expected: TargetType,
        /// Kind of the resolved target, or `none`.
        found: String,
    },

    /// The actor used this action too recently.
    #[error("action {action} is on cooldown for {remaining_secs:.2}s")]
    OnCooldown {
        /// The action.
        action: ActionId,
        /// Seconds until the action is available again.
        remaining_secs: f64,
    },

    /// The actor cannot pay the action's cost.
    #[error("insufficient {resource} for action {action}: have {have}, need {need}")]
    InsufficientResource {
        /// The action.
        action: ActionId,
        /// Resource name.
        resource: String,
        /// Amount held.
        have: f64,
        /// Amount required.
        need: f64,
    },
}

impl AuthorizationError {
    /// Describe a resolved target kind for [`AuthorizationError::TargetTypeMismatch`].
    pub(crate) fn found(kind: Option<TargetKind>) -> String {
        kind.map_or_else(|| "none".to_owned(), |k| k.to_string())
    }
}

/// Errors raised while applying planned effects.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EffectError {
    /// The effects spend more of a resource than the agent holds.
    #[error("agent {agent} would overdraw {resource}: have {have}, spending {spend}")]
    Overdraw {
        /// The spending agent.
        agent: AgentId,
        /// Resource name.
        resource: String,
        /// Amount held.
        have: f64,
        /// Total amount the effects spend.
        spend: f64,
    },
}
