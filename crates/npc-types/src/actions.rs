//! Action schema types: definitions, property schemas and validated values.
//!
//! An [`ActionDefinition`] is the declarative description of something an
//! agent or player can do. Its properties are described by
//! [`PropertyDefinition`]s whose type and constraints form a closed tagged
//! union ([`PropertyKind`]); the flat `{type, default, validation}` record
//! used in catalog files is converted into that union on deserialization,
//! rejecting constraints that do not belong to the declared type.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

use crate::enums::{PropertyType, TargetType, Visibility};
use crate::ids::ActionId;

/// An unvalidated property bag as supplied by a caller.
pub type PropertyBag = BTreeMap<String, Value>;

/// A property bag that has passed validation.
pub type ValidatedProperties = BTreeMap<String, PropertyValue>;

// ---------------------------------------------------------------------------
// ActionDefinition
// ---------------------------------------------------------------------------

/// Declarative description of an action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionDefinition {
    /// Unique identifier within a registry.
    #[serde(alias = "action_id")]
    pub id: ActionId,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// What the action does.
    #[serde(default)]
    pub description: String,
    /// Optional category (`social`, `movement`, `utility`, ...).
    #[serde(default)]
    pub category: Option<String>,
    /// What the action may be directed at.
    #[serde(default)]
    pub target_type: TargetType,
    /// Whether a resolvable target must be present.
    #[serde(default)]
    pub requires_target: bool,
    /// Ordered property schemas.
    #[serde(default)]
    pub properties: Vec<PropertyDefinition>,
    /// Named resource amounts deducted from the acting agent.
    #[serde(default)]
    pub cost: BTreeMap<String, f64>,
    /// Minimum seconds between two uses by the same agent.
    #[serde(default, alias = "cooldown")]
    pub cooldown_secs: f64,
    /// Whether the action can change the actor's mood.
    #[serde(default)]
    pub affects_mood: bool,
    /// Whether participants remember the action.
    #[serde(default = "default_true")]
    pub creates_memory: bool,
    /// Who can observe the action.
    #[serde(default)]
    pub visibility: Visibility,
}

impl ActionDefinition {
    /// Create a definition with no properties, no cost and no cooldown.
    pub fn new(id: impl Into<ActionId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            category: None,
            target_type: TargetType::None,
            requires_target: false,
            properties: Vec::new(),
            cost: BTreeMap::new(),
            cooldown_secs: 0.0,
            affects_mood: false,
            creates_memory: true,
            visibility: Visibility::Public,
        }
    }

    /// Look up a property schema by name.
    pub fn property(&self, name: &str) -> Option<&PropertyDefinition> {
        self.properties.iter().find(|p| p.name == name)
    }
}

const fn default_true() -> bool {
    true
}

// ---------------------------------------------------------------------------
// PropertyDefinition
// ---------------------------------------------------------------------------

/// Schema of one action property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawPropertyDefinition", into = "RawPropertyDefinition")]
pub struct PropertyDefinition {
    /// Property name, unique within its action.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// Whether the caller must supply the property.
    pub required: bool,
    /// Type, default and constraints.
    pub kind: PropertyKind,
}

impl PropertyDefinition {
    /// A required property of the given kind.
    pub fn required(name: impl Into<String>, kind: PropertyKind) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            required: true,
            kind,
        }
    }

    /// An optional property of the given kind.
    pub fn optional(name: impl Into<String>, kind: PropertyKind) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            required: false,
            kind,
        }
    }

    /// Attach a description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// The primitive type of this property.
    pub const fn property_type(&self) -> PropertyType {
        self.kind.property_type()
    }
}

/// Type of a property together with its type-specific default and constraints.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyKind {
    /// Text property.
    String(StringRules),
    /// Integer property.
    Integer(IntegerRules),
    /// Float property.
    Float(FloatRules),
    /// Boolean property.
    Boolean {
        /// Value used when the property is absent.
        default: Option<bool>,
    },
    /// List property (no bundled constraints).
    List {
        /// Value used when the property is absent.
        default: Option<Vec<Value>>,
    },
    /// Dict property (no bundled constraints).
    Dict {
        /// Value used when the property is absent.
        default: Option<Map<String, Value>>,
    },
}

impl PropertyKind {
    /// The primitive type tag.
    pub const fn property_type(&self) -> PropertyType {
        match self {
            Self::String(_) => PropertyType::String,
            Self::Integer(_) => PropertyType::Integer,
            Self::Float(_) => PropertyType::Float,
            Self::Boolean { .. } => PropertyType::Boolean,
            Self::List { .. } => PropertyType::List,
            Self::Dict { .. } => PropertyType::Dict,
        }
    }

    /// The default value, if one is declared.
    pub fn default_value(&self) -> Option<PropertyValue> {
        match self {
            Self::String(rules) => rules.default.clone().map(PropertyValue::String),
            Self::Integer(rules) => rules.default.map(PropertyValue::Integer),
            Self::Float(rules) => rules.default.map(PropertyValue::Float),
            Self::Boolean { default } => default.map(PropertyValue::Boolean),
            Self::List { default } => default.clone().map(PropertyValue::List),
            Self::Dict { default } => default.clone().map(PropertyValue::Dict),
        }
    }
}

/// Default and constraints of a string property.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StringRules {
    /// Value used when the property is absent.
    pub default: Option<String>,
    /// Exact set of allowed values.
    pub choices: Option<Vec<String>>,
    /// Minimum length in characters.
    pub min_length: Option<usize>,
    /// Maximum length in characters.
    pub max_length: Option<usize>,
}

/// Default and inclusive bounds of an integer property.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IntegerRules {
    /// Value used when the property is absent.
    pub default: Option<i64>,
    /// Inclusive lower bound.
    pub min: Option<i64>,
    /// Inclusive upper bound.
    pub max: Option<i64>,
}

/// Default and inclusive bounds of a float property.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FloatRules {
    /// Value used when the property is absent.
    pub default: Option<f64>,
    /// Inclusive lower bound.
    pub min: Option<f64>,
    /// Inclusive upper bound.
    pub max: Option<f64>,
}

/// A property schema that could not be turned into a [`PropertyKind`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("property `{property}`: {reason}")]
pub struct PropertySchemaError {
    /// Name of the offending property.
    pub property: String,
    /// Why it was rejected.
    pub reason: String,
}

// ---------------------------------------------------------------------------
// Declarative (flat) form
// ---------------------------------------------------------------------------

/// The flat property record used in catalog files.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawPropertyDefinition {
    name: String,
    #[serde(rename = "type")]
    property_type: PropertyType,
    #[serde(default = "default_true")]
    required: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    description: String,
    #[serde(default, alias = "default_value", skip_serializing_if = "Option::is_none")]
    default: Option<Value>,
    #[serde(default, skip_serializing_if = "RawValidation::is_empty")]
    validation: RawValidation,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RawValidation {
    #[serde(default, alias = "options", skip_serializing_if = "Option::is_none")]
    choices: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    min: Option<Number>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    max: Option<Number>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    min_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    max_length: Option<usize>,
}

impl RawValidation {
    const fn is_empty(&self) -> bool {
        self.choices.is_none()
            && self.min.is_none()
            && self.max.is_none()
            && self.min_length.is_none()
            && self.max_length.is_none()
    }
}

impl TryFrom<RawPropertyDefinition> for PropertyDefinition {
    type Error = PropertySchemaError;

    fn try_from(raw: RawPropertyDefinition) -> Result<Self, Self::Error> {
        let fail = |reason: String| PropertySchemaError {
            property: raw.name.clone(),
            reason,
        };
        let v = &raw.validation;
        let default = raw.default.clone().filter(|d| !d.is_null());

        let forbid = |present: bool, rule: &str| -> Result<(), PropertySchemaError> {
            if present {
                Err(fail(format!(
                    "`{rule}` is not a valid constraint for type {}",
                    raw.property_type
                )))
            } else {
                Ok(())
            }
        };

        let kind = match raw.property_type {
            PropertyType::String => {
                forbid(v.min.is_some(), "min")?;
                forbid(v.max.is_some(), "max")?;
                let choices = v
                    .choices
                    .as_ref()
                    .map(|list| {
                        list.iter()
                            .map(|c| {
                                c.as_str().map(str::to_owned).ok_or_else(|| {
                                    fail(format!("choice {c} is not a string"))
                                })
                            })
                            .collect::<Result<Vec<_>, _>>()
                    })
                    .transpose()?;
                let default = default
                    .map(|d| match d {
                        Value::String(s) => Ok(s),
                        other => Err(fail(format!("default {other} is not a string"))),
                    })
                    .transpose()?;
                PropertyKind::String(StringRules {
                    default,
                    choices,
                    min_length: v.min_length,
                    max_length: v.max_length,
                })
            }
            PropertyType::Integer => {
                forbid(v.choices.is_some(), "choices")?;
                forbid(v.min_length.is_some(), "min_length")?;
                forbid(v.max_length.is_some(), "max_length")?;
                let int = |n: &Number, what: &str| {
                    n.as_i64()
                        .ok_or_else(|| fail(format!("{what} {n} is not an integer")))
                };
                let default = default
                    .map(|d| {
                        d.as_i64()
                            .ok_or_else(|| fail(format!("default {d} is not an integer")))
                    })
                    .transpose()?;
                PropertyKind::Integer(IntegerRules {
                    default,
                    min: v.min.as_ref().map(|n| int(n, "min")).transpose()?,
                    max: v.max.as_ref().map(|n| int(n, "max")).transpose()?,
                })
            }
            PropertyType::Float => {
                forbid(v.choices.is_some(), "choices")?;
                forbid(v.min_length.is_some(), "min_length")?;
                forbid(v.max_length.is_some(), "max_length")?;
                let default = default
                    .map(|d| {
                        d.as_f64()
                            .ok_or_else(|| fail(format!("default {d} is not a number")))
                    })
                    .transpose()?;
                PropertyKind::Float(FloatRules {
                    default,
                    min: v.min.as_ref().and_then(Number::as_f64),
                    max: v.max.as_ref().and_then(Number::as_f64),
                })
            }
            PropertyType::Boolean | PropertyType::List | PropertyType::Dict => {
                forbid(v.choices.is_some(), "choices")?;
                forbid(v.min.is_some(), "min")?;
                forbid(v.max.is_some(), "max")?;
                forbid(v.min_length.is_some(), "min_length")?;
                forbid(v.max_length.is_some(), "max_length")?;
                match (raw.property_type, default) {
                    (PropertyType::Boolean, None) => PropertyKind::Boolean { default: None },
                    (PropertyType::Boolean, Some(Value::Bool(b))) => {
                        PropertyKind::Boolean { default: Some(b) }
                    }
                    (PropertyType::List, None) => PropertyKind::List { default: None },
                    (PropertyType::List, Some(Value::Array(a))) => {
                        PropertyKind::List { default: Some(a) }
                    }
                    (PropertyType::Dict, None) => PropertyKind::Dict { default: None },
                    (PropertyType::Dict, Some(Value::Object(o))) => {
                        PropertyKind::Dict { default: Some(o) }
                    }
                    (ty, Some(other)) => {
                        return Err(fail(format!("default {other} is not a valid {ty}")));
                    }
                    (ty, None) => {
                        return Err(fail(format!("unsupported property type {ty}")));
                    }
                }
            }
        };

        Ok(Self {
            name: raw.name,
            description: raw.description,
            required: raw.required,
            kind,
        })
    }
}

impl From<PropertyDefinition> for RawPropertyDefinition {
    fn from(def: PropertyDefinition) -> Self {
        let property_type = def.kind.property_type();
        let default = def.kind.default_value().map(PropertyValue::into_json);
        let validation = match def.kind {
            PropertyKind::String(rules) => RawValidation {
                choices: rules
                    .choices
                    .map(|c| c.into_iter().map(Value::String).collect()),
                min_length: rules.min_length,
                max_length: rules.max_length,
                ..RawValidation::default()
            },
            PropertyKind::Integer(rules) => RawValidation {
                min: rules.min.map(Number::from),
                max: rules.max.map(Number::from),
                ..RawValidation::default()
            },
            PropertyKind::Float(rules) => RawValidation {
                min: rules.min.and_then(Number::from_f64),
                max: rules.max.and_then(Number::from_f64),
                ..RawValidation::default()
            },
            PropertyKind::Boolean { .. } | PropertyKind::List { .. } | PropertyKind::Dict { .. } => {
                RawValidation::default()
            }
        };
        Self {
            name: def.name,
            property_type,
            required: def.required,
            description: def.description,
            default,
            validation,
        }
    }
}

// ---------------------------------------------------------------------------
// PropertyValue
// ---------------------------------------------------------------------------

/// A validated, typed property value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    /// Boolean value.
    Boolean(bool),
    /// Integer value.
    Integer(i64),
    /// Float value.
    Float(f64),
    /// Text value.
    String(String),
    /// List value.
    List(Vec<Value>),
    /// Dict value.
    Dict(Map<String, Value>),
}

impl PropertyValue {
    /// The text content of a string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// The numeric content of an integer or float value.
    #[allow(clippy::cast_precision_loss)] // property integers are small game values
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Convert back into an untyped JSON value.
    pub fn into_json(self) -> Value {
        match self {
            Self::Boolean(b) => Value::Bool(b),
            Self::Integer(i) => Value::from(i),
            Self::Float(f) => Number::from_f64(f).map_or(Value::Null, Value::Number),
            Self::String(s) => Value::String(s),
            Self::List(l) => Value::Array(l),
            Self::Dict(d) => Value::Object(d),
        }
    }
}

impl core::fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::String(s) => write!(f, "{s:?}"),
            Self::List(l) => write!(f, "{}", Value::Array(l.clone())),
            Self::Dict(d) => write!(f, "{}", Value::Object(d.clone())),
        }
    }
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// Declarative action catalog of a session.
///
/// Loaded once per session from configuration. `enabled_default_actions`
/// filters the built-in set; `None` enables every built-in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionCatalog {
    /// Session-specific action definitions.
    #[serde(default)]
    pub custom_actions: Vec<ActionDefinition>,
    /// Built-in actions to enable.
    #[serde(default)]
    pub enabled_default_actions: Option<Vec<ActionId>>,
    /// Category name -> member action ids.
    #[serde(default)]
    pub action_categories: BTreeMap<String, Vec<ActionId>>,
}
