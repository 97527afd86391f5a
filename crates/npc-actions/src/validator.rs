//! Property validation.
//!
//! Properties are checked in declaration order:
//! 1. absent + required -> [`ValidationError::MissingRequiredProperty`]
//! 2. absent + optional -> declared default (omitted when there is none)
//! 3. coercion into the declared type -> [`ValidationError::TypeMismatch`]
//! 4. type-specific constraints -> [`ValidationError::ConstraintViolation`]
//!
//! A JSON `null` counts as absent. Undeclared properties are handled by
//! the validator's [`UnknownPropertyPolicy`]. Validation is pure: it reads
//! only the definition and the bag it is given.

use npc_types::{
    ActionDefinition, FloatRules, IntegerRules, PropertyBag, PropertyDefinition, PropertyKind,
    PropertyValue, StringRules, ValidatedProperties,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ValidationError;

/// What to do with properties the action does not declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownPropertyPolicy {
    /// Silently drop them.
    #[default]
    Drop,
    /// Fail with [`ValidationError::UnknownProperty`].
    Reject,
}

/// Validates raw property bags against action definitions.
#[derive(Debug, Clone, Copy, Default)]
pub struct PropertyValidator {
    policy: UnknownPropertyPolicy,
}

impl PropertyValidator {
    /// A validator with the given unknown-property policy.
    pub const fn new(policy: UnknownPropertyPolicy) -> Self {
        Self { policy }
    }

    /// The unknown-property policy in effect.
    pub const fn policy(&self) -> UnknownPropertyPolicy {
        self.policy
    }

    /// Validate `raw` against `definition`.
    pub fn validate(
        &self,
        definition: &ActionDefinition,
        raw: &PropertyBag,
    ) -> Result<ValidatedProperties, ValidationError> {
        if self.policy == UnknownPropertyPolicy::Reject
            && let Some(unknown) = raw
                .iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, _)| k)
                .find(|k| definition.property(k).is_none())
        {
            return Err(ValidationError::UnknownProperty {
                property: unknown.clone(),
            });
        }

        let mut validated = ValidatedProperties::new();
        for prop in &definition.properties {
            match raw.get(&prop.name).filter(|v| !v.is_null()) {
                Some(value) => {
                    let typed = coerce(prop, value)?;
                    check_constraints(prop, &typed)?;
                    validated.insert(prop.name.clone(), typed);
                }
                None if prop.required => {
                    return Err(ValidationError::MissingRequiredProperty {
                        property: prop.name.clone(),
                    });
                }
                None => {
                    if let Some(default) = prop.kind.default_value() {
                        validated.insert(prop.name.clone(), default);
                    }
                }
            }
        }
        Ok(validated)
    }
}

/// Validate with the default (lenient) policy.
pub fn validate(
    definition: &ActionDefinition,
    raw: &PropertyBag,
) -> Result<ValidatedProperties, ValidationError> {
    PropertyValidator::default().validate(definition, raw)
}

// ---------------------------------------------------------------------------
// Coercion
// ---------------------------------------------------------------------------

fn coerce(prop: &PropertyDefinition, value: &Value) -> Result<PropertyValue, ValidationError> {
    let coerced = match &prop.kind {
        PropertyKind::String(_) => value.as_str().map(|s| PropertyValue::String(s.to_owned())),
        PropertyKind::Integer(_) => coerce_integer(value).map(PropertyValue::Integer),
        PropertyKind::Float(_) => coerce_float(value).map(PropertyValue::Float),
        PropertyKind::Boolean { .. } => coerce_boolean(value).map(PropertyValue::Boolean),
        PropertyKind::List { .. } => value.as_array().cloned().map(PropertyValue::List),
        PropertyKind::Dict { .. } => value.as_object().cloned().map(PropertyValue::Dict),
    };
    coerced.ok_or_else(|| ValidationError::TypeMismatch {
        property: prop.name.clone(),
        expected: prop.property_type(),
        got: json_type(value).to_owned(),
    })
}

fn coerce_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(integral)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(integral))
        }
        _ => None,
    }
}

/// An integer-valued float as `i64`.
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss, clippy::float_cmp)]
fn integral(f: f64) -> Option<i64> {
    let in_range = f >= i64::MIN as f64 && f < i64::MAX as f64;
    (f.is_finite() && f.fract() == 0.0 && in_range).then_some(f as i64)
}

fn coerce_float(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

#[allow(clippy::float_cmp)]
fn coerce_boolean(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_f64() {
            Some(f) if f == 1.0 => Some(true),
            Some(f) if f == 0.0 => Some(false),
            _ => None,
        },
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Some(true),
            "false" | "no" | "off" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
    }
}

// ---------------------------------------------------------------------------
// Constraints
// ---------------------------------------------------------------------------

fn check_constraints(prop: &PropertyDefinition, value: &PropertyValue) -> Result<(), ValidationError> {
    let violation = |rule: String| ValidationError::ConstraintViolation {
        property: prop.name.clone(),
        rule,
        value: value.to_string(),
    };
    match (&prop.kind, value) {
        (PropertyKind::String(rules), PropertyValue::String(s)) => check_string(rules, s).map_err(violation),
        (PropertyKind::Integer(rules), PropertyValue::Integer(i)) => check_integer(rules, *i).map_err(violation),
        (PropertyKind::Float(rules), PropertyValue::Float(f)) => check_float(rules, *f).map_err(violation),
        _ => Ok(()),
    }
}

fn check_string(rules: &StringRules, s: &str) -> Result<(), String> {
    if let Some(choices) = &rules.choices
        && !choices.iter().any(|c| c == s)
    {
        return Err(format!("choices [{}]", choices.join(", ")));
    }
    let len = s.chars().count();
    if let Some(min) = rules.min_length
        && len < min
    {
        return Err(format!("min_length >= {min}"));
    }
    if let Some(max) = rules.max_length
        && len > max
    {
        return Err(format!("max_length <= {max}"));
    }
    Ok(())
}

fn check_integer(rules: &IntegerRules, i: i64) -> Result<(), String> {
    if let Some(min) = rules.min
        && i < min
    {
        return Err(format!("min >= {min}"));
    }
    if let Some(max) = rules.max
        && i > max
    {
        return Err(format!("max <= {max}"));
    }
    Ok(())
}

fn check_float(rules: &FloatRules, f: f64) -> Result<(), String> {
    if let Some(min) = rules.min
        && f < min
    {
        return Err(format!("min >= {min}"));
    }
    if let Some(max) = rules.max
        && f > max
    {
        return Err(format!("max <= {max}"));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use npc_types::PropertyType;
    use serde_json::json;

    use super::*;
    use crate::builtin;

    fn bag(value: Value) -> PropertyBag {
        serde_json::from_value(value).unwrap()
    }

    fn def(id: &str) -> ActionDefinition {
        builtin::builtin_actions()
            .into_iter()
            .find(|d| d.id.as_str() == id)
            .unwrap()
    }

    #[test]
    fn fills_defaults_and_drops_unknown_keys() {
        let out = validate(&def("speak"), &bag(json!({"message": "Hello", "volume": 11}))).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out["message"], PropertyValue::String("Hello".to_owned()));
        assert_eq!(out["tone"], PropertyValue::String("neutral".to_owned()));
        assert!(!out.contains_key("volume"));
    }

    #[test]
    fn every_declared_property_is_present_when_defaults_exist() {
        let wait = def("wait");
        let out = validate(&wait, &PropertyBag::new()).unwrap();
        let keys: Vec<_> = out.keys().cloned().collect();
        let declared: Vec<_> = wait.properties.iter().map(|p| p.name.clone()).collect();
        assert_eq!(keys.len(), declared.len());
        assert!(declared.iter().all(|d| keys.contains(d)));
    }

    #[test]
    fn missing_required_names_the_property() {
        let err = validate(&def("speak"), &bag(json!({"tone": "friendly"}))).unwrap_err();
        assert_eq!(
            err,
            ValidationError::MissingRequiredProperty {
                property: "message".to_owned()
            }
        );
        let err = validate(&def("speak"), &bag(json!({"message": null}))).unwrap_err();
        assert!(matches!(err, ValidationError::MissingRequiredProperty { .. }));
    }

    #[test]
    fn numeric_coercion() {
        let emote = def("emote");
        let out = validate(&emote, &bag(json!({"emotion": "happy", "intensity": "7"}))).unwrap();
        assert_eq!(out["intensity"], PropertyValue::Integer(7));
        let out = validate(&emote, &bag(json!({"emotion": "happy", "intensity": 3.0}))).unwrap();
        assert_eq!(out["intensity"], PropertyValue::Integer(3));

        let err = validate(&emote, &bag(json!({"emotion": "happy", "intensity": 3.5}))).unwrap_err();
        assert_eq!(
            err,
            ValidationError::TypeMismatch {
                property: "intensity".to_owned(),
                expected: PropertyType::Integer,
                got: "float".to_owned(),
            }
        );

        let out = validate(&def("wait"), &bag(json!({"duration": "2.5"}))).unwrap();
        assert_eq!(out["duration"], PropertyValue::Float(2.5));
        let out = validate(&def("wait"), &bag(json!({"duration": 2}))).unwrap();
        assert_eq!(out["duration"], PropertyValue::Float(2.0));
    }

    #[test]
    fn boolean_tokens() {
        let mut trade = ActionDefinition::new("trade", "Trade");
        trade.properties = vec![PropertyDefinition::required(
            "negotiable",
            PropertyKind::Boolean { default: None },
        )];
        for (raw, expected) in [
            (json!(true), true),
            (json!("YES"), true),
            (json!("off"), false),
            (json!(1), true),
            (json!("0"), false),
        ] {
            let out = validate(&trade, &bag(json!({ "negotiable": raw }))).unwrap();
            assert_eq!(out["negotiable"], PropertyValue::Boolean(expected));
        }
        assert!(matches!(
            validate(&trade, &bag(json!({"negotiable": "maybe"}))),
            Err(ValidationError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn strings_and_collections_are_not_coerced() {
        let err = validate(&def("speak"), &bag(json!({"message": 42}))).unwrap_err();
        assert!(matches!(err, ValidationError::TypeMismatch { got, .. } if got == "integer"));

        let mut give = ActionDefinition::new("give", "Give");
        give.properties = vec![PropertyDefinition::required(
            "items",
            PropertyKind::List { default: None },
        )];
        assert!(validate(&give, &bag(json!({"items": "[1, 2]"}))).is_err());
        assert!(validate(&give, &bag(json!({"items": [1, 2]}))).is_ok());
    }

    #[test]
    fn constraint_violations() {
        let err = validate(&def("speak"), &bag(json!({"message": "hi", "tone": "smug"}))).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::ConstraintViolation { ref property, ref rule, .. }
                if property == "tone" && rule.starts_with("choices")
        ));

        let long = "x".repeat(501);
        let err = validate(&def("speak"), &bag(json!({ "message": long }))).unwrap_err();
        assert!(matches!(err, ValidationError::ConstraintViolation { ref rule, .. } if rule == "max_length <= 500"));

        // Length counts characters, not bytes.
        let accented = "\u{e9}".repeat(500);
        assert!(validate(&def("speak"), &bag(json!({ "message": accented }))).is_ok());

        let err = validate(&def("emote"), &bag(json!({"emotion": "sad", "intensity": 11}))).unwrap_err();
        assert!(matches!(err, ValidationError::ConstraintViolation { ref rule, .. } if rule == "max <= 10"));
        assert!(validate(&def("emote"), &bag(json!({"emotion": "sad", "intensity": 10}))).is_ok());
        assert!(validate(&def("wait"), &bag(json!({"duration": 0.05}))).is_err());
    }

    #[test]
    fn defaults_are_deep_copies() {
        let mut tag = ActionDefinition::new("tag", "Tag");
        tag.properties = vec![PropertyDefinition::optional(
            "labels",
            PropertyKind::List {
                default: Some(vec![json!("a")]),
            },
        )];
        let mut first = validate(&tag, &PropertyBag::new()).unwrap();
        if let Some(PropertyValue::List(list)) = first.get_mut("labels") {
            list.push(json!("b"));
        }
        let second = validate(&tag, &PropertyBag::new()).unwrap();
        assert_eq!(second["labels"], PropertyValue::List(vec![json!("a")]));
    }

    #[test]
    fn strict_policy_rejects_unknown_properties() {
        let strict = PropertyValidator::new(UnknownPropertyPolicy::Reject);
        let err = strict
            .validate(&def("speak"), &bag(json!({"message": "hi", "volume": 11})))
            .unwrap_err();
        assert_eq!(
            err,
            ValidationError::UnknownProperty {
                property: "volume".to_owned()
            }
        );
    }

    #[test]
    fn validation_is_idempotent() {
        let speak = def("speak");
        let raw = bag(json!({"message": "Hello", "tone": "friendly", "extra": true}));
        let before = raw.clone();
        let a = validate(&speak, &raw);
        let b = validate(&speak, &raw);
        assert_eq!(a, b);
        assert_eq!(raw, before);
    }
}
