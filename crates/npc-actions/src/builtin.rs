//! The fixed set of built-in actions every session starts from.
//!
//! | Action | Target | Energy | Category |
//! |---|---|---|---|
//! | `speak` | any | 1.0 | social |
//! | `move` | location (optional) | 5.0 | movement |
//! | `emote` | any (optional) | 2.0 | social |
//! | `interact` | any (optional) | 3.0 | utility |
//! | `wait` | none | 0.5 | utility |
//! | `remember` | none | 0.0 | utility |

use std::collections::BTreeMap;

use npc_types::{
    ActionDefinition, ActionId, FloatRules, IntegerRules, PropertyDefinition, PropertyKind,
    StringRules, TargetType, Visibility,
};

/// Identifier of the built-in `speak` action.
pub const SPEAK: &str = "speak";
/// Identifier of the built-in `move` action.
pub const MOVE: &str = "move";
/// Identifier of the built-in `emote` action.
pub const EMOTE: &str = "emote";
/// Identifier of the built-in `interact` action.
pub const INTERACT: &str = "interact";
/// Identifier of the built-in `wait` action.
pub const WAIT: &str = "wait";
/// Identifier of the built-in `remember` action.
pub const REMEMBER: &str = "remember";

/// Every built-in action id.
pub const BUILTIN_IDS: [&str; 6] = [SPEAK, MOVE, EMOTE, INTERACT, WAIT, REMEMBER];

const TONES: [&str; 8] = [
    "neutral",
    "friendly",
    "angry",
    "excited",
    "sad",
    "mysterious",
    "formal",
    "casual",
];

const EMOTIONS: [&str; 10] = [
    "happy",
    "sad",
    "angry",
    "excited",
    "curious",
    "confused",
    "surprised",
    "worried",
    "relieved",
    "proud",
];

const MOVEMENT_TYPES: [&str; 4] = ["walk", "run", "sneak", "rush"];

/// Build all built-in definitions.
pub fn builtin_actions() -> Vec<ActionDefinition> {
    vec![speak(), movement(), emote(), interact(), wait(), remember()]
}

/// Whether `id` names a built-in action.
pub fn is_builtin(id: &str) -> bool {
    BUILTIN_IDS.contains(&id)
}

fn text(default: Option<&str>) -> StringRules {
    StringRules {
        default: default.map(str::to_owned),
        ..StringRules::default()
    }
}

fn one_of(default: &str, choices: &[&str]) -> PropertyKind {
    PropertyKind::String(StringRules {
        default: Some(default.to_owned()),
        choices: Some(choices.iter().map(|c| (*c).to_owned()).collect()),
        ..StringRules::default()
    })
}

fn energy(amount: f64) -> BTreeMap<String, f64> {
    BTreeMap::from([(npc_types::state::ENERGY.to_owned(), amount)])
}

fn base(id: &str, name: &str, description: &str, category: &str) -> ActionDefinition {
    let mut def = ActionDefinition::new(ActionId::new(id), name);
    def.description = description.to_owned();
    def.category = Some(category.to_owned());
    def
}

fn speak() -> ActionDefinition {
    let mut def = base(SPEAK, "Speak", "Say something to someone", "social");
    def.target_type = TargetType::Any;
    def.requires_target = true;
    def.cost = energy(1.0);
    def.properties = vec![
        PropertyDefinition::required(
            "message",
            PropertyKind::String(StringRules {
                min_length: Some(1),
                max_length: Some(500),
                ..StringRules::default()
            }),
        )
        .with_description("What to say to the target"),
        PropertyDefinition::optional("tone", one_of("neutral", &TONES))
            .with_description("Tone of voice"),
    ];
    def
}

fn movement() -> ActionDefinition {
    let mut def = base(MOVE, "Move", "Move to a different location", "movement");
    def.target_type = TargetType::Location;
    def.cost = energy(5.0);
    def.properties = vec![
        PropertyDefinition::required("destination", PropertyKind::String(text(None)))
            .with_description("Location to move to"),
        PropertyDefinition::optional("movement_type", one_of("walk", &MOVEMENT_TYPES))
            .with_description("How to move"),
        PropertyDefinition::optional("reason", PropertyKind::String(text(Some(""))))
            .with_description("Why the move happens"),
    ];
    def
}

fn emote() -> ActionDefinition {
    let mut def = base(EMOTE, "Emote", "Visibly express an emotion", "social");
    def.target_type = TargetType::Any;
    def.cost = energy(2.0);
    def.affects_mood = true;
    def.properties = vec![
        PropertyDefinition::required(
            "emotion",
            PropertyKind::String(StringRules {
                choices: Some(EMOTIONS.iter().map(|e| (*e).to_owned()).collect()),
                ..StringRules::default()
            }),
        )
        .with_description("Emotion to express"),
        PropertyDefinition::optional(
            "intensity",
            PropertyKind::Integer(IntegerRules {
                default: Some(5),
                min: Some(1),
                max: Some(10),
            }),
        )
        .with_description("1 = subtle, 10 = very intense"),
    ];
    def
}

fn interact() -> ActionDefinition {
    let mut def = base(INTERACT, "Interact", "Interact with an object, item or character", "utility");
    def.target_type = TargetType::Any;
    def.cost = energy(3.0);
    def.properties = vec![
        PropertyDefinition::required("interaction_type", PropertyKind::String(text(None)))
            .with_description("use, examine, take, give, open, close, activate, repair, clean, craft"),
        PropertyDefinition::optional("item", PropertyKind::String(text(Some(""))))
            .with_description("Item used in the interaction"),
    ];
    def
}

fn wait() -> ActionDefinition {
    let mut def = base(WAIT, "Wait", "Pause for a moment", "utility");
    def.cost = energy(0.5);
    def.creates_memory = false;
    def.visibility = Visibility::Nearby;
    def.properties = vec![
        PropertyDefinition::optional(
            "duration",
            PropertyKind::Float(FloatRules {
                default: Some(1.0),
                min: Some(0.1),
                max: Some(10.0),
            }),
        )
        .with_description("Seconds to wait"),
        PropertyDefinition::optional("reason", PropertyKind::String(text(Some("thinking"))))
            .with_description("Why the agent waits"),
    ];
    def
}

fn remember() -> ActionDefinition {
    let mut def = base(REMEMBER, "Remember", "Commit something to long-term memory", "utility");
    def.visibility = Visibility::Private;
    def.properties = vec![
        PropertyDefinition::required(
            "content",
            PropertyKind::String(StringRules {
                min_length: Some(1),
                max_length: Some(1000),
                ..StringRules::default()
            }),
        )
        .with_description("What to remember"),
        PropertyDefinition::optional("about", PropertyKind::String(text(None)))
            .with_description("Who or what the memory concerns"),
    ];
    def
}
