//! Type-safe identifier wrappers.
//!
//! Agents, actions, locations and sessions are named by caller-chosen
//! strings (`marcus_blacksmith`, `speak`, `town_square`). Each gets its own
//! newtype so an agent id can never be passed where an action id is
//! expected. Events are identified by UUID v7 (time-ordered).

use std::borrow::Borrow;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Generates a newtype wrapper around [`String`] with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create an identifier from any string-like value.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Borrow the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Return the inner [`String`] value.
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

define_id! {
    /// Unique identifier for an agent (NPC) within a session.
    AgentId
}

define_id! {
    /// Unique identifier for an action definition in a registry.
    ActionId
}

define_id! {
    /// Unique identifier for a location in the world graph.
    LocationId
}

define_id! {
    /// Unique identifier for a session.
    SessionId
}

/// Unique identifier for a submitted event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(pub Uuid);

impl EventId {
    /// Create a new identifier using UUID v7 (time-ordered).
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Return the inner [`Uuid`] value.
    pub const fn into_inner(self) -> Uuid {
        self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for EventId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    #[test]
    fn string_ids_serialize_transparently() {
        let id = AgentId::new("marcus_blacksmith");
        let json = serde_json::to_string(&id).ok();
        assert_eq!(json.as_deref(), Some("\"marcus_blacksmith\""));
    }

    #[test]
    fn map_lookup_by_str() {
        let mut agents = BTreeMap::new();
        agents.insert(AgentId::from("elena"), 1_u32);
        assert_eq!(agents.get("elena"), Some(&1));
        assert_eq!(agents.get("nobody"), None);
    }

    #[test]
    fn event_ids_are_unique() {
        assert_ne!(EventId::new(), EventId::new());
    }
}
