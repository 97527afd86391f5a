//! Action schema registry.
//!
//! A registry is composed from the built-in set plus session-specific
//! custom definitions. Built-ins are filtered by an enabled set at lookup
//! time, so disabling one is reversible without re-registering it.

use std::collections::{BTreeMap, BTreeSet};

use npc_types::{ActionCatalog, ActionDefinition, ActionId};
use tracing::debug;

use crate::builtin;
use crate::error::SchemaError;

/// Category name that lists every available action.
pub const ALL_CATEGORY: &str = "all";

/// Registry of the action definitions in effect for one session.
#[derive(Debug, Clone, Default)]
pub struct ActionRegistry {
    definitions: BTreeMap<ActionId, ActionDefinition>,
    builtin_ids: BTreeSet<ActionId>,
    enabled_builtins: BTreeSet<ActionId>,
    categories: BTreeMap<String, BTreeSet<ActionId>>,
}

impl ActionRegistry {
    /// An empty registry with no built-ins.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every built-in action, all enabled.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for def in builtin::builtin_actions() {
            registry.builtin_ids.insert(def.id.clone());
            registry.enabled_builtins.insert(def.id.clone());
            registry.definitions.insert(def.id.clone(), def);
        }
        registry
    }

    /// Build the registry described by a session catalog.
    ///
    /// Custom actions may not reuse a built-in id; overriding a built-in
    /// requires an explicit [`register`](Self::register) with override.
    pub fn from_catalog(catalog: &ActionCatalog) -> Result<Self, SchemaError> {
        let mut registry = Self::with_builtins();
        if let Some(enabled) = &catalog.enabled_default_actions {
            registry.set_enabled_builtins(enabled.iter().cloned());
        }
        for def in &catalog.custom_actions {
            registry.register(def.clone(), false)?;
        }
        for (category, members) in &catalog.action_categories {
            registry
                .categories
                .entry(category.clone())
                .or_default()
                .extend(members.iter().cloned());
        }
        debug!(
            actions = registry.definitions.len(),
            enabled_builtins = registry.enabled_builtins.len(),
            categories = registry.categories.len(),
            "action registry built"
        );
        Ok(registry)
    }

    /// Register a definition.
    ///
    /// Fails with [`SchemaError::DuplicateAction`] when the id is taken and
    /// `allow_override` is false. Overriding a built-in turns it into a
    /// custom definition that is no longer subject to the enabled set.
    pub fn register(
        &mut self,
        definition: ActionDefinition,
        allow_override: bool,
    ) -> Result<(), SchemaError> {
        check_definition(&definition)?;
        let id = definition.id.clone();
        if self.definitions.contains_key(&id) && !allow_override {
            return Err(SchemaError::DuplicateAction(id));
        }
        self.builtin_ids.remove(&id);
        self.enabled_builtins.remove(&id);
        debug!(action = %id, allow_override, "action registered");
        self.definitions.insert(id, definition);
        Ok(())
    }

    /// Look up an available definition.
    pub fn get(&self, id: &ActionId) -> Result<&ActionDefinition, SchemaError> {
        self.definitions
            .get(id)
            .filter(|def| self.is_available(&def.id))
            .ok_or_else(|| SchemaError::UnknownAction(id.clone()))
    }

    /// Whether `id` is registered and not a disabled built-in.
    pub fn contains(&self, id: &ActionId) -> bool {
        self.get(id).is_ok()
    }

    /// Available definitions, optionally restricted to a category.
    ///
    /// A definition belongs to a category when its own `category` matches
    /// or the catalog's category map lists it. The `all` category lists
    /// everything available.
    pub fn list(&self, category: Option<&str>) -> Vec<&ActionDefinition> {
        let mapped = category.and_then(|c| self.categories.get(c));
        self.definitions
            .values()
            .filter(|def| self.is_available(&def.id))
            .filter(|def| match category {
                None | Some(ALL_CATEGORY) => true,
                Some(c) => {
                    def.category.as_deref() == Some(c)
                        || mapped.is_some_and(|members| members.contains(&def.id))
                }
            })
            .collect()
    }

    /// Every category name known to the registry.
    pub fn categories(&self) -> BTreeSet<&str> {
        self.definitions
            .values()
            .filter_map(|def| def.category.as_deref())
            .chain(self.categories.keys().map(String::as_str))
            .collect()
    }

    /// Replace the enabled built-in set. Unknown ids are ignored.
    pub fn set_enabled_builtins(&mut self, ids: impl IntoIterator<Item = ActionId>) {
        self.enabled_builtins = ids
            .into_iter()
            .filter(|id| self.builtin_ids.contains(id))
            .collect();
    }

    /// Enable a built-in. Returns `false` when `id` is not a built-in.
    pub fn enable_builtin(&mut self, id: &ActionId) -> bool {
        if !self.builtin_ids.contains(id) {
            return false;
        }
        self.enabled_builtins.insert(id.clone());
        true
    }

    /// Disable a built-in. Returns `false` when `id` is not a built-in.
    pub fn disable_builtin(&mut self, id: &ActionId) -> bool {
        if !self.builtin_ids.contains(id) {
            return false;
        }
        self.enabled_builtins.remove(id);
        true
    }

    /// Every resource named in an available definition's cost.
    pub fn cost_resources(&self) -> BTreeSet<&str> {
        self.list(None)
            .into_iter()
            .flat_map(|def| def.cost.keys().map(String::as_str))
            .collect()
    }

    /// Number of available definitions.
    pub fn len(&self) -> usize {
        self.list(None).len()
    }

    /// Whether no definitions are available.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_available(&self, id: &ActionId) -> bool {
        !self.builtin_ids.contains(id) || self.enabled_builtins.contains(id)
    }
}

/// Structural checks the property schema types cannot express.
fn check_definition(def: &ActionDefinition) -> Result<(), SchemaError> {
    let mismatch = |reason: String| SchemaError::DefinitionMismatch {
        action: def.id.clone(),
        reason,
    };
    if def.id.as_str().is_empty() {
        return Err(mismatch("empty action id".to_owned()));
    }
    let mut seen = BTreeSet::new();
    for prop in &def.properties {
        if !seen.insert(prop.name.as_str()) {
            return Err(mismatch(format!("property {} declared twice", prop.name)));
        }
    }
    if def.cooldown_secs < 0.0 || !def.cooldown_secs.is_finite() {
        return Err(mismatch(format!("invalid cooldown {}", def.cooldown_secs)));
    }
    if let Some((resource, amount)) = def
        .cost
        .iter()
        .find(|(_, amount)| **amount < 0.0 || !amount.is_finite())
    {
        return Err(mismatch(format!("invalid cost {amount} for {resource}")));
    }
    Ok(())
}
