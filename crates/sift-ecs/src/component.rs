//! Component names, payloads, and per-entity component bags.
//!
//! Components are identified by name. Every name seen by a [`World`](crate::world::World)
//! is interned once in a [`ComponentRegistry`], producing a [`ComponentId`] that
//! is used as the key in each entity's [`ComponentBag`] and in compiled query
//! filters. Payloads are schemaless [`ComponentValue`]s.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// The payload stored under a component name. Opaque to the store.
pub type ComponentValue = serde_json::Value;

// ---------------------------------------------------------------------------
// ComponentId
// ---------------------------------------------------------------------------

/// Opaque, lightweight identifier for an interned component name.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId(pub(crate) u32);

impl fmt::Debug for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComponentId({})", self.0)
    }
}

// ---------------------------------------------------------------------------
// ComponentRegistry
// ---------------------------------------------------------------------------

/// Interns component names into [`ComponentId`]s.
///
/// Interning is idempotent: the same name always maps to the same id for the
/// lifetime of the registry. Names are never forgotten.
#[derive(Debug, Default)]
pub struct ComponentRegistry {
    by_name: HashMap<String, ComponentId>,
    /// Indexed by `ComponentId.0`.
    names: Vec<String>,
}

impl ComponentRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the id for `name`, assigning a fresh one on first sight.
    pub fn intern(&mut self, name: &str) -> ComponentId {
        if let Some(&id) = self.by_name.get(name) {
            return id;
        }
        let id = ComponentId(self.names.len() as u32);
        self.names.push(name.to_owned());
        self.by_name.insert(name.to_owned(), id);
        id
    }

    /// Look up a name without interning it.
    pub fn lookup(&self, name: &str) -> Option<ComponentId> {
        self.by_name.get(name).copied()
    }

    /// The name an id was interned from.
    pub fn name(&self, id: ComponentId) -> Option<&str> {
        self.names.get(id.0 as usize).map(String::as_str)
    }

    /// Total number of interned names.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether no name has been interned yet.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// All interned names, sorted.
    pub fn registered_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.names.iter().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

// ---------------------------------------------------------------------------
// SetOutcome
// ---------------------------------------------------------------------------

/// What a [`World::set_component`](crate::world::World::set_component) call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOutcome {
    /// The name was not bound before; queries were re-evaluated.
    Inserted,
    /// The name was already bound; only the value changed.
    Updated,
}

impl SetOutcome {
    /// Whether this was a dirty transition.
    pub fn is_inserted(self) -> bool {
        matches!(self, SetOutcome::Inserted)
    }
}

// ---------------------------------------------------------------------------
// ComponentBag
// ---------------------------------------------------------------------------

/// One entity's components.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComponentBag {
    components: BTreeMap<ComponentId, ComponentValue>,
}

impl ComponentBag {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn contains(&self, id: ComponentId) -> bool {
        self.components.contains_key(&id)
    }

    pub fn get(&self, id: ComponentId) -> Option<&ComponentValue> {
        self.components.get(&id)
    }

    pub fn get_mut(&mut self, id: ComponentId) -> Option<&mut ComponentValue> {
        self.components.get_mut(&id)
    }

    /// Bind `id` to `value`, returning the previous value if there was one.
    pub fn insert(&mut self, id: ComponentId, value: ComponentValue) -> Option<ComponentValue> {
        self.components.insert(id, value)
    }

    pub fn remove(&mut self, id: ComponentId) -> Option<ComponentValue> {
        self.components.remove(&id)
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Iterate bound components in id order.
    pub fn iter(&self) -> impl Iterator<Item = (ComponentId, &ComponentValue)> {
        self.components.iter().map(|(id, value)| (*id, value))
    }

    /// Mutable iteration; every yielded reference points at a distinct value.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (ComponentId, &mut ComponentValue)> {
        self.components.iter_mut().map(|(id, value)| (*id, value))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
