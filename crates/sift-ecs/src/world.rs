//! The [`World`] is the top-level container. It owns the entity allocator,
//! the component-name registry, every entity's [`ComponentBag`], and the state
//! of every live query.
//!
//! All structural mutations funnel through two paths:
//!
//! - **dirty transitions** (a component name becomes newly bound or unbound,
//!   or an entity is created) re-evaluate the affected entity against the
//!   queries that reference the changed name, and only that entity;
//! - **updates** (a new value for an already-bound name) never touch query
//!   membership.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::component::{ComponentBag, ComponentId, ComponentRegistry, ComponentValue, SetOutcome};
use crate::entity::{EntityAllocator, EntityId};
use crate::query::{QueryId, QueryState};
use crate::EcsError;

// ---------------------------------------------------------------------------
// EntityRef
// ---------------------------------------------------------------------------

/// Read-only view of one entity's components, addressed by name.
#[derive(Clone, Copy)]
pub struct EntityRef<'w> {
    id: EntityId,
    bag: &'w ComponentBag,
    registry: &'w ComponentRegistry,
}

impl<'w> EntityRef<'w> {
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// The value bound to `name`, if any.
    pub fn get(&self, name: &str) -> Option<&'w ComponentValue> {
        self.registry.lookup(name).and_then(|id| self.bag.get(id))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.registry
            .lookup(name)
            .is_some_and(|id| self.bag.contains(id))
    }

    pub fn len(&self) -> usize {
        self.bag.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bag.is_empty()
    }

    /// Iterate `(name, value)` pairs in interning order.
    pub fn iter(&self) -> impl Iterator<Item = (&'w str, &'w ComponentValue)> + 'w {
        let (bag, registry) = (self.bag, self.registry);
        bag.iter()
            .filter_map(move |(id, value)| registry.name(id).map(|name| (name, value)))
    }

    /// Names of all bound components, sorted.
    pub fn component_names(&self) -> Vec<&'w str> {
        let mut names: Vec<&str> = self.iter().map(|(name, _)| name).collect();
        names.sort_unstable();
        names
    }

    /// Copy the bag out as a name-keyed map (sorted by name).
    pub fn to_map(&self) -> BTreeMap<String, ComponentValue> {
        self.iter()
            .map(|(name, value)| (name.to_owned(), value.clone()))
            .collect()
    }
}

impl std::fmt::Debug for EntityRef<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityRef")
            .field("id", &self.id)
            .field("components", &self.component_names())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// World
// ---------------------------------------------------------------------------

/// The top-level ECS container.
///
/// Provides the entity store (create/remove entities, attach/detach
/// components by name) and owns the membership sets of all queries created
/// against it. See the [`query`](crate::query) module for the query API.
pub struct World {
    /// Entity ID allocator and live-entity bookkeeping.
    pub(crate) allocator: EntityAllocator,
    /// Component-name interner.
    pub(crate) registry: ComponentRegistry,
    /// Entity ID -> component bag.
    pub(crate) entities: BTreeMap<EntityId, ComponentBag>,
    /// Live queries, in creation order.
    pub(crate) queries: BTreeMap<QueryId, QueryState>,
    /// Next query handle to assign. Handles are never reused.
    pub(crate) next_query: u32,
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("entity_count", &self.entities.len())
            .field("query_count", &self.queries.len())
            .field("component_names", &self.registry.len())
            .finish()
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl World {
    /// Create a new, empty world.
    pub fn new() -> Self {
        Self {
            allocator: EntityAllocator::new(),
            registry: ComponentRegistry::new(),
            entities: BTreeMap::new(),
            queries: BTreeMap::new(),
            next_query: 0,
        }
    }

    /// Read-only access to the component-name registry.
    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    // -- entity lifecycle ---------------------------------------------------

    /// Create an entity with an empty component bag.
    ///
    /// Queries whose filter is satisfied by an empty bag (no `all` and no
    /// `any` names) pick the new entity up immediately.
    pub fn create_entity(&mut self) -> EntityId {
        let entity = self.allocator.allocate();
        self.entities.insert(entity, ComponentBag::new());
        self.refresh_membership(entity, None);
        trace!(%entity, "entity created");
        entity
    }

    /// Create an entity and attach the given components in order.
    pub fn create_entity_with<I, S>(&mut self, components: I) -> EntityId
    where
        I: IntoIterator<Item = (S, ComponentValue)>,
        S: AsRef<str>,
    {
        let entity = self.create_entity();
        for (name, value) in components {
            // The entity was created above, so binding cannot miss.
            let _ = self.bind(entity, name.as_ref(), value);
        }
        entity
    }

    /// Remove an entity, discarding its components and evicting it from
    /// every query.
    ///
    /// Removing an id that is not alive is reported as
    /// [`EcsError::EntityNotFound`] and leaves the world untouched.
    pub fn remove_entity(&mut self, entity: EntityId) -> Result<(), EcsError> {
        self.entities
            .remove(&entity)
            .ok_or(EcsError::EntityNotFound { entity })?;
        self.allocator.release(entity);
        for query in self.queries.values_mut() {
            query.members.remove(&entity);
        }
        trace!(%entity, "entity removed");
        Ok(())
    }

    /// Whether `entity` is currently alive.
    pub fn contains_entity(&self, entity: EntityId) -> bool {
        self.entities.contains_key(&entity)
    }

    /// Number of live entities.
    pub fn entity_count(&self) -> usize {
        debug_assert_eq!(self.allocator.live_count(), self.entities.len());
        self.allocator.live_count()
    }

    /// The most recently allocated id, whether or not it is still alive.
    pub fn last_entity_id(&self) -> Option<EntityId> {
        self.allocator.last_id()
    }

    /// All live entity ids, ascending.
    pub fn entities(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.entities.keys().copied()
    }

    /// Read view of an entity's components.
    pub fn get_entity(&self, entity: EntityId) -> Result<EntityRef<'_>, EcsError> {
        Ok(EntityRef {
            id: entity,
            bag: self.bag(entity)?,
            registry: &self.registry,
        })
    }

    // -- component access ---------------------------------------------------

    /// Bind `name` to `value` on `entity`.
    ///
    /// When the name was not bound before this is a dirty transition and
    /// every query referencing `name` re-evaluates this entity. Overwriting an
    /// existing binding only replaces the value.
    pub fn set_component(
        &mut self,
        entity: EntityId,
        name: &str,
        value: impl Into<ComponentValue>,
    ) -> Result<SetOutcome, EcsError> {
        self.bind(entity, name, value.into())
            .ok_or(EcsError::EntityNotFound { entity })
    }

    /// Serialize `value` and bind it under `name`.
    pub fn set_serialized<T: Serialize>(
        &mut self,
        entity: EntityId,
        name: &str,
        value: &T,
    ) -> Result<SetOutcome, EcsError> {
        let value =
            serde_json::to_value(value).map_err(|e| EcsError::ComponentSerialization {
                component: name.to_owned(),
                details: e.to_string(),
            })?;
        self.set_component(entity, name, value)
    }

    /// Replace the value of a component that is already bound.
    ///
    /// Fails with [`EcsError::ComponentNotFound`] if `name` is not bound.
    /// Never re-evaluates queries.
    pub fn update_component(
        &mut self,
        entity: EntityId,
        name: &str,
        value: impl Into<ComponentValue>,
    ) -> Result<(), EcsError> {
        let slot = self
            .component_mut(entity, name)?
            .ok_or_else(|| EcsError::ComponentNotFound {
                entity,
                component: name.to_owned(),
            })?;
        *slot = value.into();
        Ok(())
    }

    /// The value bound to `name` on `entity`, if any.
    pub fn component(
        &self,
        entity: EntityId,
        name: &str,
    ) -> Result<Option<&ComponentValue>, EcsError> {
        let bag = self.bag(entity)?;
        Ok(self.registry.lookup(name).and_then(|id| bag.get(id)))
    }

    /// Mutable access to a bound value. Editing in place is an update, so
    /// query membership is unaffected.
    pub fn component_mut(
        &mut self,
        entity: EntityId,
        name: &str,
    ) -> Result<Option<&mut ComponentValue>, EcsError> {
        let bag = self
            .entities
            .get_mut(&entity)
            .ok_or(EcsError::EntityNotFound { entity })?;
        Ok(self.registry.lookup(name).and_then(|id| bag.get_mut(id)))
    }

    /// Deserialize the value bound to `name` into `T`.
    pub fn component_as<T: DeserializeOwned>(
        &self,
        entity: EntityId,
        name: &str,
    ) -> Result<Option<T>, EcsError> {
        let Some(value) = self.component(entity, name)? else {
            return Ok(None);
        };
        T::deserialize(value)
            .map(Some)
            .map_err(|e| EcsError::ComponentDeserialization {
                component: name.to_owned(),
                details: e.to_string(),
            })
    }

    /// Whether `entity` is alive and has `name` bound.
    pub fn has_component(&self, entity: EntityId, name: &str) -> bool {
        let Some(bag) = self.entities.get(&entity) else {
            return false;
        };
        self.registry
            .lookup(name)
            .is_some_and(|id| bag.contains(id))
    }

    /// Look up several components at once.
    ///
    /// The result has one slot per requested name, in request order: the bound
    /// value, or `None` when the name is not bound.
    pub fn get_components<S: AsRef<str>>(
        &self,
        entity: EntityId,
        names: &[S],
    ) -> Result<Vec<Option<&ComponentValue>>, EcsError> {
        let bag = self.bag(entity)?;
        Ok(names
            .iter()
            .map(|name| {
                self.registry
                    .lookup(name.as_ref())
                    .and_then(|id| bag.get(id))
            })
            .collect())
    }

    /// Unbind `name` from `entity`, returning the removed value.
    ///
    /// If the name was bound, every query referencing it re-evaluates this
    /// entity: members that no longer match are evicted, and entities that
    /// now match (because a `none` name went away) join. Removing a name that
    /// is not bound is a no-op.
    pub fn remove_component(
        &mut self,
        entity: EntityId,
        name: &str,
    ) -> Result<Option<ComponentValue>, EcsError> {
        let bag = self
            .entities
            .get_mut(&entity)
            .ok_or(EcsError::EntityNotFound { entity })?;
        let Some(component) = self.registry.lookup(name) else {
            return Ok(None);
        };
        let removed = bag.remove(component);
        if removed.is_some() {
            trace!(%entity, component = name, "component removed");
            self.refresh_membership(entity, Some(component));
        }
        Ok(removed)
    }

    // -- internals ------------------------------------------------------------

    pub(crate) fn bag(&self, entity: EntityId) -> Result<&ComponentBag, EcsError> {
        self.entities
            .get(&entity)
            .ok_or(EcsError::EntityNotFound { entity })
    }

    /// Bind without the error wrapper. `None` means the entity is not alive.
    fn bind(&mut self, entity: EntityId, name: &str, value: ComponentValue) -> Option<SetOutcome> {
        let bag = self.entities.get_mut(&entity)?;
        let component = self.registry.intern(name);
        if bag.insert(component, value).is_some() {
            return Some(SetOutcome::Updated);
        }
        trace!(%entity, component = name, "component inserted");
        self.refresh_membership(entity, Some(component));
        Some(SetOutcome::Inserted)
    }

    /// Re-evaluate one entity against the live queries.
    ///
    /// With `changed = Some(c)` only queries whose filter mentions `c` are
    /// visited; a transition on any other name cannot flip their predicate.
    fn refresh_membership(&mut self, entity: EntityId, changed: Option<ComponentId>) {
        let Some(bag) = self.entities.get(&entity) else {
            return;
        };
        for (query_id, query) in self.queries.iter_mut() {
            if let Some(component) = changed {
                if !query.compiled.references(component) {
                    continue;
                }
            }
            let matched = query.compiled.matches(bag);
            let flipped = if matched {
                query.members.insert(entity)
            } else {
                query.members.remove(&entity)
            };
            if flipped {
                trace!(query = %query_id, %entity, joined = matched, "query membership changed");
            }
        }
    }
}

/// A name-keyed copy of one entity, used for digests and debugging output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub entity: EntityId,
    pub components: BTreeMap<String, ComponentValue>,
}

impl World {
    /// Copy every live entity out as an [`EntityRecord`], ascending by id.
    pub fn records(&self) -> Vec<EntityRecord> {
        self.entities
            .iter()
            .map(|(&entity, bag)| EntityRecord {
                entity,
                components: EntityRef {
                    id: entity,
                    bag,
                    registry: &self.registry,
                }
                .to_map(),
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
