//! Live queries over component presence.
//!
//! A query is created from a [`QueryFilter`] with three name lists:
//!
//! - `all`: every listed name must be bound;
//! - `any`: at least one listed name must be bound (no constraint when empty);
//! - `none`: no listed name may be bound.
//!
//! On creation the filter is compiled against the world's name registry and
//! every existing entity is scanned once to seed the membership set. From then
//! on the [`World`] keeps the set current on every dirty transition, so
//! iterating a query never rescans the world.
//!
//! Iteration projects each member onto the `all ++ any` names, in declaration
//! order, yielding one `Option` slot per name (`none` names are never
//! projected). Members are visited in ascending [`EntityId`] order; callers
//! should not depend on that order.

use std::collections::btree_set;
use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::component::{ComponentBag, ComponentId, ComponentRegistry, ComponentValue};
use crate::entity::EntityId;
use crate::world::World;
use crate::EcsError;

// ---------------------------------------------------------------------------
// QueryId
// ---------------------------------------------------------------------------

/// Handle to a query registered in a [`World`]. Handles are never reused.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QueryId(pub(crate) u32);

impl fmt::Debug for QueryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "QueryId({})", self.0)
    }
}

impl fmt::Display for QueryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "q{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// QueryFilter
// ---------------------------------------------------------------------------

/// Declarative selection over component names.
///
/// Every list defaults to empty, so a filter can be deserialized from a
/// partial object such as `{"all": ["position"]}`. A filter with all three
/// lists empty matches every entity.
///
/// ```
/// use sift_ecs::query::QueryFilter;
///
/// let filter = QueryFilter::new()
///     .all(["position", "velocity"])
///     .none(["frozen"]);
/// assert_eq!(filter.projection().collect::<Vec<_>>(), ["position", "velocity"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryFilter {
    pub all: Vec<String>,
    pub any: Vec<String>,
    pub none: Vec<String>,
}

impl QueryFilter {
    /// An unconstrained filter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append names to the `all` list.
    pub fn all<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.all.extend(names.into_iter().map(Into::into));
        self
    }

    /// Append names to the `any` list.
    pub fn any<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.any.extend(names.into_iter().map(Into::into));
        self
    }

    /// Append names to the `none` list.
    pub fn none<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.none.extend(names.into_iter().map(Into::into));
        self
    }

    /// Whether the filter has no constraints at all.
    pub fn is_unconstrained(&self) -> bool {
        self.all.is_empty() && self.any.is_empty() && self.none.is_empty()
    }

    /// The projected names, `all` first, then `any`.
    pub fn projection(&self) -> impl Iterator<Item = &str> {
        self.all.iter().chain(self.any.iter()).map(String::as_str)
    }

    /// Number of slots each iteration step yields.
    pub fn projection_len(&self) -> usize {
        self.all.len() + self.any.len()
    }
}

// ---------------------------------------------------------------------------
// CompiledFilter
// ---------------------------------------------------------------------------

/// A [`QueryFilter`] with names resolved to [`ComponentId`]s.
#[derive(Debug, Clone)]
pub(crate) struct CompiledFilter {
    all: Vec<ComponentId>,
    any: Vec<ComponentId>,
    none: Vec<ComponentId>,
    /// `all ++ any`, in declaration order.
    projection: Vec<ComponentId>,
}

impl CompiledFilter {
    /// Resolve every name, interning the ones not seen before.
    pub(crate) fn compile(filter: &QueryFilter, registry: &mut ComponentRegistry) -> Self {
        let mut resolve = |names: &[String]| -> Vec<ComponentId> {
            names.iter().map(|n| registry.intern(n)).collect()
        };
        let all = resolve(&filter.all);
        let any = resolve(&filter.any);
        let none = resolve(&filter.none);
        let projection = all.iter().chain(any.iter()).copied().collect();
        Self {
            all,
            any,
            none,
            projection,
        }
    }

    /// The membership predicate.
    pub(crate) fn matches(&self, bag: &ComponentBag) -> bool {
        if !self.all.iter().all(|&id| bag.contains(id)) {
            return false;
        }
        if self.none.iter().any(|&id| bag.contains(id)) {
            return false;
        }
        if !self.any.is_empty() {
            return self.any.iter().any(|&id| bag.contains(id));
        }
        true
    }

    /// Whether a transition on `id` can change this filter's verdict.
    pub(crate) fn references(&self, id: ComponentId) -> bool {
        self.all.contains(&id) || self.any.contains(&id) || self.none.contains(&id)
    }

    pub(crate) fn projection(&self) -> &[ComponentId] {
        &self.projection
    }
}

/// Project a bag onto `projection`, one slot per id.
fn project<'b>(
    bag: &'b ComponentBag,
    projection: &[ComponentId],
) -> Vec<Option<&'b ComponentValue>> {
    projection.iter().map(|&id| bag.get(id)).collect()
}

// ---------------------------------------------------------------------------
// QueryState
// ---------------------------------------------------------------------------

/// A registered query: its filter plus the cached membership set.
#[derive(Debug, Clone)]
pub struct QueryState {
    pub(crate) id: QueryId,
    pub(crate) filter: QueryFilter,
    pub(crate) compiled: CompiledFilter,
    pub(crate) members: BTreeSet<EntityId>,
}

impl QueryState {
    pub fn id(&self) -> QueryId {
        self.id
    }

    /// The filter this query was created from.
    pub fn filter(&self) -> &QueryFilter {
        &self.filter
    }

    /// Number of current members.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, entity: EntityId) -> bool {
        self.members.contains(&entity)
    }

    /// Current members, ascending.
    pub fn entities(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.members.iter().copied()
    }
}

// ---------------------------------------------------------------------------
// QueryIter
// ---------------------------------------------------------------------------

/// Iterator over a query's members, yielding `(EntityId, projected components)`.
pub struct QueryIter<'w> {
    world: &'w World,
    projection: &'w [ComponentId],
    members: btree_set::Iter<'w, EntityId>,
}

impl<'w> Iterator for QueryIter<'w> {
    type Item = (EntityId, Vec<Option<&'w ComponentValue>>);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entity = *self.members.next()?;
            // Removal evicts from every query, so this lookup only misses on a bug.
            let Some(bag) = self.world.entities.get(&entity) else {
                continue;
            };
            return Some((entity, project(bag, self.projection)));
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, self.members.size_hint().1)
    }
}

// ---------------------------------------------------------------------------
// World query methods
// ---------------------------------------------------------------------------

impl World {
    /// Register a query and seed its membership with a full scan.
    pub fn create_query(&mut self, filter: QueryFilter) -> QueryId {
        let id = QueryId(self.next_query);
        self.next_query += 1;

        let compiled = CompiledFilter::compile(&filter, &mut self.registry);
        let members: BTreeSet<EntityId> = self
            .entities
            .iter()
            .filter(|(_, bag)| compiled.matches(bag))
            .map(|(&entity, _)| entity)
            .collect();

        debug!(
            query = %id,
            all = ?filter.all,
            any = ?filter.any,
            none = ?filter.none,
            members = members.len(),
            "query created"
        );
        self.queries.insert(
            id,
            QueryState {
                id,
                filter,
                compiled,
                members,
            },
        );
        id
    }

    /// Dispose of a query. Its handle is dead afterwards.
    pub fn remove_query(&mut self, query: QueryId) -> Result<QueryFilter, EcsError> {
        let state = self
            .queries
            .remove(&query)
            .ok_or(EcsError::QueryNotFound { query })?;
        debug!(query = %query, "query removed");
        Ok(state.filter)
    }

    /// Read access to a query's filter and membership.
    pub fn query(&self, query: QueryId) -> Result<&QueryState, EcsError> {
        self.queries
            .get(&query)
            .ok_or(EcsError::QueryNotFound { query })
    }

    /// Number of live queries.
    pub fn query_count(&self) -> usize {
        self.queries.len()
    }

    /// All live queries in creation order.
    pub fn queries(&self) -> impl Iterator<Item = &QueryState> {
        self.queries.values()
    }

    /// Evaluate the query's filter against one entity, ignoring the cache.
    pub fn matches(&self, entity: EntityId, query: QueryId) -> Result<bool, EcsError> {
        let state = self.query(query)?;
        let bag = self.bag(entity)?;
        Ok(state.compiled.matches(bag))
    }

    /// Iterate a query's members with their projected components.
    pub fn iter_query(&self, query: QueryId) -> Result<QueryIter<'_>, EcsError> {
        let state = self.query(query)?;
        Ok(QueryIter {
            world: self,
            projection: state.compiled.projection(),
            members: state.members.iter(),
        })
    }

    /// Call `handler` once per member with its projected components.
    ///
    /// ```
    /// use sift_ecs::prelude::*;
    /// use serde_json::json;
    ///
    /// let mut world = World::new();
    /// let e = world.create_entity();
    /// world.set_component(e, "position", json!({"x": 0.0})).unwrap();
    ///
    /// let q = world.create_query(QueryFilter::new().all(["position"]));
    /// let mut seen = 0;
    /// world.each(q, |_entity, components| {
    ///     assert!(components[0].is_some());
    ///     seen += 1;
    /// }).unwrap();
    /// assert_eq!(seen, 1);
    /// ```
    pub fn each<F>(&self, query: QueryId, mut handler: F) -> Result<(), EcsError>
    where
        F: FnMut(EntityId, &[Option<&ComponentValue>]),
    {
        for (entity, components) in self.iter_query(query)? {
            handler(entity, &components);
        }
        Ok(())
    }

    /// Like [`each`](Self::each), with mutable slots for in-place updates.
    ///
    /// The world is exclusively borrowed for the whole pass, so membership
    /// cannot change underneath the handler. If a name occurs twice in the
    /// projection, only its first slot is filled.
    pub fn each_mut<F>(&mut self, query: QueryId, mut handler: F) -> Result<(), EcsError>
    where
        F: FnMut(EntityId, &mut [Option<&mut ComponentValue>]),
    {
        let state = self
            .queries
            .get(&query)
            .ok_or(EcsError::QueryNotFound { query })?;
        let projection = state.compiled.projection();

        for &entity in &state.members {
            let Some(bag) = self.entities.get_mut(&entity) else {
                continue;
            };
            let mut slots: Vec<Option<&mut ComponentValue>> = Vec::with_capacity(projection.len());
            slots.resize_with(projection.len(), || None);
            for (component, value) in bag.iter_mut() {
                if let Some(slot) = projection.iter().position(|&id| id == component) {
                    slots[slot] = Some(value);
                }
            }
            handler(entity, &mut slots);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn world_with_two_components() -> (World, EntityId) {
        let mut world = World::new();
        let e = world.create_entity();
        world.set_component(e, "Component1", 1).unwrap();
        world.set_component(e, "Component2", 1).unwrap();
        (world, e)
    }

    fn check(world: &mut World, filter: QueryFilter, entity: EntityId) -> bool {
        let q = world.create_query(filter);
        world.matches(entity, q).unwrap()
    }

    // -- all ------------------------------------------------------------------

    #[test]
    fn all_empty_matches() {
        let (mut world, e) = world_with_two_components();
        assert!(check(&mut world, QueryFilter::new(), e));
    }

    #[test]
    fn all_subset_matches() {
        let (mut world, e) = world_with_two_components();
        assert!(check(&mut world, QueryFilter::new().all(["Component1"]), e));
        assert!(check(
            &mut world,
            QueryFilter::new().all(["Component1", "Component2"]),
            e
        ));
    }

    #[test]
    fn all_missing_component_fails() {
        let (mut world, e) = world_with_two_components();
        assert!(!check(&mut world, QueryFilter::new().all(["Component3"]), e));
        assert!(!check(
            &mut world,
            QueryFilter::new().all(["Component1", "Component2", "Component3"]),
            e
        ));
    }

    // -- any ------------------------------------------------------------------

    #[test]
    fn any_requires_at_least_one() {
        let (mut world, e) = world_with_two_components();
        assert!(check(&mut world, QueryFilter::new().any(["Component1"]), e));
        assert!(check(
            &mut world,
            QueryFilter::new().any(["Component1", "Component3"]),
            e
        ));
        assert!(!check(&mut world, QueryFilter::new().any(["Component3"]), e));
    }

    // -- none -----------------------------------------------------------------

    #[test]
    fn none_excludes_even_when_all_satisfied() {
        let (mut world, e) = world_with_two_components();
        assert!(!check(
            &mut world,
            QueryFilter::new().all(["Component1"]).none(["Component2"]),
            e
        ));
        assert!(check(
            &mut world,
            QueryFilter::new().all(["Component1"]).none(["Component3"]),
            e
        ));
    }

    #[test]
    fn overlapping_all_and_none_never_matches() {
        let (mut world, e) = world_with_two_components();
        let q = world.create_query(QueryFilter::new().all(["Component1"]).none(["Component1"]));
        assert!(!world.matches(e, q).unwrap());
        assert!(world.query(q).unwrap().is_empty());
    }

    // -- filter ---------------------------------------------------------------

    #[test]
    fn filter_deserializes_with_defaults() {
        let filter: QueryFilter = serde_json::from_value(json!({"all": ["a"]})).unwrap();
        assert_eq!(filter.all, vec!["a"]);
        assert!(filter.any.is_empty());
        assert!(filter.none.is_empty());

        let empty: QueryFilter = serde_json::from_value(json!({})).unwrap();
        assert!(empty.is_unconstrained());
    }

    #[test]
    fn create_query_keeps_filter() {
        let mut world = World::new();
        let q = world.create_query(QueryFilter::new().all(["Component1"]));
        assert_eq!(world.query(q).unwrap().filter().all[0], "Component1");
    }

    // -- lifecycle ------------------------------------------------------------

    #[test]
    fn removed_query_handle_is_dead() {
        let mut world = World::new();
        let q = world.create_query(QueryFilter::new().all(["a"]));
        assert_eq!(world.query_count(), 1);

        let filter = world.remove_query(q).unwrap();
        assert_eq!(filter.all, vec!["a"]);
        assert_eq!(world.query_count(), 0);
        assert!(matches!(world.query(q), Err(EcsError::QueryNotFound { .. })));
        assert!(matches!(world.remove_query(q), Err(EcsError::QueryNotFound { .. })));
        assert!(world.each(q, |_, _| {}).is_err());

        // New queries get fresh handles.
        let q2 = world.create_query(QueryFilter::new());
        assert_ne!(q, q2);
    }

    #[test]
    fn removed_query_no_longer_tracks() {
        let mut world = World::new();
        let keep = world.create_query(QueryFilter::new().all(["a"]));
        let disposed = world.create_query(QueryFilter::new().all(["a"]));
        world.remove_query(disposed).unwrap();

        let e = world.create_entity();
        world.set_component(e, "a", 1).unwrap();
        assert!(world.query(keep).unwrap().contains(e));
        let live: Vec<QueryId> = world.queries().map(QueryState::id).collect();
        assert_eq!(live, vec![keep]);
    }

    // -- iteration ------------------------------------------------------------

    #[test]
    fn projection_order_is_all_then_any() {
        let mut world = World::new();
        let e = world.create_entity_with([("a", json!(1)), ("b", json!(2)), ("c", json!(3))]);
        let q = world.create_query(QueryFilter::new().all(["c", "a"]).any(["b", "missing"]));

        let rows: Vec<_> = world.iter_query(q).unwrap().collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].0, e);
        assert_eq!(
            rows[0].1,
            vec![Some(&json!(3)), Some(&json!(1)), Some(&json!(2)), None]
        );
    }

    #[test]
    fn none_names_are_not_projected() {
        let mut world = World::new();
        world.create_entity_with([("a", json!(1))]);
        let q = world.create_query(QueryFilter::new().all(["a"]).none(["b", "c"]));
        world
            .each(q, |_, components| assert_eq!(components.len(), 1))
            .unwrap();
    }

    #[test]
    fn each_mut_updates_values_without_changing_membership() {
        let mut world = World::new();
        let e = world.create_entity_with([
            ("position", json!({"x": 0.0})),
            ("velocity", json!({"x": 2.0})),
        ]);
        let q = world.create_query(QueryFilter::new().all(["position", "velocity"]));

        world
            .each_mut(q, |_, components| {
                let dx = components[1].as_ref().and_then(|v| v["x"].as_f64()).unwrap_or(0.0);
                if let Some(pos) = components[0].as_mut() {
                    let x = pos["x"].as_f64().unwrap_or(0.0);
                    pos["x"] = json!(x + dx);
                }
            })
            .unwrap();

        assert_eq!(world.component(e, "position").unwrap(), Some(&json!({"x": 2.0})));
        assert_eq!(world.query(q).unwrap().len(), 1);
    }

    #[test]
    fn each_mut_fills_only_first_duplicate_slot() {
        let mut world = World::new();
        world.create_entity_with([("a", json!(1))]);
        let q = world.create_query(QueryFilter::new().all(["a"]).any(["a"]));
        world
            .each_mut(q, |_, components| {
                assert_eq!(components.len(), 2);
                assert!(components[0].is_some());
                assert!(components[1].is_none());
            })
            .unwrap();
    }
}
