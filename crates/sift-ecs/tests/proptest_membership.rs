//! Property tests for incremental query membership.
//!
//! Random sequences of structural operations are applied to a world with a
//! fixed set of live queries. After every sequence each query's cached
//! membership must equal a fresh full scan of the world.

use std::collections::BTreeSet;

use proptest::prelude::*;
use serde_json::json;
use sift_ecs::prelude::*;

const NAMES: [&str; 4] = ["a", "b", "c", "d"];

#[derive(Debug, Clone)]
enum Op {
    Create,
    CreateWith(Vec<usize>),
    Set(usize, usize, i64),
    Remove(usize, usize),
    RemoveEntity(usize),
    AddQuery(Vec<usize>, Vec<usize>, Vec<usize>),
}

fn names(indices: &[usize]) -> Vec<&'static str> {
    indices.iter().map(|&i| NAMES[i % NAMES.len()]).collect()
}

fn op_strategy() -> impl Strategy<Value = Op> {
    let name_set = || prop::collection::vec(0..NAMES.len(), 0..3);
    prop_oneof![
        Just(Op::Create),
        name_set().prop_map(Op::CreateWith),
        (0..32usize, 0..NAMES.len(), any::<i64>()).prop_map(|(e, n, v)| Op::Set(e, n, v)),
        (0..32usize, 0..NAMES.len()).prop_map(|(e, n)| Op::Remove(e, n)),
        (0..32usize).prop_map(Op::RemoveEntity),
        (name_set(), name_set(), name_set()).prop_map(|(all, any, none)| Op::AddQuery(all, any, none)),
    ]
}

fn seed_queries(world: &mut World) -> Vec<QueryId> {
    vec![
        world.create_query(QueryFilter::new()),
        world.create_query(QueryFilter::new().all(["a"])),
        world.create_query(QueryFilter::new().all(["a", "b"])),
        world.create_query(QueryFilter::new().any(["b", "c"])),
        world.create_query(QueryFilter::new().none(["d"])),
        world.create_query(QueryFilter::new().all(["a"]).any(["b", "c"]).none(["d"])),
    ]
}

fn full_scan(world: &World, query: QueryId) -> Vec<EntityId> {
    world
        .entities()
        .filter(|&e| world.matches(e, query).unwrap())
        .collect()
}

/// Apply `ops` and return the world, live queries, and expected live entities.
fn run(ops: &[Op]) -> (World, Vec<QueryId>, BTreeSet<EntityId>) {
    let mut world = World::new();
    let mut queries = seed_queries(&mut world);
    let mut alive: Vec<EntityId> = Vec::new();
    let mut removed: Vec<EntityId> = Vec::new();

    for op in ops {
        match op {
            Op::Create => alive.push(world.create_entity()),
            Op::CreateWith(indices) => {
                let e = world.create_entity_with(names(indices).into_iter().map(|n| (n, json!(0))));
                alive.push(e);
            }
            Op::Set(idx, name, value) => {
                if !alive.is_empty() {
                    let e = alive[idx % alive.len()];
                    world.set_component(e, NAMES[*name], json!(value)).unwrap();
                }
            }
            Op::Remove(idx, name) => {
                if !alive.is_empty() {
                    let e = alive[idx % alive.len()];
                    world.remove_component(e, NAMES[*name]).unwrap();
                }
            }
            Op::RemoveEntity(idx) => {
                if !alive.is_empty() {
                    let e = alive.remove(idx % alive.len());
                    world.remove_entity(e).unwrap();
                    removed.push(e);
                }
            }
            Op::AddQuery(all, any, none) => {
                let filter = QueryFilter::new()
                    .all(names(all))
                    .any(names(any))
                    .none(names(none));
                queries.push(world.create_query(filter));
            }
        }
    }

    // Operations on removed entities must fail without touching anything.
    for &stale in &removed {
        assert!(matches!(
            world.set_component(stale, "a", 1),
            Err(EcsError::EntityNotFound { .. })
        ));
        assert!(matches!(
            world.remove_entity(stale),
            Err(EcsError::EntityNotFound { .. })
        ));
    }

    (world, queries, alive.into_iter().collect())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(2_000))]

    /// Cached membership equals a full scan after any operation sequence.
    #[test]
    fn membership_matches_full_scan(ops in prop::collection::vec(op_strategy(), 1..60)) {
        let (world, queries, _) = run(&ops);
        for q in queries {
            let cached: Vec<EntityId> = world.query(q).unwrap().entities().collect();
            prop_assert_eq!(cached, full_scan(&world, q), "query {} diverged", q);
        }
    }

    /// The entity count tracks creates and successful removals exactly.
    #[test]
    fn entity_count_tracks_live_entities(ops in prop::collection::vec(op_strategy(), 1..60)) {
        let (world, _, alive) = run(&ops);
        prop_assert_eq!(world.entity_count(), alive.len());
        let listed: BTreeSet<EntityId> = world.entities().collect();
        prop_assert_eq!(listed, alive);
    }

    /// Members never include removed entities, and every member still exists.
    #[test]
    fn members_are_live_entities(ops in prop::collection::vec(op_strategy(), 1..60)) {
        let (world, queries, alive) = run(&ops);
        for q in queries {
            for e in world.query(q).unwrap().entities() {
                prop_assert!(alive.contains(&e));
                prop_assert!(world.contains_entity(e));
            }
        }
    }

    /// Ids are handed out in strictly increasing order and never reused.
    #[test]
    fn ids_are_never_reused(creates in 1..40usize, removes in prop::collection::vec(0..40usize, 0..20)) {
        let mut world = World::new();
        let mut issued = Vec::new();
        for _ in 0..creates {
            issued.push(world.create_entity());
        }
        for idx in removes {
            let _ = world.remove_entity(issued[idx % issued.len()]);
        }
        let fresh = world.create_entity();
        prop_assert!(issued.iter().all(|&old| old < fresh));
        prop_assert!(issued.windows(2).all(|w| w[0] < w[1]));
    }

    /// Value updates on a bound name never change membership.
    #[test]
    fn updates_do_not_move_entities(values in prop::collection::vec(any::<i64>(), 1..20)) {
        let mut world = World::new();
        let queries = seed_queries(&mut world);
        let e = world.create_entity_with([("a", json!(0)), ("b", json!(0))]);
        let before: Vec<Vec<EntityId>> = queries
            .iter()
            .map(|&q| world.query(q).unwrap().entities().collect())
            .collect();

        for v in values {
            prop_assert_eq!(world.set_component(e, "a", json!(v)).unwrap(), SetOutcome::Updated);
            world.update_component(e, "b", json!(v)).unwrap();
        }

        let after: Vec<Vec<EntityId>> = queries
            .iter()
            .map(|&q| world.query(q).unwrap().entities().collect())
            .collect();
        prop_assert_eq!(before, after);
    }
}
