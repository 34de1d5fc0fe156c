//! Sift ECS -- a name-keyed Entity Component System with live queries.
//!
//! Entities are opaque ids owning a bag of named, schemaless components.
//! Queries select entities by component presence (`all`, `any`, `none`) and
//! keep their membership set current incrementally: only a *dirty transition*
//! (a name becoming bound or unbound on one entity) re-evaluates that one
//! entity, and only against the queries that mention the name.
//!
//! # Quick Start
//!
//! ```
//! use sift_ecs::prelude::*;
//! use serde_json::json;
//!
//! let mut world = World::new();
//! let e = world.create_entity();
//! world.set_component(e, "position", json!({"x": 0.0, "y": 0.0})).unwrap();
//! world.set_component(e, "velocity", json!({"x": 1.0, "y": 0.5})).unwrap();
//!
//! let moving = world.create_query(QueryFilter::new().all(["position", "velocity"]));
//! assert_eq!(world.query(moving).unwrap().len(), 1);
//!
//! world.remove_component(e, "velocity").unwrap();
//! assert!(world.query(moving).unwrap().is_empty());
//! ```

#![deny(unsafe_code)]

pub mod command;
pub mod component;
pub mod entity;
pub mod query;
pub mod world;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by ECS operations.
#[derive(Debug, thiserror::Error)]
pub enum EcsError {
    /// The entity does not exist (removed or never allocated).
    #[error("entity {entity} does not exist")]
    EntityNotFound { entity: entity::EntityId },

    /// The query handle was never issued by this world or has been removed.
    #[error("query {query} does not exist (never created or already removed)")]
    QueryNotFound { query: query::QueryId },

    /// An update targeted a component that is not bound on the entity.
    #[error("component '{component}' is not present on entity {entity}")]
    ComponentNotFound {
        entity: entity::EntityId,
        component: String,
    },

    /// A typed value could not be turned into a component payload.
    #[error("failed to serialize component '{component}': {details}")]
    ComponentSerialization { component: String, details: String },

    /// A component payload did not have the requested shape.
    #[error("failed to deserialize component '{component}': {details}")]
    ComponentDeserialization { component: String, details: String },

    /// A command that needs a target entity was built without one.
    #[error("command {command_index} has no target entity")]
    MissingCommandTarget { command_index: u32 },
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::command::{ApplyReport, Command, CommandBuffer, CommandKind};
    pub use crate::component::{ComponentId, ComponentRegistry, ComponentValue, SetOutcome};
    pub use crate::entity::EntityId;
    pub use crate::query::{QueryFilter, QueryId, QueryIter, QueryState};
    pub use crate::world::{EntityRecord, EntityRef, World};
    pub use crate::EcsError;
}

// ---------------------------------------------------------------------------
// Integration Tests
// ---------------------------------------------------------------------------
