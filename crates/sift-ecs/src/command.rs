//! Command buffer for deferred world mutations.
//!
//! Iterating a query borrows the [`World`] immutably, so code running inside
//! [`World::each`] cannot create or remove entities or bind components
//! directly. It queues [`Command`]s into a [`CommandBuffer`] instead, and the
//! buffer is applied afterwards in strict insertion order (FIFO).
//!
//! Every applied command goes through the regular world API, so query
//! membership is maintained exactly as for direct calls.
//!
//! # Example
//!
//! ```
//! use sift_ecs::prelude::*;
//! use serde_json::json;
//!
//! let mut world = World::new();
//! let e = world.create_entity_with([("health", json!(100))]);
//! let q = world.create_query(QueryFilter::new().all(["health"]));
//!
//! let mut cmds = CommandBuffer::new();
//! world.each(q, |entity, components| {
//!     let hp = components[0].and_then(|v| v.as_u64()).unwrap_or(0);
//!     cmds.set_component(entity, "health", json!(hp - 50));
//! }).unwrap();
//!
//! let applied = cmds.apply(&mut world);
//! assert_eq!(applied.len(), 1);
//! assert_eq!(world.component(e, "health").unwrap(), Some(&json!(50)));
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::component::ComponentValue;
use crate::entity::EntityId;
use crate::world::World;
use crate::EcsError;

// ---------------------------------------------------------------------------
// CommandKind
// ---------------------------------------------------------------------------

/// The mutation a command performs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CommandKind {
    /// Create an entity, then bind the given components in order.
    CreateEntity {
        components: Vec<(String, ComponentValue)>,
    },
    /// Bind a component (insert or overwrite).
    SetComponent {
        component_name: String,
        value: ComponentValue,
    },
    /// Unbind a component.
    RemoveComponent { component_name: String },
    /// Remove the entity entirely.
    RemoveEntity,
}

// ---------------------------------------------------------------------------
// Command
// ---------------------------------------------------------------------------

/// A single deferred mutation.
///
/// `target` is `None` for [`CommandKind::CreateEntity`]; after application the
/// new id is recorded in `spawned_entity`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Command {
    /// Which entity this command targets. `None` for create commands.
    pub target: Option<EntityId>,
    pub kind: CommandKind,
    /// Sequential index within the buffer (set on insertion).
    pub command_index: u32,
    /// For create commands: the entity created by `apply()`.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub spawned_entity: Option<EntityId>,
    /// `false` until `apply()` succeeds for this command.
    #[serde(default)]
    pub applied_successfully: bool,
}

// ---------------------------------------------------------------------------
// ApplyReport
// ---------------------------------------------------------------------------

/// Summary of the last [`CommandBuffer::apply`] call.
///
/// `conflict_count` counts `(entity, component)` pairs targeted by more than
/// one command in the same batch. The last write wins; conflicts are logged,
/// not rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub conflict_count: usize,
    pub failed_count: usize,
    pub success_count: usize,
}

// ---------------------------------------------------------------------------
// CommandBuffer
// ---------------------------------------------------------------------------

/// Collects commands and applies them to a [`World`] in insertion order.
#[derive(Debug, Default)]
pub struct CommandBuffer {
    commands: Vec<Command>,
    next_index: u32,
    last_apply_report: ApplyReport,
}

impl CommandBuffer {
    /// Create a new, empty command buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue creation of an entity with the given components.
    pub fn create_entity<I, S>(&mut self, components: I)
    where
        I: IntoIterator<Item = (S, ComponentValue)>,
        S: Into<String>,
    {
        let components = components
            .into_iter()
            .map(|(name, value)| (name.into(), value))
            .collect();
        self.push(None, CommandKind::CreateEntity { components });
    }

    /// Queue a `SetComponent` command.
    pub fn set_component(
        &mut self,
        target: EntityId,
        component_name: &str,
        value: impl Into<ComponentValue>,
    ) {
        self.push(
            Some(target),
            CommandKind::SetComponent {
                component_name: component_name.to_owned(),
                value: value.into(),
            },
        );
    }

    /// Queue a `RemoveComponent` command.
    pub fn remove_component(&mut self, target: EntityId, component_name: &str) {
        self.push(
            Some(target),
            CommandKind::RemoveComponent {
                component_name: component_name.to_owned(),
            },
        );
    }

    /// Queue a `RemoveEntity` command.
    pub fn remove_entity(&mut self, target: EntityId) {
        self.push(Some(target), CommandKind::RemoveEntity);
    }

    /// Get all queued commands in insertion order.
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Report from the last [`apply`](Self::apply) call (all zero before the
    /// first one).
    pub fn last_apply_report(&self) -> &ApplyReport {
        &self.last_apply_report
    }

    /// Apply all commands to the world in insertion order and clear the
    /// buffer.
    ///
    /// Returns every command, successful or not; check
    /// [`applied_successfully`](Command::applied_successfully). Commands that
    /// target missing entities are logged and skipped.
    pub fn apply(&mut self, world: &mut World) -> Vec<Command> {
        let mut commands = std::mem::take(&mut self.commands);
        self.next_index = 0;

        let conflict_count = Self::detect_conflicts(&commands);

        let mut success_count: usize = 0;
        let mut failed_count: usize = 0;

        for cmd in &mut commands {
            match Self::apply_one(world, cmd) {
                Ok(()) => {
                    cmd.applied_successfully = true;
                    success_count += 1;
                }
                Err(e) => {
                    failed_count += 1;
                    warn!(
                        command_index = cmd.command_index,
                        target = ?cmd.target,
                        error = %e,
                        "command application failed"
                    );
                }
            }
        }

        self.last_apply_report = ApplyReport {
            conflict_count,
            success_count,
            failed_count,
        };

        commands
    }

    /// Clear the buffer without applying any commands.
    pub fn clear(&mut self) {
        self.commands.clear();
        self.next_index = 0;
    }

    // -- internal helpers ---------------------------------------------------

    fn apply_one(world: &mut World, cmd: &mut Command) -> Result<(), EcsError> {
        let target = cmd.target;
        match (&cmd.kind, target) {
            (CommandKind::CreateEntity { components }, _) => {
                let entity = world.create_entity_with(components.iter().cloned());
                cmd.spawned_entity = Some(entity);
                Ok(())
            }
            (
                CommandKind::SetComponent {
                    component_name,
                    value,
                },
                Some(entity),
            ) => world
                .set_component(entity, component_name, value.clone())
                .map(|_| ()),
            (CommandKind::RemoveComponent { component_name }, Some(entity)) => world
                .remove_component(entity, component_name)
                .map(|_| ()),
            (CommandKind::RemoveEntity, Some(entity)) => world.remove_entity(entity),
            (_, None) => Err(EcsError::MissingCommandTarget {
                command_index: cmd.command_index,
            }),
        }
    }

    /// Count `(entity, component)` pairs touched by more than one command.
    fn detect_conflicts(commands: &[Command]) -> usize {
        let mut seen: HashMap<(EntityId, &str), Vec<u32>> = HashMap::new();
        for cmd in commands {
            let Some(target) = cmd.target else {
                continue;
            };
            let name = match &cmd.kind {
                CommandKind::SetComponent { component_name, .. }
                | CommandKind::RemoveComponent { component_name } => component_name.as_str(),
                _ => continue,
            };
            seen.entry((target, name))
                .or_default()
                .push(cmd.command_index);
        }

        let mut conflict_count = 0;
        for ((entity, component), indices) in &seen {
            if indices.len() > 1 {
                conflict_count += 1;
                warn!(
                    entity = %entity,
                    component = %component,
                    command_indices = ?indices,
                    "conflict: {} commands target the same entity+component (last-write-wins)",
                    indices.len()
                );
            }
        }
        conflict_count
    }

    fn push(&mut self, target: Option<EntityId>, kind: CommandKind) {
        let index = self.next_index;
        self.next_index += 1;
        self.commands.push(Command {
            target,
            kind,
            command_index: index,
            spawned_entity: None,
            applied_successfully: false,
        });
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
