//! Particle motion demo built on live queries.
//!
//! Particles carry `position` and `velocity` components. Three systems drive
//! them:
//!
//! - [`MotionSystem`] integrates every unfrozen particle.
//! - [`BoundsSystem`] freezes particles that leave the arena, which evicts
//!   them from the motion query once the tick's commands are applied.
//! - [`LogSystem`] periodically logs positions at `debug` level.

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sift_ecs::prelude::*;
use tracing::{debug, warn};

use crate::config::{ConfigError, SimConfig};
use crate::tick::{System, TickContext, TickLoop};

pub const POSITION: &str = "position";
pub const VELOCITY: &str = "velocity";
pub const FROZEN: &str = "frozen";

/// A 2D vector as stored in `position` and `velocity` components.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    fn to_value(self) -> ComponentValue {
        json!({ "x": self.x, "y": self.y })
    }
}

// ---------------------------------------------------------------------------
// Spawning
// ---------------------------------------------------------------------------

/// Create `config.entity_count` particles with seeded random positions inside
/// the arena and velocities in `[-1, 1)` per axis.
pub fn spawn_particles(world: &mut World, config: &SimConfig) -> Vec<EntityId> {
    let mut rng = Pcg64::seed_from_u64(config.seed);
    (0..config.entity_count)
        .map(|_| {
            let position = Vec2::new(
                rng.gen::<f64>() * config.arena_size,
                rng.gen::<f64>() * config.arena_size,
            );
            let velocity = Vec2::new(rng.gen::<f64>() * 2.0 - 1.0, rng.gen::<f64>() * 2.0 - 1.0);
            world.create_entity_with([
                (POSITION, position.to_value()),
                (VELOCITY, velocity.to_value()),
            ])
        })
        .collect()
}

fn read_vec2(entity: EntityId, name: &str, value: Option<&ComponentValue>) -> Option<Vec2> {
    let value = value?;
    match Vec2::deserialize(value) {
        Ok(v) => Some(v),
        Err(e) => {
            warn!(entity = %entity, component = name, error = %e, "malformed vector component");
            None
        }
    }
}

// ---------------------------------------------------------------------------
// MotionSystem
// ---------------------------------------------------------------------------

/// Queues `position += velocity * dt` for every unfrozen particle.
#[derive(Debug, Clone, Copy)]
pub struct MotionSystem {
    query: QueryId,
}

impl MotionSystem {
    pub fn new(world: &mut World) -> Self {
        let query = world.create_query(QueryFilter::new().all([POSITION, VELOCITY]).none([FROZEN]));
        Self { query }
    }

    pub fn query(&self) -> QueryId {
        self.query
    }
}

impl System for MotionSystem {
    fn run(&mut self, world: &World, commands: &mut CommandBuffer, ctx: &TickContext) {
        let result = world.each(self.query, |entity, components| {
            let position = read_vec2(entity, POSITION, components[0]);
            let velocity = read_vec2(entity, VELOCITY, components[1]);
            if let (Some(p), Some(v)) = (position, velocity) {
                let next = Vec2::new(p.x + v.x * ctx.dt, p.y + v.y * ctx.dt);
                commands.set_component(entity, POSITION, next.to_value());
            }
        });
        if let Err(e) = result {
            warn!(error = %e, "motion system skipped");
        }
    }
}

// ---------------------------------------------------------------------------
// BoundsSystem
// ---------------------------------------------------------------------------

/// Freezes particles whose position has left `[0, arena_size]`.
#[derive(Debug, Clone, Copy)]
pub struct BoundsSystem {
    query: QueryId,
    arena_size: f64,
}

impl BoundsSystem {
    pub fn new(world: &mut World, arena_size: f64) -> Self {
        let query = world.create_query(QueryFilter::new().all([POSITION]).none([FROZEN]));
        Self { query, arena_size }
    }
}

impl System for BoundsSystem {
    fn run(&mut self, world: &World, commands: &mut CommandBuffer, ctx: &TickContext) {
        let bounds = 0.0..=self.arena_size;
        let result = world.each(self.query, |entity, components| {
            let Some(p) = read_vec2(entity, POSITION, components[0]) else {
                return;
            };
            if !bounds.contains(&p.x) || !bounds.contains(&p.y) {
                debug!(tick = ctx.tick, entity = %entity, x = p.x, y = p.y, "particle left arena");
                commands.set_component(entity, FROZEN, true);
            }
        });
        if let Err(e) = result {
            warn!(error = %e, "bounds system skipped");
        }
    }
}

// ---------------------------------------------------------------------------
// LogSystem
// ---------------------------------------------------------------------------

/// Logs every particle position every `every` ticks. `every == 0` disables it.
#[derive(Debug, Clone, Copy)]
pub struct LogSystem {
    query: QueryId,
    every: u64,
}

impl LogSystem {
    pub fn new(world: &mut World, every: u64) -> Self {
        let query = world.create_query(QueryFilter::new().all([POSITION]));
        Self { query, every }
    }
}

impl System for LogSystem {
    fn run(&mut self, world: &World, _commands: &mut CommandBuffer, ctx: &TickContext) {
        if self.every == 0 || ctx.tick % self.every != 0 {
            return;
        }
        let result = world.each(self.query, |entity, components| {
            if let Some(position) = components[0] {
                debug!(tick = ctx.tick, entity = %entity, position = %position, "particle");
            }
        });
        if let Err(e) = result {
            warn!(error = %e, "log system skipped");
        }
    }
}

// ---------------------------------------------------------------------------
// Assembly
// ---------------------------------------------------------------------------

/// Build a ready-to-run tick loop: spawn particles, register the motion,
/// bounds and log systems.
pub fn motion_loop(config: &SimConfig) -> Result<TickLoop, ConfigError> {
    config.validate()?;

    let mut world = World::new();
    let spawned = spawn_particles(&mut world, config);
    let motion = MotionSystem::new(&mut world);
    let bounds = BoundsSystem::new(&mut world, config.arena_size);
    let log = LogSystem::new(&mut world, config.log_every);
    debug!(
        particles = spawned.len(),
        seed = config.seed,
        "motion world ready"
    );

    let mut tick_loop = TickLoop::new(world, config.tick_config());
    tick_loop.add_system("motion", motion);
    tick_loop.add_system("bounds", bounds);
    tick_loop.add_system("log", log);
    Ok(tick_loop)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
