//! Fixed-timestep tick loop.
//!
//! Each tick runs every registered [`System`] in registration order. Systems
//! read the [`World`] and queue mutations into a shared [`CommandBuffer`],
//! which is applied once all systems have run. Query membership is therefore
//! stable for the whole system phase and catches up during the apply.
//!
//! # Example
//!
//! ```
//! use sift_sim::tick::{TickConfig, TickContext, TickLoop};
//! use sift_ecs::prelude::*;
//!
//! let mut tick_loop = TickLoop::new(World::new(), TickConfig::default());
//! tick_loop.add_system("spawner", |_: &World, cmds: &mut CommandBuffer, _: &TickContext| {
//!     cmds.create_entity([("spark", serde_json::json!(true))]);
//! });
//!
//! tick_loop.run_ticks(10);
//! assert_eq!(tick_loop.tick_count(), 10);
//! assert_eq!(tick_loop.world().entity_count(), 10);
//! ```

use std::time::{Duration, Instant};

use sift_ecs::command::{Command, CommandBuffer};
use sift_ecs::world::World;
use tracing::trace;

// ---------------------------------------------------------------------------
// TickConfig
// ---------------------------------------------------------------------------

/// Configuration for the fixed-timestep tick loop.
#[derive(Debug, Clone, PartialEq)]
pub struct TickConfig {
    /// Fixed time step in seconds per tick. Must be positive and finite.
    pub fixed_dt: f64,
}

impl Default for TickConfig {
    /// 60 Hz.
    fn default() -> Self {
        Self {
            fixed_dt: 1.0 / 60.0,
        }
    }
}

// ---------------------------------------------------------------------------
// TickContext
// ---------------------------------------------------------------------------

/// Per-tick information handed to every system.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickContext {
    /// Zero-based index of the tick being executed.
    pub tick: u64,
    /// Fixed time step in seconds.
    pub dt: f64,
}

impl TickContext {
    /// Simulation time at the start of this tick.
    pub fn sim_time(&self) -> f64 {
        self.tick as f64 * self.dt
    }
}

// ---------------------------------------------------------------------------
// TickDiagnostics
// ---------------------------------------------------------------------------

/// Timing diagnostics for the last tick.
#[derive(Debug, Clone, Default)]
pub struct TickDiagnostics {
    /// Wall-clock time per system, in execution order.
    pub system_times: Vec<(String, Duration)>,
    /// Time spent applying the command buffer.
    pub command_apply_time: Duration,
    /// Total time for the tick.
    pub total_time: Duration,
    /// Commands applied successfully.
    pub applied_commands: usize,
    /// Commands that failed (e.g. targeted a removed entity).
    pub failed_commands: usize,
}

// ---------------------------------------------------------------------------
// System
// ---------------------------------------------------------------------------

/// Logic run once per tick.
///
/// Implemented for any `FnMut(&World, &mut CommandBuffer, &TickContext)`, so
/// plain closures can be registered directly. Stateful systems (for example
/// ones that own a query handle) implement the trait on a struct.
pub trait System {
    fn run(&mut self, world: &World, commands: &mut CommandBuffer, ctx: &TickContext);
}

impl<F> System for F
where
    F: FnMut(&World, &mut CommandBuffer, &TickContext),
{
    fn run(&mut self, world: &World, commands: &mut CommandBuffer, ctx: &TickContext) {
        self(world, commands, ctx)
    }
}

struct RegisteredSystem {
    name: String,
    system: Box<dyn System>,
}

// ---------------------------------------------------------------------------
// TickLoop
// ---------------------------------------------------------------------------

/// The deterministic fixed-timestep tick loop.
///
/// Given the same initial world and the same systems registered in the same
/// order, every run produces the same final state: systems execute in a fixed
/// order, the command buffer applies FIFO, and query iteration is ordered by
/// entity id.
pub struct TickLoop {
    world: World,
    command_buffer: CommandBuffer,
    systems: Vec<RegisteredSystem>,
    tick_counter: u64,
    config: TickConfig,
    last_diagnostics: TickDiagnostics,
}

impl TickLoop {
    /// Create a tick loop around `world`.
    ///
    /// # Panics
    ///
    /// Panics if `config.fixed_dt` is not positive and finite.
    pub fn new(world: World, config: TickConfig) -> Self {
        assert!(
            config.fixed_dt > 0.0 && config.fixed_dt.is_finite(),
            "fixed_dt must be positive and finite, got {}",
            config.fixed_dt
        );
        Self {
            world,
            command_buffer: CommandBuffer::new(),
            systems: Vec::new(),
            tick_counter: 0,
            config,
            last_diagnostics: TickDiagnostics::default(),
        }
    }

    /// Register a system. Systems run in registration order.
    ///
    /// # Panics
    ///
    /// Panics if a system with the same name is already registered.
    pub fn add_system(&mut self, name: &str, system: impl System + 'static) {
        assert!(
            !self.systems.iter().any(|s| s.name == name),
            "duplicate system name: {name:?}"
        );
        self.systems.push(RegisteredSystem {
            name: name.to_owned(),
            system: Box::new(system),
        });
    }

    /// Execute one tick and return the processed commands.
    pub fn tick(&mut self) -> Vec<Command> {
        let tick_start = Instant::now();
        let ctx = TickContext {
            tick: self.tick_counter,
            dt: self.config.fixed_dt,
        };

        let mut system_times = Vec::with_capacity(self.systems.len());
        for registered in &mut self.systems {
            let sys_start = Instant::now();
            registered
                .system
                .run(&self.world, &mut self.command_buffer, &ctx);
            system_times.push((registered.name.clone(), sys_start.elapsed()));
        }

        let apply_start = Instant::now();
        let applied = self.command_buffer.apply(&mut self.world);
        let command_apply_time = apply_start.elapsed();
        let report = self.command_buffer.last_apply_report();

        self.tick_counter += 1;
        self.last_diagnostics = TickDiagnostics {
            system_times,
            command_apply_time,
            total_time: tick_start.elapsed(),
            applied_commands: report.success_count,
            failed_commands: report.failed_count,
        };

        trace!(
            tick = ctx.tick,
            applied = report.success_count,
            failed = report.failed_count,
            entities = self.world.entity_count(),
            "tick complete"
        );

        applied
    }

    /// Run `count` ticks. Returns the total number of commands processed.
    pub fn run_ticks(&mut self, count: u64) -> u64 {
        let mut total_commands = 0u64;
        for _ in 0..count {
            total_commands += self.tick().len() as u64;
        }
        total_commands
    }

    // -- accessors ----------------------------------------------------------

    pub fn tick_count(&self) -> u64 {
        self.tick_counter
    }

    /// `tick_count * fixed_dt`, computed rather than accumulated.
    pub fn sim_time(&self) -> f64 {
        self.tick_counter as f64 * self.config.fixed_dt
    }

    pub fn fixed_dt(&self) -> f64 {
        self.config.fixed_dt
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    /// Direct world access for setup and tests. Systems should go through
    /// the command buffer.
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn system_count(&self) -> usize {
        self.systems.len()
    }

    /// Registered system names in execution order.
    pub fn system_names(&self) -> Vec<&str> {
        self.systems.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn last_diagnostics(&self) -> &TickDiagnostics {
        &self.last_diagnostics
    }

    /// Consume the loop and hand back the world.
    pub fn into_world(self) -> World {
        self.world
    }
}

impl std::fmt::Debug for TickLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TickLoop")
            .field("tick_counter", &self.tick_counter)
            .field("config", &self.config)
            .field("systems", &self.system_names())
            .field("world", &self.world)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
