//! Sift Sim -- a deterministic tick loop and particle demo on top of
//! [`sift_ecs`].
//!
//! Systems read the world through live queries and queue mutations into a
//! [`CommandBuffer`](sift_ecs::command::CommandBuffer); the
//! [`TickLoop`](tick::TickLoop) applies them after every system has run.
//!
//! # Quick Start
//!
//! ```
//! use sift_sim::prelude::*;
//!
//! let config = SimConfig { entity_count: 50, log_every: 0, ..Default::default() };
//! let mut tick_loop = motion_loop(&config).unwrap();
//! tick_loop.run_ticks(30);
//! assert_eq!(tick_loop.tick_count(), 30);
//! assert_eq!(world_digest(tick_loop.world()).len(), 64);
//! ```

#![deny(unsafe_code)]

pub mod config;
pub mod digest;
pub mod motion;
pub mod tick;

/// Re-export the ECS crate for convenience.
pub use sift_ecs;

// ---------------------------------------------------------------------------
// Tracing
// ---------------------------------------------------------------------------

/// Install a `fmt` subscriber filtered by `RUST_LOG`, falling back to
/// `default_directive` when the variable is unset or invalid.
///
/// Returns an error if a global subscriber is already installed.
pub fn init_tracing(
    default_directive: &str,
) -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive)),
        )
        .try_init()
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use sift_ecs::prelude::*;

    pub use crate::config::{ConfigError, SimConfig};
    pub use crate::digest::world_digest;
    pub use crate::motion::{
        motion_loop, spawn_particles, BoundsSystem, LogSystem, MotionSystem, Vec2, FROZEN,
        POSITION, VELOCITY,
    };
    pub use crate::tick::{System, TickConfig, TickContext, TickDiagnostics, TickLoop};
}
