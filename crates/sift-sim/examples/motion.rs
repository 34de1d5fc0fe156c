//! Headless particle simulation.
//!
//! Usage: `cargo run -p sift-sim --example motion [config.json]`
//!
//! Set `RUST_LOG=debug` to see per-particle logging.

use anyhow::Context;
use sift_sim::prelude::*;
use tracing::info;

fn main() -> Result<(), anyhow::Error> {
    sift_sim::init_tracing("info").map_err(|e| anyhow::anyhow!(e))?;

    let config = match std::env::args().nth(1) {
        Some(path) => SimConfig::load(&path).with_context(|| format!("loading {path}"))?,
        None => SimConfig::default(),
    };
    info!(?config, "starting simulation");

    let mut tick_loop = motion_loop(&config)?;
    let total_commands = tick_loop.run_ticks(config.ticks);

    let world = tick_loop.world();
    let frozen = world
        .entities()
        .filter(|&e| world.has_component(e, FROZEN))
        .count();
    info!(
        ticks = tick_loop.tick_count(),
        sim_time = tick_loop.sim_time(),
        total_commands,
        entities = world.entity_count(),
        frozen,
        digest = %world_digest(world),
        "simulation finished"
    );
    Ok(())
}
