//! World fingerprinting for determinism checks.

use sift_ecs::world::World;

/// BLAKE3 hex digest of every entity and component in `world`.
///
/// Entities are hashed in ascending id order and components in name order,
/// with each value in compact JSON form, so two worlds with the same contents
/// always produce the same digest regardless of how they were built.
pub fn world_digest(world: &World) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&(world.entity_count() as u64).to_le_bytes());

    for record in world.records() {
        hasher.update(&record.entity.to_raw().to_le_bytes());
        hasher.update(&(record.components.len() as u64).to_le_bytes());
        for (name, value) in &record.components {
            hasher.update(&(name.len() as u64).to_le_bytes());
            hasher.update(name.as_bytes());
            let encoded = value.to_string();
            hasher.update(&(encoded.len() as u64).to_le_bytes());
            hasher.update(encoded.as_bytes());
        }
    }

    hasher.finalize().to_hex().to_string()
}
