//! Entity identifiers and allocation.
//!
//! An [`EntityId`] is an opaque, strictly positive 64-bit handle. Identifiers
//! are handed out by an [`EntityAllocator`] from a monotonically increasing
//! counter and are never reused, even after the entity has been removed, so a
//! stale handle can never alias a newer entity.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// EntityId
// ---------------------------------------------------------------------------

/// An opaque entity handle. The first id handed out by a world is `1`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(u64);

impl EntityId {
    /// Raw `u64` representation.
    #[inline]
    pub fn to_raw(self) -> u64 {
        self.0
    }

    /// Reconstruct from a raw `u64`.
    ///
    /// The handle is not checked against any world; lookups with an id that
    /// was never allocated fail with [`EcsError::EntityNotFound`](crate::EcsError).
    #[inline]
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({})", self.0)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// EntityAllocator
// ---------------------------------------------------------------------------

/// Hands out [`EntityId`]s and keeps the live-entity bookkeeping.
///
/// `last_id` only ever grows. `live` is adjusted by the world on create and
/// on successful removal, never for an id that does not exist.
#[derive(Debug, Default)]
pub struct EntityAllocator {
    /// The most recently allocated raw id (0 before the first allocation).
    last_id: u64,
    /// Number of entities currently alive.
    live: usize,
}

impl EntityAllocator {
    /// Create a new, empty allocator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next identifier.
    pub fn allocate(&mut self) -> EntityId {
        self.last_id += 1;
        self.live += 1;
        EntityId(self.last_id)
    }

    /// Record that a previously allocated entity has been removed.
    ///
    /// The id itself is retired for good; the counter is not rewound.
    pub fn release(&mut self, id: EntityId) {
        debug_assert!(id.0 != 0 && id.0 <= self.last_id, "release of unallocated {id:?}");
        self.live = self.live.saturating_sub(1);
    }

    /// Number of entities currently alive.
    pub fn live_count(&self) -> usize {
        self.live
    }

    /// The last id handed out, if any.
    pub fn last_id(&self) -> Option<EntityId> {
        (self.last_id > 0).then_some(EntityId(self.last_id))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
