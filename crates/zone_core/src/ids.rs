//! Entity identifiers and the ephemeral id pool.
//!
//! Ids below [`EPHEMERAL_ID_BASE`] belong to persisted rows and are assigned
//! by the database. Everything at or above the base is ephemeral: allocated at
//! runtime for NPCs, camps, and other objects that never outlive the zone
//! process.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use tracing::warn;

/// First id of the ephemeral (non-persisted) range.
pub const EPHEMERAL_ID_BASE: u64 = 422_212_465_065_984;

/// Width of the ephemeral id range.
const EPHEMERAL_ID_SPAN: u64 = 1_000_000;

/// Retry bound for a single-id draw before the pool gives up.
const ALLOC_ATTEMPTS: u32 = 10_000;

/// Retry bound for a consecutive-pair draw.
const PAIR_ALLOC_ATTEMPTS: u32 = 1_000;

/// A unique object identifier within a zone.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct EntityId(pub u64);

impl EntityId {
    /// The reserved invalid id. Returned by the pool on exhaustion and used
    /// as the "no container" / "no target" sentinel.
    pub const INVALID: EntityId = EntityId(0);

    /// Whether this id refers to a real entity.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.0 != 0
    }

    /// Whether this id falls in the ephemeral range.
    #[must_use]
    pub fn is_ephemeral(&self) -> bool {
        self.0 >= EPHEMERAL_ID_BASE
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for EntityId {
    fn from(raw: u64) -> Self {
        EntityId(raw)
    }
}

/// Allocator for ephemeral entity ids.
///
/// Draws random ids from the ephemeral range and tracks what is in use.
/// Exhaustion is not an error the caller can recover from mid-simulation, so
/// the pool logs and returns [`EntityId::INVALID`] instead of panicking.
#[derive(Debug)]
pub struct EphemeralIdPool {
    rng: SmallRng,
    in_use: HashSet<u64>,
}

impl EphemeralIdPool {
    #[must_use]
    pub fn new() -> Self {
        Self {
            rng: SmallRng::from_entropy(),
            in_use: HashSet::new(),
        }
    }

    /// Deterministically seeded pool, for tests.
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
            in_use: HashSet::new(),
        }
    }

    /// Allocate a single ephemeral id.
    ///
    /// Returns [`EntityId::INVALID`] if no free id is found within the retry
    /// bound.
    pub fn allocate(&mut self) -> EntityId {
        for _ in 0..ALLOC_ATTEMPTS {
            let raw = EPHEMERAL_ID_BASE + self.rng.gen_range(0..EPHEMERAL_ID_SPAN);
            if self.in_use.insert(raw) {
                return EntityId(raw);
            }
        }
        warn!(
            in_use = self.in_use.len(),
            "ephemeral id pool exhausted, returning invalid id"
        );
        EntityId::INVALID
    }

    /// Allocate two consecutive ids (an NPC and its inventory).
    ///
    /// Returns a pair of [`EntityId::INVALID`] if no free consecutive slot is
    /// found within the retry bound.
    pub fn allocate_pair(&mut self) -> (EntityId, EntityId) {
        for _ in 0..PAIR_ALLOC_ATTEMPTS {
            let first = EPHEMERAL_ID_BASE + self.rng.gen_range(0..EPHEMERAL_ID_SPAN - 1);
            let second = first + 1;
            if self.in_use.contains(&first) || self.in_use.contains(&second) {
                continue;
            }
            self.in_use.insert(first);
            self.in_use.insert(second);
            return (EntityId(first), EntityId(second));
        }
        warn!(
            in_use = self.in_use.len(),
            "ephemeral id pool exhausted, no consecutive pair available"
        );
        (EntityId::INVALID, EntityId::INVALID)
    }

    /// Return an id to the pool. Ignores ids the pool never handed out.
    pub fn release(&mut self, id: EntityId) {
        self.in_use.remove(&id.0);
    }

    /// Number of ids currently handed out.
    #[must_use]
    pub fn in_use(&self) -> usize {
        self.in_use.len()
    }
}

impl Default for EphemeralIdPool {
    fn default() -> Self {
        Self::new()
    }
}
