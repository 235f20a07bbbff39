//! The id-keyed entity store.
//!
//! All entity lookups go through this map; `None` from [`Registry::get`] is
//! the liveness check, so stale ids held by timers or known sets degrade to
//! no-ops instead of dangling.

use std::collections::HashMap;
use tracing::debug;
use zone_core::{Entity, EntityId, EntityKind};

/// Depth guard when walking container chains.
const MAX_CONTAINER_DEPTH: u32 = 16;

#[derive(Debug, Default)]
pub struct Registry {
    entities: HashMap<EntityId, Entity>,
}

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entity. A duplicate id is ignored and leaves the existing
    /// entity untouched; returns whether the insert happened.
    pub fn insert(&mut self, entity: Entity) -> bool {
        if self.entities.contains_key(&entity.id) {
            debug!(id = %entity.id, "duplicate entity registration ignored");
            return false;
        }
        self.entities.insert(entity.id, entity);
        true
    }

    pub fn remove(&mut self, id: EntityId) -> Option<Entity> {
        self.entities.remove(&id)
    }

    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.entities.keys().copied()
    }

    /// Ids of all player entities.
    pub fn player_ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.entities
            .values()
            .filter(|e| e.kind() == EntityKind::Player)
            .map(|e| e.id)
    }

    /// Walk the container chain up to the outermost entity. An uncontained
    /// entity is its own top level; an unknown id comes back unchanged.
    #[must_use]
    pub fn top_level(&self, id: EntityId) -> EntityId {
        let mut current = id;
        for _ in 0..MAX_CONTAINER_DEPTH {
            match self.entities.get(&current) {
                Some(e) if e.container.is_valid() => current = e.container,
                _ => return current,
            }
        }
        current
    }
}
