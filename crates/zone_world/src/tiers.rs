//! NPC attention tiers.
//!
//! Every scheduled creature sits in exactly one of three maps keyed by
//! absolute due time: dormant, ready, or active. Each map is polled at its
//! own cadence; taking an id out and re-inserting it under a different tier
//! is the only way a creature migrates, so a migration requested during one
//! poll takes effect on the next pass of the destination tier.

use std::collections::HashMap;
use zone_core::{EntityId, Tier};

#[derive(Debug, Default)]
pub struct TierScheduler {
    dormant: HashMap<EntityId, u64>,
    ready: HashMap<EntityId, u64>,
    active: HashMap<EntityId, u64>,
}

impl TierScheduler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn map_mut(&mut self, tier: Tier) -> &mut HashMap<EntityId, u64> {
        match tier {
            Tier::Dormant => &mut self.dormant,
            Tier::Ready => &mut self.ready,
            Tier::Active => &mut self.active,
        }
    }

    fn map(&self, tier: Tier) -> &HashMap<EntityId, u64> {
        match tier {
            Tier::Dormant => &self.dormant,
            Tier::Ready => &self.ready,
            Tier::Active => &self.active,
        }
    }

    /// Schedule `id` in `tier` at the given due time, removing it from any
    /// tier it currently occupies.
    pub fn insert(&mut self, id: EntityId, tier: Tier, due: u64) {
        self.remove(id);
        self.map_mut(tier).insert(id, due);
    }

    /// Drop `id` from whichever tier holds it.
    pub fn remove(&mut self, id: EntityId) {
        self.dormant.remove(&id);
        self.ready.remove(&id);
        self.active.remove(&id);
    }

    /// Which tier currently holds `id`.
    #[must_use]
    pub fn tier_of(&self, id: EntityId) -> Option<Tier> {
        if self.dormant.contains_key(&id) {
            Some(Tier::Dormant)
        } else if self.ready.contains_key(&id) {
            Some(Tier::Ready)
        } else if self.active.contains_key(&id) {
            Some(Tier::Active)
        } else {
            None
        }
    }

    /// Make `id` due immediately, wherever it is scheduled.
    pub fn force_poll(&mut self, id: EntityId) {
        for map in [&mut self.dormant, &mut self.ready, &mut self.active] {
            if let Some(due) = map.get_mut(&id) {
                *due = 0;
            }
        }
    }

    /// Remove and return every id in `tier` due at or before `now`, with how
    /// far past due each one is.
    pub fn take_due(&mut self, tier: Tier, now: u64) -> Vec<(EntityId, u64)> {
        let map = self.map_mut(tier);
        let due: Vec<EntityId> = map
            .iter()
            .filter(|(_, d)| **d <= now)
            .map(|(id, _)| *id)
            .collect();
        due.into_iter()
            .map(|id| {
                let due = map.remove(&id).unwrap_or(now);
                (id, now.saturating_sub(due))
            })
            .collect()
    }

    #[must_use]
    pub fn due_time(&self, id: EntityId) -> Option<u64> {
        self.tier_of(id).and_then(|t| self.map(t).get(&id).copied())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.dormant.len() + self.ready.len() + self.active.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
