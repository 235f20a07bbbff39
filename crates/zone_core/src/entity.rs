//! Entities and their per-kind payloads.
//!
//! Every object in the zone is an [`Entity`]: a kind-tagged payload plus the
//! shared spatial state (position, heading, container, known set). Code that
//! needs kind-specific behavior matches on [`EntityData`]; there is no
//! downcasting and adding a kind forces every dispatch site to be updated.

use crate::geo::Rect;
use crate::ids::EntityId;
use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// The closed set of object kinds the zone simulates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Player,
    Creature,
    Item,
    Building,
    Cell,
    Region,
    Static,
}

/// NPC attention tier. Determines how often the behavior scheduler polls a
/// creature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tier {
    /// No player nearby; polled every few seconds.
    Dormant,
    /// Players in the vicinity; polled about once a second.
    Ready,
    /// In or near combat; polled several times a second.
    Active,
}

/// Connection state of a player entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    Connected,
    /// Client dropped; the entity lingers until the disconnect sweep reaps it
    /// or the player reconnects.
    LinkDead,
    /// Teardown in progress; ignore further traffic for this player.
    Destroying,
}

/// Player posture, as far as the world core cares about it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Posture {
    Upright,
    Incapacitated,
    Dead,
}

/// A discrete occurrence delivered to a creature between behavior polls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CreatureEvent {
    /// Something attacked this creature.
    Attacked { attacker: EntityId },
    /// The creature's current combat target died or vanished.
    TargetLost,
}

/// Player-specific state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerData {
    pub account_id: u32,
    pub connection: ConnectionState,
    pub posture: Posture,
    /// Group membership, 0 when ungrouped.
    pub group_id: u64,
    /// Players this one is dueling. Kept consistent in both directions.
    pub duel_list: Vec<EntityId>,
    /// Creatures and players currently attacking this one.
    pub defender_list: Vec<EntityId>,
    /// An entertainment or crafting session is in progress.
    pub crafting_session: bool,
    pub in_combat: bool,
}

impl PlayerData {
    #[must_use]
    pub fn new(account_id: u32) -> Self {
        Self {
            account_id,
            connection: ConnectionState::Connected,
            posture: Posture::Upright,
            group_id: 0,
            duel_list: Vec::new(),
            defender_list: Vec::new(),
            crafting_session: false,
            in_combat: false,
        }
    }
}

/// Creature (NPC) state driven by the behavior scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatureData {
    pub tier: Tier,
    /// Spawn point the creature leashes back to.
    pub home: Vec3,
    pub leash_radius: f32,
    pub aggro_radius: f32,
    pub attack_range: f32,
    /// Immobile creatures never wander.
    pub mobile: bool,
    pub health: u32,
    pub max_health: u32,
    /// Events delivered since the last behavior poll.
    pub events: Vec<CreatureEvent>,
    pub combat_target: EntityId,
    pub respawn_delay_ms: u64,
}

impl CreatureData {
    #[must_use]
    pub fn new(home: Vec3) -> Self {
        Self {
            tier: Tier::Dormant,
            home,
            leash_radius: 64.0,
            aggro_radius: 24.0,
            attack_range: 4.0,
            mobile: true,
            health: 100,
            max_health: 100,
            events: Vec::new(),
            combat_target: EntityId::INVALID,
            respawn_delay_ms: 30_000,
        }
    }
}

/// Enterable structure state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildingData {
    pub footprint: Rect,
    pub cloning_facility: bool,
    pub spawn_points: Vec<Vec3>,
}

/// World region state: named areas, cities, badge and spawn regions, camps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionData {
    pub footprint: Rect,
    /// Active regions track visitors each region-update tick.
    pub active: bool,
    /// Partition a camp region spawned, 0 for static regions.
    pub camp_partition: u64,
    pub visitors: BTreeSet<EntityId>,
}

/// Kind-tagged payload of an entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EntityData {
    Player(PlayerData),
    Creature(CreatureData),
    Item {
        /// Only the owner sees a privately owned item. `INVALID` = public.
        private_owner: EntityId,
        craft_station: bool,
    },
    Building(BuildingData),
    Cell,
    Region(RegionData),
    Static,
}

impl EntityData {
    #[must_use]
    pub fn kind(&self) -> EntityKind {
        match self {
            EntityData::Player(_) => EntityKind::Player,
            EntityData::Creature(_) => EntityKind::Creature,
            EntityData::Item { .. } => EntityKind::Item,
            EntityData::Building(_) => EntityKind::Building,
            EntityData::Cell => EntityKind::Cell,
            EntityData::Region(_) => EntityKind::Region,
            EntityData::Static => EntityKind::Static,
        }
    }
}

/// A live object in the zone.
#[derive(Debug, Clone)]
pub struct Entity {
    pub id: EntityId,
    pub data: EntityData,
    pub position: Vec3,
    /// Facing in radians around the vertical axis.
    pub heading: f32,
    /// Containing entity (a cell, or a container item). `INVALID` when the
    /// entity sits at world level.
    pub container: EntityId,
    /// Partition whose local index holds this entity, 0 when it is in the
    /// global index or contained.
    pub partition: u64,
    /// Ids this entity knows about. Symmetric: `a` knows `b` iff `b` knows
    /// `a`.
    pub known: BTreeSet<EntityId>,
}

impl Entity {
    #[must_use]
    pub fn new(id: EntityId, data: EntityData, position: Vec3) -> Self {
        Self {
            id,
            data,
            position,
            heading: 0.0,
            container: EntityId::INVALID,
            partition: 0,
            known: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn kind(&self) -> EntityKind {
        self.data.kind()
    }

    #[must_use]
    pub fn is_contained(&self) -> bool {
        self.container.is_valid()
    }

    #[must_use]
    pub fn as_player(&self) -> Option<&PlayerData> {
        match &self.data {
            EntityData::Player(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_player_mut(&mut self) -> Option<&mut PlayerData> {
        match &mut self.data {
            EntityData::Player(p) => Some(p),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_creature(&self) -> Option<&CreatureData> {
        match &self.data {
            EntityData::Creature(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_creature_mut(&mut self) -> Option<&mut CreatureData> {
        match &mut self.data {
            EntityData::Creature(c) => Some(c),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_building(&self) -> Option<&BuildingData> {
        match &self.data {
            EntityData::Building(b) => Some(b),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_region(&self) -> Option<&RegionData> {
        match &self.data {
            EntityData::Region(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_region_mut(&mut self) -> Option<&mut RegionData> {
        match &mut self.data {
            EntityData::Region(r) => Some(r),
            _ => None,
        }
    }
}
