//! Typed queries and result rows.
//!
//! Each bootstrap query the zone issues is a variant here, and each carries a
//! typed result — the completion channel never transports untyped payloads.

use glam::Vec3;
use serde::{Deserialize, Serialize};
use zone_core::{EntityData, EntityId, Rect};

// ── Queries ─────────────────────────────────────────────────────────────────

/// Region tables loaded during bootstrap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RegionTable {
    Zone,
    City,
    Badge,
    Spawn,
    CreatureSpawn,
}

/// Static lookup tables. Loaded once at bootstrap, read-only afterwards, and
/// never counted toward load completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LookupTable {
    ClientEffects,
    Sounds,
    Moods,
    NpcAnimations,
    NpcChatter,
    WorldScripts,
}

/// A player position/posture save.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSave {
    pub id: EntityId,
    pub zone_id: u32,
    pub position: Vec3,
    pub heading: f32,
}

/// A request the world core hands to the persistence layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Query {
    /// Total number of persisted entities in the zone. Issued first; its
    /// answer is the load coordinator's completion target.
    ObjectCount { zone_id: u32 },
    /// Buildings (with their cells) placed in the zone.
    Buildings { zone_id: u32 },
    /// World-level objects under the given parent (0 = the zone itself).
    /// A single query spanning several kinds, mirroring how the store keeps
    /// loose objects in one table.
    LooseObjects { zone_id: u32, parent: EntityId },
    /// One of the region tables.
    Regions { zone_id: u32, table: RegionTable },
    /// One of the static lookup tables.
    Lookup(LookupTable),
    /// Persist a player's position (normal save, or relocation to a cloning
    /// facility on death).
    SavePlayer(PlayerSave),
}

// ── Result rows ─────────────────────────────────────────────────────────────

/// A building row: the structure plus the cell ids it contains.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildingRow {
    pub id: EntityId,
    pub position: Vec3,
    pub footprint: Rect,
    pub cloning_facility: bool,
    pub spawn_points: Vec<Vec3>,
    pub cells: Vec<EntityId>,
}

/// A loose world object of any kind; the payload carries the kind tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectRow {
    pub id: EntityId,
    pub data: EntityData,
    pub position: Vec3,
    pub heading: f32,
}

/// A region row from any of the region tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionRow {
    pub id: EntityId,
    pub footprint: Rect,
    pub active: bool,
}

/// Typed answer to a [`Query`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum QueryResult {
    ObjectCount(u64),
    Buildings(Vec<BuildingRow>),
    LooseObjects(Vec<ObjectRow>),
    Regions(RegionTable, Vec<RegionRow>),
    Lookup(LookupTable, Vec<String>),
    SaveAck(EntityId),
}
