//! Core types for the zone simulation: entity identity, per-kind payloads,
//! id allocation, and the small amount of 2D geometry the world needs.

pub mod entity;
pub mod geo;
pub mod ids;

pub use entity::{
    BuildingData, ConnectionState, CreatureData, CreatureEvent, Entity, EntityData, EntityKind,
    PlayerData, Posture, RegionData, Tier,
};
pub use geo::{distance_2d, Rect};
pub use ids::{EntityId, EphemeralIdPool, EPHEMERAL_ID_BASE};
