//! Zone configuration.

use serde::{Deserialize, Serialize};
use zone_core::Rect;

/// Tunable parameters of one zone. Deserializable so the server binary can
/// load it from a JSON file; defaults match the live tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Identifier of the zone (planet) this process simulates.
    pub zone_id: u32,
    /// World extent on the horizontal plane.
    pub bounds: Rect,
    /// Static partitions per side; the zone is carved into a
    /// `partition_grid` × `partition_grid` grid.
    pub partition_grid: u32,
    /// Radius inside which entities become aware of each other.
    pub view_range: f32,
    /// Radius inside which a player wakes dormant NPCs.
    pub npc_wake_range: f32,

    /// Poll cadence of the dormant NPC tier, in milliseconds.
    pub tier_dormant_ms: u64,
    /// Poll cadence of the ready NPC tier.
    pub tier_ready_ms: u64,
    /// Poll cadence of the active NPC tier.
    pub tier_active_ms: u64,

    /// How often link-dead players are checked for timeout.
    pub disconnect_sweep_ms: u64,
    /// How long a link-dead player lingers before being saved and removed.
    pub disconnect_timeout_ms: u64,
    /// How often active regions update their visitor sets and retired camp
    /// partitions are actually deleted.
    pub region_update_ms: u64,
    /// How often busy crafting stations are checked for completion.
    pub craft_tool_ms: u64,
    /// How often expired corpses are reaped.
    pub corpse_sweep_ms: u64,
    /// Default corpse lifetime once a creature dies.
    pub corpse_decay_ms: u64,
    /// Creature regeneration pulse.
    pub regen_ms: u64,
    /// Galactic-time announcement interval.
    pub time_update_ms: u64,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            zone_id: 0,
            bounds: Rect::new(-8192.0, -8192.0, 16384.0, 16384.0),
            partition_grid: 16,
            view_range: 128.0,
            npc_wake_range: 80.0,
            tier_dormant_ms: 2500,
            tier_ready_ms: 1000,
            tier_active_ms: 250,
            disconnect_sweep_ms: 1000,
            disconnect_timeout_ms: 30_000,
            region_update_ms: 2000,
            craft_tool_ms: 1000,
            corpse_sweep_ms: 1000,
            corpse_decay_ms: 60_000,
            regen_ms: 5000,
            time_update_ms: 10_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_tier_cadences() {
        let config = WorldConfig::default();
        assert_eq!(config.tier_dormant_ms, 2500);
        assert_eq!(config.tier_ready_ms, 1000);
        assert_eq!(config.tier_active_ms, 250);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: WorldConfig = serde_json::from_str(r#"{"zone_id": 8}"#).unwrap();
        assert_eq!(config.zone_id, 8);
        assert_eq!(config.view_range, 128.0);
    }
}
