//! Creature behavior: what happens when a tier poll reaches an NPC.
//!
//! A behavior pass drains the creature's pending events, advances its state
//! machine, and reports which tier it should occupy next and how long until
//! it wants attention again. Tier changes are applied by the caller; this
//! module only decides.

use crate::config::WorldConfig;
use crate::container::ContainerIndex;
use crate::hooks::CombatResolver;
use crate::registry::Registry;
use crate::spatial::SpatialIndex;
use crate::visibility;
use glam::Vec3;
use rand::rngs::SmallRng;
use rand::Rng;
use tracing::debug;
use zone_core::{distance_2d, ConnectionState, CreatureEvent, EntityData, EntityId, Tier};
use zone_proto::ProtocolSink;

/// Result of one behavior pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BehaviorOutcome {
    /// Tier the creature should occupy from here on.
    pub tier: Tier,
    /// Milliseconds until the next wanted poll. Zero means "do not
    /// reschedule me"; with a tier change it means "pick me up on the next
    /// pass of the new tier".
    pub wait_ms: u64,
}

/// Everything a behavior pass may touch.
pub struct BehaviorCtx<'a> {
    pub registry: &'a mut Registry,
    pub containers: &'a ContainerIndex,
    pub spatial: &'a mut SpatialIndex,
    pub sink: &'a dyn ProtocolSink,
    pub combat: &'a dyn CombatResolver,
    pub config: &'a WorldConfig,
    pub rng: &'a mut SmallRng,
}

/// Run one behavior pass for `id`. Returns `None` when the id no longer
/// refers to a living creature, which the tier scheduler treats as a silent
/// drop.
pub fn run(ctx: &mut BehaviorCtx<'_>, id: EntityId, overdue_ms: u64) -> Option<BehaviorOutcome> {
    let entity = ctx.registry.get(id)?;
    let creature = entity.as_creature()?;
    if creature.health == 0 {
        return None;
    }
    let tier = creature.tier;
    if overdue_ms > 0 {
        debug!(%id, overdue_ms, "behavior pass running late");
    }

    // Events first; they can force the tier regardless of surroundings.
    let events = std::mem::take(&mut ctx.registry.get_mut(id)?.as_creature_mut()?.events);
    for event in events {
        match event {
            CreatureEvent::Attacked { attacker } => {
                let c = ctx.registry.get_mut(id)?.as_creature_mut()?;
                if !c.combat_target.is_valid() {
                    c.combat_target = attacker;
                }
                c.tier = Tier::Active;
            }
            CreatureEvent::TargetLost => {
                let c = ctx.registry.get_mut(id)?.as_creature_mut()?;
                c.combat_target = EntityId::INVALID;
                if c.tier == Tier::Active {
                    c.tier = Tier::Ready;
                }
            }
        }
    }

    let current = ctx.registry.get(id)?.as_creature()?.tier;
    let outcome = match current {
        Tier::Dormant => run_dormant(ctx, id),
        Tier::Ready => run_ready(ctx, id),
        Tier::Active => run_active(ctx, id),
    }?;

    let c = ctx.registry.get_mut(id)?.as_creature_mut()?;
    c.tier = outcome.tier;
    if outcome.tier != tier {
        debug!(%id, from = ?tier, to = ?outcome.tier, "creature tier change");
    }
    Some(outcome)
}

fn run_dormant(ctx: &mut BehaviorCtx<'_>, id: EntityId) -> Option<BehaviorOutcome> {
    let position = ctx.registry.get(id)?.position;
    if nearest_player(ctx.registry, position, ctx.config.npc_wake_range).is_some() {
        return Some(BehaviorOutcome {
            tier: Tier::Ready,
            wait_ms: 0,
        });
    }
    maybe_wander(ctx, id);
    Some(BehaviorOutcome {
        tier: Tier::Dormant,
        wait_ms: ctx.config.tier_dormant_ms,
    })
}

fn run_ready(ctx: &mut BehaviorCtx<'_>, id: EntityId) -> Option<BehaviorOutcome> {
    let position = ctx.registry.get(id)?.position;
    let aggro = ctx.registry.get(id)?.as_creature()?.aggro_radius;
    if let Some(target) = nearest_player(ctx.registry, position, aggro) {
        ctx.registry.get_mut(id)?.as_creature_mut()?.combat_target = target;
        return Some(BehaviorOutcome {
            tier: Tier::Active,
            wait_ms: 0,
        });
    }
    if nearest_player(ctx.registry, position, ctx.config.npc_wake_range).is_none() {
        return Some(BehaviorOutcome {
            tier: Tier::Dormant,
            wait_ms: 0,
        });
    }
    maybe_wander(ctx, id);
    Some(BehaviorOutcome {
        tier: Tier::Ready,
        wait_ms: ctx.config.tier_ready_ms,
    })
}

fn run_active(ctx: &mut BehaviorCtx<'_>, id: EntityId) -> Option<BehaviorOutcome> {
    let (position, home, leash, attack_range, target) = {
        let e = ctx.registry.get(id)?;
        let c = e.as_creature()?;
        (
            e.position,
            c.home,
            c.leash_radius,
            c.attack_range,
            c.combat_target,
        )
    };

    let target_gone = !target.is_valid()
        || match ctx.registry.get(target) {
            None => true,
            Some(t) => match &t.data {
                EntityData::Player(p) => p.connection == ConnectionState::Destroying,
                EntityData::Creature(c) => c.health == 0,
                _ => true,
            },
        };
    if target_gone {
        ctx.registry.get_mut(id)?.as_creature_mut()?.combat_target = EntityId::INVALID;
        return Some(BehaviorOutcome {
            tier: Tier::Ready,
            wait_ms: 0,
        });
    }

    // Leash: too far from home drops combat and snaps back.
    if distance_2d(position, home) > leash {
        move_creature(ctx, id, home);
        ctx.registry.get_mut(id)?.as_creature_mut()?.combat_target = EntityId::INVALID;
        return Some(BehaviorOutcome {
            tier: Tier::Ready,
            wait_ms: 0,
        });
    }

    let target_pos = ctx.registry.get(target)?.position;
    if distance_2d(position, target_pos) <= attack_range {
        let damage = {
            let attacker = ctx.registry.get(id)?;
            let defender = ctx.registry.get(target)?;
            ctx.combat.resolve_attack(attacker, defender)
        };
        apply_damage(ctx.registry, id, target, damage);
    } else {
        // Close the gap, one stride per pass.
        let dir = Vec3::new(target_pos.x - position.x, 0.0, target_pos.z - position.z);
        let dist = distance_2d(position, target_pos);
        if dist > f32::EPSILON {
            let stride = (dist - attack_range * 0.5).min(4.0).max(0.0);
            move_creature(ctx, id, position + dir / dist * stride);
        }
    }
    Some(BehaviorOutcome {
        tier: Tier::Active,
        wait_ms: ctx.config.tier_active_ms,
    })
}

fn apply_damage(registry: &mut Registry, attacker: EntityId, defender: EntityId, damage: u32) {
    let Some(e) = registry.get_mut(defender) else { return };
    match &mut e.data {
        EntityData::Player(p) => {
            p.in_combat = true;
            if !p.defender_list.contains(&attacker) {
                p.defender_list.push(attacker);
            }
        }
        EntityData::Creature(c) => {
            c.health = c.health.saturating_sub(damage);
            if !c.events.iter().any(|ev| matches!(ev, CreatureEvent::Attacked { .. })) {
                c.events.push(CreatureEvent::Attacked { attacker });
            }
        }
        _ => {}
    }
}

fn maybe_wander(ctx: &mut BehaviorCtx<'_>, id: EntityId) {
    let Some(e) = ctx.registry.get(id) else { return };
    let Some(c) = e.as_creature() else { return };
    if !c.mobile || !ctx.rng.gen_bool(0.3) {
        return;
    }
    let radius = c.leash_radius * 0.25;
    let home = c.home;
    let target = Vec3::new(
        home.x + ctx.rng.gen_range(-radius..=radius),
        home.y,
        home.z + ctx.rng.gen_range(-radius..=radius),
    );
    move_creature(ctx, id, target);
}

/// Reposition a creature: spatial reindex, then the same full known-set
/// teardown and recompute every other movement path goes through.
fn move_creature(ctx: &mut BehaviorCtx<'_>, id: EntityId, to: Vec3) {
    {
        let Some(e) = ctx.registry.get_mut(id) else { return };
        let old_partition = e.partition;
        e.position = to;
        if !e.is_contained() {
            let new_partition = ctx.spatial.partition_at(to);
            e.partition = new_partition;
            ctx.spatial.remove(id, old_partition);
            ctx.spatial.insert(id, to, new_partition);
        }
    }
    visibility::destroy_known(ctx.registry, ctx.sink, id);
    visibility::init_objects_in_range(
        ctx.registry,
        ctx.containers,
        ctx.spatial,
        ctx.sink,
        id,
        ctx.config.view_range,
    );
}

/// Closest connected, world-level player within `range`.
fn nearest_player(registry: &Registry, position: Vec3, range: f32) -> Option<EntityId> {
    registry
        .iter()
        .filter_map(|e| match &e.data {
            EntityData::Player(p)
                if p.connection == ConnectionState::Connected && !e.is_contained() =>
            {
                let d = distance_2d(position, e.position);
                (d <= range).then_some((e.id, d))
            }
            _ => None,
        })
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(id, _)| id)
}
