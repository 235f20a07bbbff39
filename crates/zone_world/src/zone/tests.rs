use super::*;
use crate::hooks::{FixedCombat, RecordingHooks};
use std::cell::Cell;
use std::sync::Arc;
use zone_persist::{FixtureBackend, QueryBackend};
use zone_proto::RecordingSink;

/// Counts attack resolutions, for assertions on how often behavior ran.
#[derive(Debug, Default)]
struct CountingCombat {
    hits: Cell<u32>,
}

impl CombatResolver for CountingCombat {
    fn resolve_attack(&self, _: &Entity, _: &Entity) -> u32 {
        self.hits.set(self.hits.get() + 1);
        2
    }
}

struct Harness {
    zone: Zone,
    sink: Rc<RecordingSink>,
    hooks: Rc<RecordingHooks>,
    backend: Arc<FixtureBackend>,
}

fn harness_with(backend: FixtureBackend) -> Harness {
    harness_with_combat(backend, Rc::new(FixedCombat(5)))
}

fn harness_with_combat(backend: FixtureBackend, combat: Rc<dyn CombatResolver>) -> Harness {
    let backend = Arc::new(backend);
    let sink = Rc::new(RecordingSink::new());
    let hooks = Rc::new(RecordingHooks::new());
    let persist = PersistHandle::inline(Arc::clone(&backend) as Arc<dyn QueryBackend>);
    let zone = Zone::new(
        WorldConfig::default(),
        persist,
        Rc::clone(&sink) as Rc<dyn ProtocolSink>,
        Rc::clone(&hooks) as Rc<dyn ScriptHooks>,
        combat,
    );
    Harness {
        zone,
        sink,
        hooks,
        backend,
    }
}

/// Harness with an empty store, bootstrapped straight into `Running`.
fn running_harness() -> Harness {
    let mut h = harness_with(FixtureBackend::new());
    h.zone.bootstrap();
    h.zone.tick(0);
    assert_eq!(h.zone.state(), ZoneState::Running);
    h
}

fn player_entity(id: u64, pos: Vec3) -> Entity {
    Entity::new(
        EntityId(id),
        EntityData::Player(zone_core::PlayerData::new(id as u32)),
        pos,
    )
}

fn creature_entity(id: u64, pos: Vec3) -> Entity {
    let mut data = CreatureData::new(pos);
    data.mobile = false;
    Entity::new(EntityId(id), EntityData::Creature(data), pos)
}

// ── Bootstrap ───────────────────────────────────────────────────────────────

#[test]
fn test_bootstrap_loads_world_and_fires_once() {
    let mut backend = FixtureBackend::new();
    backend.buildings.push(zone_persist::BuildingRow {
        id: EntityId(100),
        position: Vec3::new(50.0, 0.0, 50.0),
        footprint: Rect::new(40.0, 40.0, 20.0, 20.0),
        cloning_facility: false,
        spawn_points: Vec::new(),
        cells: vec![EntityId(101), EntityId(102)],
    });
    backend.loose_objects.push(zone_persist::ObjectRow {
        id: EntityId(200),
        data: EntityData::Static,
        position: Vec3::ZERO,
        heading: 0.0,
    });
    backend.regions.insert(
        RegionTable::City,
        vec![zone_persist::RegionRow {
            id: EntityId(300),
            footprint: Rect::new(0.0, 0.0, 100.0, 100.0),
            active: true,
        }],
    );
    backend
        .lookups
        .insert(LookupTable::Moods, vec!["happy".into(), "grumpy".into()]);

    let mut h = harness_with(backend);
    h.zone.bootstrap();
    h.zone.tick(0);

    assert_eq!(h.zone.state(), ZoneState::Running);
    assert_eq!(h.zone.registry.len(), 5);
    assert_eq!(h.zone.lookup(LookupTable::Moods).len(), 2);
    // Cells hang off the building, outside any spatial index.
    assert_eq!(
        h.zone.registry.get(EntityId(101)).unwrap().container,
        EntityId(100)
    );
    assert_eq!(h.hooks.events(), vec!["ready".to_owned()]);

    // Completion never re-fires, whatever else happens.
    h.zone.tick(60_000);
    assert_eq!(
        h.hooks.events().iter().filter(|e| *e == "ready").count(),
        1
    );
}

#[test]
fn test_no_steady_timers_before_load_complete() {
    let mut h = harness_with(FixtureBackend::new());
    assert_eq!(h.zone.state(), ZoneState::Loading);
    h.zone.tick(10_000);
    assert!(h.zone.scheduler.is_empty());
    assert!(h.hooks.events().is_empty());
}

// ── Visibility & movement ───────────────────────────────────────────────────

#[test]
fn test_player_spawn_creates_symmetric_known_sets() {
    let mut h = running_harness();
    h.zone.add_entity(player_entity(1, Vec3::ZERO), false);
    h.zone
        .add_entity(player_entity(2, Vec3::new(10.0, 0.0, 0.0)), false);
    let p1 = h.zone.registry.get(EntityId(1)).unwrap();
    let p2 = h.zone.registry.get(EntityId(2)).unwrap();
    assert!(p1.known.contains(&EntityId(2)));
    assert!(p2.known.contains(&EntityId(1)));
    assert_eq!(h.sink.creates_for(EntityId(2)), vec![EntityId(1)]);
}

#[test]
fn test_warp_tears_down_and_recomputes() {
    let mut h = running_harness();
    h.zone.add_entity(player_entity(1, Vec3::ZERO), false);
    h.zone
        .add_entity(player_entity(2, Vec3::new(10.0, 0.0, 0.0)), false);

    h.zone.warp(EntityId(1), Vec3::new(5000.0, 0.0, 5000.0));
    assert!(h.zone.registry.get(EntityId(1)).unwrap().known.is_empty());
    assert!(h.zone.registry.get(EntityId(2)).unwrap().known.is_empty());
    assert_eq!(h.sink.destroys_for(EntityId(2)), vec![EntityId(1)]);

    h.zone.warp(EntityId(1), Vec3::new(12.0, 0.0, 0.0));
    assert!(h
        .zone
        .registry
        .get(EntityId(1))
        .unwrap()
        .known
        .contains(&EntityId(2)));
}

#[test]
fn test_duplicate_add_is_ignored() {
    let mut h = running_harness();
    h.zone.add_entity(player_entity(1, Vec3::ZERO), false);
    let mut imposter = player_entity(1, Vec3::new(999.0, 0.0, 999.0));
    imposter.heading = 1.0;
    h.zone.add_entity(imposter, false);
    assert_eq!(h.zone.registry.get(EntityId(1)).unwrap().position, Vec3::ZERO);
}

// ── Destroy teardown ────────────────────────────────────────────────────────

#[test]
fn test_destroy_player_unwinds_everything() {
    let mut h = running_harness();
    h.zone.add_entity(player_entity(1, Vec3::ZERO), false);
    h.zone
        .add_entity(player_entity(2, Vec3::new(10.0, 0.0, 0.0)), false);
    h.zone
        .add_entity(creature_entity(3, Vec3::new(5.0, 0.0, 0.0)), false);

    // Duel both directions, and the creature is fighting player 1.
    for (a, b) in [(1u64, 2u64), (2, 1)] {
        h.zone
            .registry
            .get_mut(EntityId(a))
            .unwrap()
            .as_player_mut()
            .unwrap()
            .duel_list
            .push(EntityId(b));
    }
    h.zone
        .registry
        .get_mut(EntityId(3))
        .unwrap()
        .as_creature_mut()
        .unwrap()
        .combat_target = EntityId(1);
    h.zone
        .registry
        .get_mut(EntityId(1))
        .unwrap()
        .as_player_mut()
        .unwrap()
        .defender_list
        .push(EntityId(3));

    assert!(h.zone.destroy_entity(EntityId(1)));

    assert!(h.zone.registry.get(EntityId(1)).is_none());
    assert!(h.zone.player_by_account(1).is_none());
    let p2 = h.zone.registry.get(EntityId(2)).unwrap();
    assert!(p2.as_player().unwrap().duel_list.is_empty());
    assert!(!p2.known.contains(&EntityId(1)));
    let c = h.zone.registry.get(EntityId(3)).unwrap().as_creature().unwrap();
    assert!(!c.combat_target.is_valid());
    assert!(c.events.contains(&CreatureEvent::TargetLost));
    assert!(h.hooks.events().contains(&"left:1".to_owned()));

    // Idempotent.
    assert!(!h.zone.destroy_entity(EntityId(1)));
}

#[test]
fn test_destroy_building_takes_contents_along() {
    let mut h = running_harness();
    let mut building = Entity::new(
        EntityId(100),
        EntityData::Building(BuildingData {
            footprint: Rect::new(0.0, 0.0, 20.0, 20.0),
            cloning_facility: false,
            spawn_points: Vec::new(),
        }),
        Vec3::new(10.0, 0.0, 10.0),
    );
    building.heading = 0.0;
    h.zone.add_entity(building, false);
    let mut cell = Entity::new(EntityId(101), EntityData::Cell, Vec3::ZERO);
    cell.container = EntityId(100);
    h.zone.add_entity(cell, false);

    assert!(h.zone.destroy_entity(EntityId(100)));
    assert!(h.zone.registry.get(EntityId(101)).is_none());
    assert!(h.zone.spatial.footprint(EntityId(100)).is_none());
}

#[test]
fn test_dead_player_saves_at_cloning_facility() {
    let mut h = running_harness();
    h.zone.add_entity(
        Entity::new(
            EntityId(100),
            EntityData::Building(BuildingData {
                footprint: Rect::new(490.0, 490.0, 20.0, 20.0),
                cloning_facility: true,
                spawn_points: Vec::new(),
            }),
            Vec3::new(500.0, 0.0, 500.0),
        ),
        false,
    );
    h.zone.add_entity(player_entity(1, Vec3::ZERO), false);
    h.zone
        .registry
        .get_mut(EntityId(1))
        .unwrap()
        .as_player_mut()
        .unwrap()
        .posture = Posture::Dead;

    h.zone.destroy_entity(EntityId(1));
    h.zone.tick(0);
    let saves = h.backend.saves();
    assert_eq!(saves.len(), 1);
    assert_eq!(saves[0].position, Vec3::new(500.0, 0.0, 500.0));
}

// ── Disconnect handling ─────────────────────────────────────────────────────

#[test]
fn test_disconnect_sweep_saves_then_destroys() {
    let mut h = running_harness();
    h.zone
        .add_entity(player_entity(1, Vec3::new(7.0, 0.0, 7.0)), false);
    h.zone.add_disconnected_player(EntityId(1));
    assert_eq!(h.zone.disconnected_count(), 1);

    // Before the timeout the player survives the sweep.
    h.zone.tick(h.zone.config.disconnect_sweep_ms);
    assert!(h.zone.registry.contains(EntityId(1)));

    h.zone.tick(h.zone.config.disconnect_timeout_ms);
    assert!(h.zone.registry.get(EntityId(1)).is_none());
    let saves = h.backend.saves();
    assert_eq!(saves.len(), 1);
    assert_eq!(saves[0].position, Vec3::new(7.0, 0.0, 7.0));
}

#[test]
fn test_reconnect_cancels_removal() {
    let mut h = running_harness();
    h.zone.add_entity(player_entity(1, Vec3::ZERO), false);
    h.zone.add_disconnected_player(EntityId(1));
    h.zone.add_reconnected_player(EntityId(1));
    h.zone
        .tick(h.zone.config.disconnect_timeout_ms + h.zone.config.disconnect_sweep_ms);
    assert!(h.zone.registry.contains(EntityId(1)));
    assert!(h.backend.saves().is_empty());
}

// ── NPC tiers ───────────────────────────────────────────────────────────────

#[test]
fn test_dormant_creature_wakes_near_player() {
    let mut h = running_harness();
    h.zone.add_entity(player_entity(1, Vec3::ZERO), false);
    let mut data = CreatureData::new(Vec3::new(20.0, 0.0, 0.0));
    data.mobile = false;
    let npc = h.zone.spawn_npc(data, Vec3::new(20.0, 0.0, 0.0)).unwrap();
    assert_eq!(h.zone.tiers.tier_of(npc), Some(Tier::Dormant));

    h.zone.tick(h.zone.config.tier_dormant_ms);
    assert_eq!(h.zone.tiers.tier_of(npc), Some(Tier::Ready));
    assert!(h.zone.tiers.due_time(npc).unwrap() <= h.zone.now_ms());
}

#[test]
fn test_attacked_dormant_creature_goes_active() {
    let mut h = running_harness();
    h.zone.add_entity(player_entity(1, Vec3::new(300.0, 0.0, 0.0)), false);
    let mut data = CreatureData::new(Vec3::ZERO);
    data.mobile = false;
    let npc = h.zone.spawn_npc(data, Vec3::ZERO).unwrap();

    h.zone.notify_creature(
        npc,
        CreatureEvent::Attacked {
            attacker: EntityId(1),
        },
    );
    h.zone.tick(h.zone.config.tier_dormant_ms);
    assert_eq!(h.zone.tiers.tier_of(npc), Some(Tier::Active));
    assert!(h.zone.tiers.due_time(npc).unwrap() <= h.zone.now_ms());
}

#[test]
fn test_migrated_creature_not_polled_twice_in_one_tick() {
    let combat = Rc::new(CountingCombat::default());
    let mut h = harness_with_combat(
        FixtureBackend::new(),
        Rc::clone(&combat) as Rc<dyn CombatResolver>,
    );
    h.zone.bootstrap();
    h.zone.tick(0);
    assert_eq!(h.zone.state(), ZoneState::Running);

    h.zone
        .add_entity(player_entity(1, Vec3::new(2.0, 0.0, 0.0)), false);
    h.zone.add_entity(creature_entity(3, Vec3::ZERO), false);
    h.zone.notify_creature(
        EntityId(3),
        CreatureEvent::Attacked {
            attacker: EntityId(1),
        },
    );

    // Walk to the 2500 ms mark in active-cadence steps so the dormant and
    // active polls land in the same tick. The attack must resolve once:
    // the active tier picks the migrated creature up next tick, not now.
    for _ in 0..10 {
        h.zone.tick(h.zone.config.tier_active_ms);
    }
    assert_eq!(h.zone.tiers.tier_of(EntityId(3)), Some(Tier::Active));
    assert_eq!(combat.hits.get(), 1);

    // The next active pass runs it again.
    h.zone.tick(h.zone.config.tier_active_ms);
    assert_eq!(combat.hits.get(), 2);
}

#[test]
fn test_spawn_npc_allocates_consecutive_pair() {
    let mut h = running_harness();
    let npc = h
        .zone
        .spawn_npc(CreatureData::new(Vec3::ZERO), Vec3::ZERO)
        .unwrap();
    let inventory = EntityId(npc.0 + 1);
    assert!(npc.is_ephemeral());
    assert_eq!(h.zone.registry.get(inventory).unwrap().container, npc);
}

// ── Corpses & regen ─────────────────────────────────────────────────────────

#[test]
fn test_corpse_decay_earlier_deadline_wins() {
    let mut h = running_harness();
    h.zone.add_entity(creature_entity(3, Vec3::ZERO), false);
    h.zone.kill_creature(EntityId(3));
    let deadline = h.zone.corpse_decay_deadline(EntityId(3)).unwrap();
    h.zone.schedule_corpse_decay(EntityId(3), h.zone.config.corpse_decay_ms * 2);
    assert_eq!(h.zone.corpse_decay_deadline(EntityId(3)), Some(deadline));
    h.zone.schedule_corpse_decay(EntityId(3), 100);
    assert!(h.zone.corpse_decay_deadline(EntityId(3)).unwrap() < deadline);
}

#[test]
fn test_corpse_reaped_after_decay() {
    let mut h = running_harness();
    h.zone.add_entity(creature_entity(3, Vec3::ZERO), false);
    h.zone.kill_creature(EntityId(3));
    assert_eq!(h.zone.tiers.tier_of(EntityId(3)), None);
    h.zone
        .tick(h.zone.config.corpse_decay_ms + h.zone.config.corpse_sweep_ms);
    assert!(h.zone.registry.get(EntityId(3)).is_none());
}

#[test]
fn test_regen_heals_to_full_and_stops() {
    let mut h = running_harness();
    h.zone.add_entity(creature_entity(3, Vec3::ZERO), false);
    h.zone
        .registry
        .get_mut(EntityId(3))
        .unwrap()
        .as_creature_mut()
        .unwrap()
        .health = 50;
    h.zone.start_regen(EntityId(3));
    for _ in 0..10 {
        h.zone.tick(h.zone.config.regen_ms);
    }
    let c = h.zone.registry.get(EntityId(3)).unwrap().as_creature().unwrap();
    assert_eq!(c.health, c.max_health);
    assert!(h.zone.regen_tasks.is_empty());
}

// ── Regions & camps ─────────────────────────────────────────────────────────

#[test]
fn test_camp_partition_deleted_only_on_region_update() {
    let mut h = running_harness();
    let camp = h.zone.spawn_camp(Rect::new(100.0, 100.0, 30.0, 30.0)).unwrap();
    let partition = h
        .zone
        .registry
        .get(camp)
        .unwrap()
        .as_region()
        .unwrap()
        .camp_partition;
    assert!(h.zone.spatial.partition(partition).is_some());

    h.zone.destroy_entity(camp);
    // Retired, but still present until the region-update tick.
    assert!(h.zone.spatial.partition(partition).is_some());
    h.zone.tick(h.zone.config.region_update_ms);
    assert!(h.zone.spatial.partition(partition).is_none());
}

#[test]
fn test_active_region_tracks_visitors() {
    let mut backend = FixtureBackend::new();
    backend.regions.insert(
        RegionTable::Spawn,
        vec![zone_persist::RegionRow {
            id: EntityId(300),
            footprint: Rect::new(0.0, 0.0, 50.0, 50.0),
            active: true,
        }],
    );
    let mut h = harness_with(backend);
    h.zone.bootstrap();
    h.zone.tick(0);
    assert_eq!(h.zone.state(), ZoneState::Running);

    h.zone
        .add_entity(player_entity(1, Vec3::new(25.0, 0.0, 25.0)), false);
    h.zone.tick(h.zone.config.region_update_ms);
    assert!(h
        .zone
        .registry
        .get(EntityId(300))
        .unwrap()
        .as_region()
        .unwrap()
        .visitors
        .contains(&EntityId(1)));

    h.zone.warp(EntityId(1), Vec3::new(500.0, 0.0, 500.0));
    h.zone.tick(h.zone.config.region_update_ms);
    assert!(h
        .zone
        .registry
        .get(EntityId(300))
        .unwrap()
        .as_region()
        .unwrap()
        .visitors
        .is_empty());
}

// ── Crafting & time ─────────────────────────────────────────────────────────

#[test]
fn test_craft_tool_finishes_on_schedule() {
    let mut h = running_harness();
    h.zone.add_entity(
        Entity::new(
            EntityId(40),
            EntityData::Item {
                private_owner: EntityId::INVALID,
                craft_station: true,
            },
            Vec3::ZERO,
        ),
        false,
    );
    h.zone.start_craft(EntityId(40), 1500);
    assert!(h.zone.craft_tool_busy(EntityId(40)));
    h.zone.tick(h.zone.config.craft_tool_ms);
    assert!(h.zone.craft_tool_busy(EntityId(40)));
    h.zone.tick(h.zone.config.craft_tool_ms);
    assert!(!h.zone.craft_tool_busy(EntityId(40)));
}

#[test]
fn test_galactic_time_announced() {
    let mut h = running_harness();
    h.zone.tick(h.zone.config.time_update_ms);
    assert!(h.zone.galactic_time_ms() > 0);
    assert!(h
        .sink
        .events()
        .iter()
        .any(|n| matches!(n, zone_proto::Notification::Time(_))));
}

// ── Shutdown ────────────────────────────────────────────────────────────────

#[test]
fn test_shutdown_saves_every_player() {
    let mut h = running_harness();
    h.zone.add_entity(player_entity(1, Vec3::ZERO), false);
    h.zone
        .add_entity(player_entity(2, Vec3::new(10.0, 0.0, 0.0)), false);
    h.zone.shutdown();
    assert_eq!(h.zone.state(), ZoneState::ShuttingDown);
    assert_eq!(h.backend.saves().len(), 2);
}
