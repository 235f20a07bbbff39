//! The zone context object.
//!
//! [`Zone`] owns every mutable subsystem of one world partition and is the
//! only way to reach them; there is no global state. All methods run on the
//! tick thread. [`Zone::tick`] drives the whole simulation: it drains
//! persistence completions, then dispatches every due subsystem task.

use crate::behavior::{self, BehaviorCtx};
use crate::config::WorldConfig;
use crate::container::ContainerIndex;
use crate::hooks::{CombatResolver, ScriptHooks};
use crate::loader::{LoadCoordinator, ZoneState};
use crate::registry::Registry;
use crate::spatial::SpatialIndex;
use crate::tiers::TierScheduler;
use crate::timer::{Scheduler, TaskId};
use crate::visibility;
use glam::Vec3;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use tracing::{debug, error, info};
use zone_core::entity::{BuildingData, RegionData};
use zone_core::{
    ConnectionState, CreatureData, CreatureEvent, Entity, EntityData, EntityId, EntityKind,
    EphemeralIdPool, Posture, Rect, Tier,
};
use zone_persist::{
    BuildingRow, Completion, LookupTable, ObjectRow, PersistHandle, PlayerSave, Query, QueryResult,
    RegionRow, RegionTable,
};
use zone_proto::ProtocolSink;

/// Work the timer queue can hand back to the zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubsystemTask {
    /// Reap link-dead players whose timeout passed.
    DisconnectSweep,
    /// Refresh active-region visitor sets and flush retired camp partitions.
    RegionUpdate,
    /// Finish crafting stations whose work completed.
    CraftTools,
    /// Delete corpses whose decay deadline passed.
    CorpseDecay,
    /// Advance and announce galactic time.
    GalacticTime,
    /// Poll one NPC attention tier.
    TierPoll(Tier),
    /// One creature's regeneration pulse.
    Regen(EntityId),
}

pub struct Zone {
    pub config: WorldConfig,
    pub registry: Registry,
    pub containers: ContainerIndex,
    pub spatial: SpatialIndex,
    pub scheduler: Scheduler<SubsystemTask>,
    pub tiers: TierScheduler,
    pub loader: LoadCoordinator,
    pub ids: EphemeralIdPool,
    persist: PersistHandle,
    proto: Rc<dyn ProtocolSink>,
    hooks: Rc<dyn ScriptHooks>,
    combat: Rc<dyn CombatResolver>,
    rng: SmallRng,
    state: ZoneState,
    now_ms: u64,
    galactic_time_ms: u64,
    players_by_account: HashMap<u32, EntityId>,
    disconnected: HashMap<EntityId, u64>,
    corpse_decay: HashMap<EntityId, u64>,
    busy_craft_tools: HashMap<EntityId, u64>,
    regen_tasks: HashMap<EntityId, TaskId>,
    lookups: HashMap<LookupTable, Vec<String>>,
    /// Creatures that changed tier during the current tick. Their new tier
    /// must not poll them until the next tick.
    migrated: HashSet<EntityId>,
}

impl Zone {
    #[must_use]
    pub fn new(
        config: WorldConfig,
        persist: PersistHandle,
        proto: Rc<dyn ProtocolSink>,
        hooks: Rc<dyn ScriptHooks>,
        combat: Rc<dyn CombatResolver>,
    ) -> Self {
        let spatial = SpatialIndex::new(config.bounds, config.partition_grid);
        Self {
            config,
            registry: Registry::new(),
            containers: ContainerIndex::new(),
            spatial,
            scheduler: Scheduler::new(),
            tiers: TierScheduler::new(),
            loader: LoadCoordinator::new(),
            ids: EphemeralIdPool::new(),
            persist,
            proto,
            hooks,
            combat,
            rng: SmallRng::from_entropy(),
            state: ZoneState::Loading,
            now_ms: 0,
            galactic_time_ms: 0,
            players_by_account: HashMap::new(),
            disconnected: HashMap::new(),
            corpse_decay: HashMap::new(),
            busy_craft_tools: HashMap::new(),
            regen_tasks: HashMap::new(),
            lookups: HashMap::new(),
            migrated: HashSet::new(),
        }
    }

    #[must_use]
    pub fn state(&self) -> ZoneState {
        self.state
    }

    #[must_use]
    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    #[must_use]
    pub fn galactic_time_ms(&self) -> u64 {
        self.galactic_time_ms
    }

    #[must_use]
    pub fn lookup(&self, table: LookupTable) -> &[String] {
        self.lookups.get(&table).map_or(&[], Vec::as_slice)
    }

    #[must_use]
    pub fn player_by_account(&self, account_id: u32) -> Option<EntityId> {
        self.players_by_account.get(&account_id).copied()
    }

    // ── Bootstrap ───────────────────────────────────────────────────────────

    /// Issue every bootstrap query. The count query goes out first; its
    /// answer becomes the load-completion target.
    pub fn bootstrap(&mut self) {
        let zone_id = self.config.zone_id;
        info!(zone_id, "zone bootstrap starting");
        self.persist.dispatch(Query::ObjectCount { zone_id });
        self.persist.dispatch(Query::Buildings { zone_id });
        self.persist.dispatch(Query::LooseObjects {
            zone_id,
            parent: EntityId::INVALID,
        });
        for table in [
            RegionTable::Zone,
            RegionTable::City,
            RegionTable::Badge,
            RegionTable::Spawn,
            RegionTable::CreatureSpawn,
        ] {
            self.persist.dispatch(Query::Regions { zone_id, table });
        }
        for table in [
            LookupTable::ClientEffects,
            LookupTable::Sounds,
            LookupTable::Moods,
            LookupTable::NpcAnimations,
            LookupTable::NpcChatter,
            LookupTable::WorldScripts,
        ] {
            self.persist.dispatch(Query::Lookup(table));
        }
    }

    // ── Tick ────────────────────────────────────────────────────────────────

    /// Advance the simulation by `dt_ms`.
    pub fn tick(&mut self, dt_ms: u64) {
        self.now_ms += dt_ms;
        self.migrated.clear();
        for completion in self.persist.drain() {
            self.apply_completion(completion);
        }
        for (_, task) in self.scheduler.pop_due(self.now_ms) {
            self.dispatch_task(task);
        }
    }

    fn dispatch_task(&mut self, task: SubsystemTask) {
        match task {
            SubsystemTask::DisconnectSweep => self.sweep_disconnected(),
            SubsystemTask::RegionUpdate => self.handle_region_update(),
            SubsystemTask::CraftTools => self.handle_craft_tools(),
            SubsystemTask::CorpseDecay => self.handle_corpse_decay(),
            SubsystemTask::GalacticTime => {
                self.galactic_time_ms += self.config.time_update_ms;
                self.proto.server_time(self.galactic_time_ms);
            }
            SubsystemTask::TierPoll(tier) => self.handle_tier_poll(tier),
            SubsystemTask::Regen(id) => self.handle_regen(id),
        }
    }

    fn apply_completion(&mut self, completion: Completion) {
        let result = match completion.result {
            Ok(result) => result,
            Err(e) => {
                error!(query = ?completion.query, %e, "persistence query failed");
                return;
            }
        };
        match result {
            QueryResult::ObjectCount(count) => {
                self.loader.set_expected(count);
            }
            QueryResult::Buildings(rows) => {
                for row in rows {
                    self.load_building(row);
                }
            }
            QueryResult::LooseObjects(rows) => {
                for row in rows {
                    self.load_object(row);
                }
            }
            QueryResult::Regions(table, rows) => {
                for row in rows {
                    self.load_region(table, row);
                }
            }
            QueryResult::Lookup(table, values) => {
                debug!(?table, entries = values.len(), "lookup table loaded");
                self.lookups.insert(table, values);
            }
            QueryResult::SaveAck(id) => {
                debug!(%id, "player save acknowledged");
            }
        }
        self.check_load_complete();
    }

    fn load_building(&mut self, row: BuildingRow) {
        let loaded = 1 + row.cells.len() as u64;
        let building = Entity::new(
            row.id,
            EntityData::Building(BuildingData {
                footprint: row.footprint,
                cloning_facility: row.cloning_facility,
                spawn_points: row.spawn_points,
            }),
            row.position,
        );
        let building_id = building.id;
        self.add_entity(building, false);
        for cell in row.cells {
            let mut entity = Entity::new(cell, EntityData::Cell, row.position);
            entity.container = building_id;
            self.add_entity(entity, false);
        }
        self.loader.record_loaded(loaded);
    }

    fn load_object(&mut self, row: ObjectRow) {
        let mut entity = Entity::new(row.id, row.data, row.position);
        entity.heading = row.heading;
        self.add_entity(entity, false);
        self.loader.record_loaded(1);
    }

    fn load_region(&mut self, table: RegionTable, row: RegionRow) {
        let entity = Entity::new(
            row.id,
            EntityData::Region(RegionData {
                footprint: row.footprint,
                active: row.active,
                camp_partition: 0,
                visitors: Default::default(),
            }),
            row.footprint.center(),
        );
        debug!(?table, id = %row.id, "region loaded");
        self.add_entity(entity, false);
        self.loader.record_loaded(1);
    }

    fn check_load_complete(&mut self) {
        if !self.loader.try_complete() {
            return;
        }
        self.state = ZoneState::Running;
        info!(
            zone_id = self.config.zone_id,
            objects = self.loader.observed(),
            "zone load complete, starting steady-state timers"
        );
        let now = self.now_ms;
        let c = &self.config;
        self.scheduler
            .schedule_repeating(SubsystemTask::DisconnectSweep, now + c.disconnect_sweep_ms, c.disconnect_sweep_ms);
        self.scheduler
            .schedule_repeating(SubsystemTask::RegionUpdate, now + c.region_update_ms, c.region_update_ms);
        self.scheduler
            .schedule_repeating(SubsystemTask::CraftTools, now + c.craft_tool_ms, c.craft_tool_ms);
        self.scheduler
            .schedule_repeating(SubsystemTask::CorpseDecay, now + c.corpse_sweep_ms, c.corpse_sweep_ms);
        self.scheduler
            .schedule_repeating(SubsystemTask::GalacticTime, now + c.time_update_ms, c.time_update_ms);
        self.scheduler.schedule_repeating(
            SubsystemTask::TierPoll(Tier::Dormant),
            now + c.tier_dormant_ms,
            c.tier_dormant_ms,
        );
        self.scheduler.schedule_repeating(
            SubsystemTask::TierPoll(Tier::Ready),
            now + c.tier_ready_ms,
            c.tier_ready_ms,
        );
        self.scheduler.schedule_repeating(
            SubsystemTask::TierPoll(Tier::Active),
            now + c.tier_active_ms,
            c.tier_active_ms,
        );
        for script in self.lookup(LookupTable::WorldScripts).to_vec() {
            debug!(%script, "world script starting");
        }
        self.hooks.on_zone_ready();
    }

    // ── Entity lifecycle ────────────────────────────────────────────────────

    /// Register an entity. With `manual` set, only the registry is touched;
    /// the caller wires containment, spatial state, and visibility itself.
    /// A duplicate id is ignored either way.
    pub fn add_entity(&mut self, mut entity: Entity, manual: bool) -> EntityId {
        let id = entity.id;
        let requested_parent = entity.container;
        if !manual {
            entity.container = EntityId::INVALID;
            entity.partition = 0;
        }
        if !self.registry.insert(entity) {
            return id;
        }
        if manual {
            return id;
        }

        if requested_parent.is_valid() {
            self.containers.attach(&mut self.registry, id, requested_parent);
        }
        let contained = self.registry.get(id).is_some_and(Entity::is_contained);
        if !contained {
            self.register_spatial(id);
        }

        match self.registry.get(id).map(Entity::kind) {
            Some(EntityKind::Player) => {
                if let Some(account_id) =
                    self.registry.get(id).and_then(|e| e.as_player()).map(|p| p.account_id)
                {
                    self.players_by_account.insert(account_id, id);
                }
                self.init_visibility(id);
                self.hooks.on_player_entered(id);
            }
            Some(EntityKind::Creature) => {
                if let Some(tier) = self.registry.get(id).and_then(|e| e.as_creature()).map(|c| c.tier)
                {
                    self.tiers.insert(id, tier, self.now_ms);
                }
                self.init_visibility(id);
            }
            Some(EntityKind::Region) | None => {}
            Some(_) => self.init_visibility(id),
        }
        id
    }

    fn register_spatial(&mut self, id: EntityId) {
        let Some(e) = self.registry.get(id) else { return };
        let position = e.position;
        match e.kind() {
            EntityKind::Building => {
                if let Some(b) = e.as_building() {
                    let footprint = b.footprint;
                    self.spatial.insert_footprint(id, footprint);
                }
            }
            EntityKind::Region => {
                if let Some(r) = e.as_region() {
                    let footprint = r.footprint;
                    self.spatial.insert_footprint(id, footprint);
                }
            }
            EntityKind::Player | EntityKind::Creature => {
                let partition = self.spatial.partition_at(position);
                if let Some(e) = self.registry.get_mut(id) {
                    e.partition = partition;
                }
                self.spatial.insert(id, position, partition);
            }
            EntityKind::Item | EntityKind::Cell | EntityKind::Static => {
                self.spatial.insert(id, position, 0);
            }
        }
    }

    fn init_visibility(&mut self, id: EntityId) {
        visibility::init_objects_in_range(
            &mut self.registry,
            &self.containers,
            &self.spatial,
            self.proto.as_ref(),
            id,
            self.config.view_range,
        );
    }

    /// Spawn an NPC with its inventory under a pair of consecutive ephemeral
    /// ids. Returns `None` when the id pool is exhausted.
    pub fn spawn_npc(&mut self, data: CreatureData, position: Vec3) -> Option<EntityId> {
        let (npc_id, inventory_id) = self.ids.allocate_pair();
        if !npc_id.is_valid() {
            return None;
        }
        self.add_entity(Entity::new(npc_id, EntityData::Creature(data), position), false);
        let mut inventory = Entity::new(
            inventory_id,
            EntityData::Item {
                private_owner: EntityId::INVALID,
                craft_station: false,
            },
            position,
        );
        inventory.container = npc_id;
        self.add_entity(inventory, false);
        Some(npc_id)
    }

    /// Remove an entity and unwind every subsystem reference to it.
    /// Contained children go first. Safe to call with a stale id.
    pub fn destroy_entity(&mut self, id: EntityId) -> bool {
        let Some(kind) = self.registry.get(id).map(Entity::kind) else {
            return false;
        };
        for child in self.containers.descendants(id) {
            self.destroy_entity(child);
        }
        match kind {
            EntityKind::Player => self.teardown_player(id),
            EntityKind::Creature => self.teardown_creature(id),
            EntityKind::Item => {
                self.busy_craft_tools.remove(&id);
            }
            EntityKind::Building => {
                self.spatial.remove_footprint(id);
            }
            EntityKind::Region => {
                if let Some(partition) =
                    self.registry.get(id).and_then(|e| e.as_region()).map(|r| r.camp_partition)
                {
                    if partition != 0 {
                        self.spatial.retire_camp(partition);
                    }
                }
                self.spatial.remove_footprint(id);
            }
            EntityKind::Cell | EntityKind::Static => {}
        }

        visibility::destroy_known(&mut self.registry, self.proto.as_ref(), id);
        self.containers.detach(&mut self.registry, id);
        if let Some(e) = self.registry.get(id) {
            self.spatial.remove(id, e.partition);
        }
        self.registry.remove(id);
        if id.is_ephemeral() {
            self.ids.release(id);
        }
        debug!(%id, ?kind, "entity destroyed");
        true
    }

    fn teardown_player(&mut self, id: EntityId) {
        let Some(player) = self.registry.get_mut(id).and_then(Entity::as_player_mut) else {
            return;
        };
        player.connection = ConnectionState::Destroying;
        player.crafting_session = false;
        player.in_combat = false;
        let account_id = player.account_id;
        let duels = std::mem::take(&mut player.duel_list);
        let defenders = std::mem::take(&mut player.defender_list);
        let posture = player.posture;
        let group_id = player.group_id;

        // Both directions of every duel and defender link.
        for other in duels {
            if let Some(p) = self.registry.get_mut(other).and_then(Entity::as_player_mut) {
                p.duel_list.retain(|d| *d != id);
            }
        }
        for defender in defenders {
            if let Some(c) = self.registry.get_mut(defender).and_then(Entity::as_creature_mut) {
                if c.combat_target == id {
                    c.combat_target = EntityId::INVALID;
                    c.events.push(CreatureEvent::TargetLost);
                }
            }
        }
        let other_players: Vec<EntityId> = self.registry.player_ids().collect();
        for other in other_players {
            if other == id {
                continue;
            }
            if let Some(p) = self.registry.get_mut(other).and_then(Entity::as_player_mut) {
                p.defender_list.retain(|d| *d != id);
            }
        }

        if group_id != 0 {
            debug!(%id, group_id, "player leaving group");
        }

        // A player going down saves at the nearest cloning facility so the
        // next login puts them there.
        if matches!(posture, Posture::Dead | Posture::Incapacitated) {
            let save_position = self
                .nearest_cloning_facility(id)
                .unwrap_or_else(|| self.registry.get(id).map(|e| e.position).unwrap_or_default());
            self.persist.dispatch(Query::SavePlayer(PlayerSave {
                id,
                zone_id: self.config.zone_id,
                position: save_position,
                heading: 0.0,
            }));
        }

        self.players_by_account.remove(&account_id);
        self.disconnected.remove(&id);
        self.hooks.on_player_left(id);
    }

    fn teardown_creature(&mut self, id: EntityId) {
        if let Some(task) = self.regen_tasks.remove(&id) {
            self.scheduler.cancel(task);
        }
        self.tiers.remove(id);
        self.corpse_decay.remove(&id);
    }

    fn nearest_cloning_facility(&self, id: EntityId) -> Option<Vec3> {
        let position = self.registry.get(id)?.position;
        self.registry
            .iter()
            .filter_map(|e| {
                e.as_building()
                    .filter(|b| b.cloning_facility)
                    .map(|_| e.position)
            })
            .min_by(|a, b| {
                zone_core::distance_2d(position, *a).total_cmp(&zone_core::distance_2d(position, *b))
            })
    }

    // ── Movement ────────────────────────────────────────────────────────────

    /// Relocate an entity anywhere in the zone: tear down its entire known
    /// set, detach it from container and spatial state, reposition, and
    /// recompute awareness from scratch.
    pub fn warp(&mut self, id: EntityId, position: Vec3) {
        if !self.registry.contains(id) {
            return;
        }
        visibility::destroy_known(&mut self.registry, self.proto.as_ref(), id);
        self.containers.detach(&mut self.registry, id);
        if let Some(e) = self.registry.get(id) {
            self.spatial.remove(id, e.partition);
        }
        if let Some(e) = self.registry.get_mut(id) {
            e.position = position;
            e.partition = 0;
        }
        self.register_spatial(id);
        self.init_visibility(id);
    }

    // ── Connection lifecycle ────────────────────────────────────────────────

    /// Mark a player link-dead and start its removal countdown.
    pub fn add_disconnected_player(&mut self, id: EntityId) {
        let Some(p) = self.registry.get_mut(id).and_then(Entity::as_player_mut) else {
            return;
        };
        p.connection = ConnectionState::LinkDead;
        let deadline = self.now_ms + self.config.disconnect_timeout_ms;
        self.disconnected.insert(id, deadline);
        info!(%id, deadline, "player link-dead");
    }

    /// Reconnect a link-dead player and refresh its awareness.
    pub fn add_reconnected_player(&mut self, id: EntityId) {
        let Some(p) = self.registry.get_mut(id).and_then(Entity::as_player_mut) else {
            return;
        };
        p.connection = ConnectionState::Connected;
        self.disconnected.remove(&id);
        visibility::destroy_known(&mut self.registry, self.proto.as_ref(), id);
        self.init_visibility(id);
        info!(%id, "player reconnected");
    }

    fn sweep_disconnected(&mut self) {
        let due: Vec<EntityId> = self
            .disconnected
            .iter()
            .filter(|(_, deadline)| **deadline <= self.now_ms)
            .map(|(id, _)| *id)
            .collect();
        for id in due {
            // Save must land before the entity goes away.
            let save = self.registry.get(id).map(|e| PlayerSave {
                id,
                zone_id: self.config.zone_id,
                position: e.position,
                heading: e.heading,
            });
            if let Some(save) = save {
                if let Err(e) = self.persist.execute_sync(Query::SavePlayer(save)) {
                    error!(%id, %e, "final save failed for timed-out player");
                }
            }
            info!(%id, "link-dead player timed out");
            self.destroy_entity(id);
        }
    }

    // ── Regions & camps ─────────────────────────────────────────────────────

    /// Spawn a camp: a partition plus an active region entity tied to it.
    pub fn spawn_camp(&mut self, footprint: Rect) -> Option<EntityId> {
        let id = self.ids.allocate();
        if !id.is_valid() {
            return None;
        }
        let partition = self.spatial.spawn_camp(footprint);
        let entity = Entity::new(
            id,
            EntityData::Region(RegionData {
                footprint,
                active: true,
                camp_partition: partition,
                visitors: Default::default(),
            }),
            footprint.center(),
        );
        self.add_entity(entity, false);
        Some(id)
    }

    fn handle_region_update(&mut self) {
        // Retired camp partitions die here and only here; entities still in
        // their local index re-home into the static grid.
        for orphan in self.spatial.flush_retired() {
            if let Some(e) = self.registry.get_mut(orphan) {
                let position = e.position;
                let partition = self.spatial.partition_at(position);
                e.partition = partition;
                self.spatial.insert(orphan, position, partition);
            }
        }

        let region_ids: Vec<EntityId> = self
            .registry
            .iter()
            .filter(|e| e.as_region().is_some_and(|r| r.active))
            .map(|e| e.id)
            .collect();
        for region_id in region_ids {
            let Some(footprint) = self.registry.get(region_id).and_then(|e| e.as_region()).map(|r| r.footprint)
            else {
                continue;
            };
            let inside: std::collections::BTreeSet<EntityId> = self
                .registry
                .iter()
                .filter(|e| {
                    e.kind() == EntityKind::Player
                        && !e.is_contained()
                        && footprint.contains(e.position)
                })
                .map(|e| e.id)
                .collect();
            let Some(region) = self.registry.get_mut(region_id).and_then(Entity::as_region_mut)
            else {
                continue;
            };
            for entered in inside.difference(&region.visitors) {
                debug!(player = %entered, region = %region_id, "player entered region");
            }
            for left in region.visitors.difference(&inside) {
                debug!(player = %left, region = %region_id, "player left region");
            }
            region.visitors = inside;
        }
    }

    // ── Crafting ────────────────────────────────────────────────────────────

    /// Mark a crafting station busy for `duration_ms`.
    pub fn start_craft(&mut self, tool: EntityId, duration_ms: u64) {
        if self.registry.contains(tool) {
            self.busy_craft_tools.insert(tool, self.now_ms + duration_ms);
        }
    }

    #[must_use]
    pub fn craft_tool_busy(&self, tool: EntityId) -> bool {
        self.busy_craft_tools.contains_key(&tool)
    }

    fn handle_craft_tools(&mut self) {
        let done: Vec<EntityId> = self
            .busy_craft_tools
            .iter()
            .filter(|(_, at)| **at <= self.now_ms)
            .map(|(id, _)| *id)
            .collect();
        for tool in done {
            self.busy_craft_tools.remove(&tool);
            info!(%tool, "craft tool finished");
        }
    }

    // ── Death & decay ───────────────────────────────────────────────────────

    /// Kill a creature: stop its behavior and leave a decaying corpse.
    pub fn kill_creature(&mut self, id: EntityId) {
        let Some(c) = self.registry.get_mut(id).and_then(Entity::as_creature_mut) else {
            return;
        };
        c.health = 0;
        c.combat_target = EntityId::INVALID;
        self.tiers.remove(id);
        if let Some(task) = self.regen_tasks.remove(&id) {
            self.scheduler.cancel(task);
        }
        let decay = self.config.corpse_decay_ms;
        self.schedule_corpse_decay(id, decay);
    }

    /// Schedule (or tighten) a corpse's decay deadline. An earlier existing
    /// deadline wins, so looting interactions can never extend a corpse.
    pub fn schedule_corpse_decay(&mut self, id: EntityId, delay_ms: u64) {
        let deadline = self.now_ms + delay_ms;
        self.corpse_decay
            .entry(id)
            .and_modify(|d| *d = (*d).min(deadline))
            .or_insert(deadline);
    }

    fn handle_corpse_decay(&mut self) {
        let due: Vec<EntityId> = self
            .corpse_decay
            .iter()
            .filter(|(_, deadline)| **deadline <= self.now_ms)
            .map(|(id, _)| *id)
            .collect();
        for id in due {
            self.corpse_decay.remove(&id);
            self.destroy_entity(id);
        }
    }

    // ── Regeneration ────────────────────────────────────────────────────────

    /// Start a repeating regeneration pulse for a creature, if none runs.
    pub fn start_regen(&mut self, id: EntityId) {
        if self.regen_tasks.contains_key(&id) {
            return;
        }
        let task = self.scheduler.schedule_repeating(
            SubsystemTask::Regen(id),
            self.now_ms + self.config.regen_ms,
            self.config.regen_ms,
        );
        self.regen_tasks.insert(id, task);
    }

    fn handle_regen(&mut self, id: EntityId) {
        let healed = match self.registry.get_mut(id).and_then(Entity::as_creature_mut) {
            Some(c) if c.health > 0 => {
                c.health = (c.health + c.max_health / 10).min(c.max_health);
                c.health == c.max_health
            }
            _ => true,
        };
        if healed {
            if let Some(task) = self.regen_tasks.remove(&id) {
                self.scheduler.cancel(task);
            }
        }
    }

    // ── NPC tier polling ────────────────────────────────────────────────────

    fn handle_tier_poll(&mut self, tier: Tier) {
        for (id, overdue) in self.tiers.take_due(tier, self.now_ms) {
            // A creature that already migrated here this tick waits for
            // this tier's next pass; put its entry back untouched.
            if self.migrated.contains(&id) {
                self.tiers.insert(id, tier, self.now_ms - overdue);
                continue;
            }
            let outcome = {
                let mut ctx = BehaviorCtx {
                    registry: &mut self.registry,
                    containers: &self.containers,
                    spatial: &mut self.spatial,
                    sink: self.proto.as_ref(),
                    combat: self.combat.as_ref(),
                    config: &self.config,
                    rng: &mut self.rng,
                };
                behavior::run(&mut ctx, id, overdue)
            };
            match outcome {
                // Dead or vanished: already out of the map, stays out.
                None => {}
                Some(o) if o.tier == tier => {
                    if o.wait_ms > 0 {
                        self.tiers.insert(id, tier, self.now_ms + o.wait_ms);
                    }
                }
                Some(o) => {
                    // Migration: due now, picked up on the destination
                    // tier's next pass.
                    self.tiers.insert(id, o.tier, self.now_ms);
                    self.migrated.insert(id);
                    if tier == Tier::Active {
                        self.start_regen(id);
                    }
                }
            }
        }
    }

    /// Deliver an event to a creature and make its tier poll it promptly.
    pub fn notify_creature(&mut self, id: EntityId, event: CreatureEvent) {
        let Some(c) = self.registry.get_mut(id).and_then(Entity::as_creature_mut) else {
            return;
        };
        c.events.push(event);
        self.tiers.force_poll(id);
    }

    // ── Broadcast & shutdown ────────────────────────────────────────────────

    /// Zone-wide system message.
    pub fn zone_message(&self, text: &str) {
        self.proto.broadcast(text);
    }

    /// Synchronously save every player and stop scheduling work.
    pub fn shutdown(&mut self) {
        self.state = ZoneState::ShuttingDown;
        let players: Vec<PlayerSave> = self
            .registry
            .iter()
            .filter(|e| e.kind() == EntityKind::Player)
            .map(|e| PlayerSave {
                id: e.id,
                zone_id: self.config.zone_id,
                position: e.position,
                heading: e.heading,
            })
            .collect();
        for save in players {
            let id = save.id;
            if let Err(e) = self.persist.execute_sync(Query::SavePlayer(save)) {
                error!(%id, %e, "shutdown save failed");
            }
        }
        info!(zone_id = self.config.zone_id, "zone shut down");
    }

    #[must_use]
    pub fn disconnected_count(&self) -> usize {
        self.disconnected.len()
    }

    #[must_use]
    pub fn corpse_decay_deadline(&self, id: EntityId) -> Option<u64> {
        self.corpse_decay.get(&id).copied()
    }
}

impl std::fmt::Debug for Zone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Zone")
            .field("state", &self.state)
            .field("now_ms", &self.now_ms)
            .field("entities", &self.registry.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests;
