//! Symmetric known-object maintenance.
//!
//! Awareness is a pair property: `a` knows `b` iff `b` knows `a`, and every
//! mutation here touches both sides in the same call. Client notifications go
//! to whichever sides of a pair are players.

use crate::container::ContainerIndex;
use crate::registry::Registry;
use crate::spatial::SpatialIndex;
use zone_core::{distance_2d, Entity, EntityData, EntityId, EntityKind};
use zone_proto::ProtocolSink;

/// Whether two entities can be aware of each other at all, regardless of
/// distance: both at world level, or under the same top-level structure.
/// One inside and one outside are never in range of each other.
#[must_use]
pub fn containment_compatible(registry: &Registry, a: EntityId, b: EntityId) -> bool {
    let (Some(ea), Some(eb)) = (registry.get(a), registry.get(b)) else {
        return false;
    };
    if !ea.is_contained() && !eb.is_contained() {
        return true;
    }
    registry.top_level(a) == registry.top_level(b)
}

/// Full in-range check: containment compatibility plus 2D distance. The
/// distance gate applies to every pair, contained or not.
#[must_use]
pub fn objects_in_range(registry: &Registry, a: EntityId, b: EntityId, radius: f32) -> bool {
    if !containment_compatible(registry, a, b) {
        return false;
    }
    let (Some(ea), Some(eb)) = (registry.get(a), registry.get(b)) else {
        return false;
    };
    distance_2d(ea.position, eb.position) <= radius
}

/// Privacy rule: a privately owned item is visible only to its owner.
fn visible_to(registry: &Registry, viewer: EntityId, subject: EntityId) -> bool {
    match registry.get(subject).map(|e| &e.data) {
        Some(EntityData::Item { private_owner, .. }) if private_owner.is_valid() => {
            *private_owner == viewer
        }
        Some(_) => true,
        None => false,
    }
}

fn notify_create(registry: &Registry, sink: &dyn ProtocolSink, viewer: EntityId, subject: EntityId) {
    let Some(v) = registry.get(viewer) else { return };
    if v.kind() != EntityKind::Player {
        return;
    }
    if let Some(s) = registry.get(subject) {
        sink.entity_create(viewer, subject, s.kind(), s.position);
    }
}

fn notify_destroy(registry: &Registry, sink: &dyn ProtocolSink, viewer: EntityId, subject: EntityId) {
    if registry.get(viewer).is_some_and(|v| v.kind() == EntityKind::Player) {
        sink.entity_destroy(viewer, subject);
    }
}

/// Make `a` and `b` known to each other. Both known sets are updated before
/// any notification goes out; a pair that already knows each other is left
/// alone.
pub fn add_known_pair(
    registry: &mut Registry,
    sink: &dyn ProtocolSink,
    a: EntityId,
    b: EntityId,
) {
    if a == b || !registry.contains(a) || !registry.contains(b) {
        return;
    }
    let fresh = registry
        .get_mut(a)
        .map(|e| e.known.insert(b))
        .unwrap_or(false);
    if let Some(e) = registry.get_mut(b) {
        e.known.insert(a);
    }
    if fresh {
        notify_create(registry, sink, a, b);
        notify_create(registry, sink, b, a);
    }
}

/// Remove mutual awareness between `a` and `b`.
pub fn remove_known_pair(
    registry: &mut Registry,
    sink: &dyn ProtocolSink,
    a: EntityId,
    b: EntityId,
) {
    let was_known = registry
        .get_mut(a)
        .map(|e| e.known.remove(&b))
        .unwrap_or(false);
    if let Some(e) = registry.get_mut(b) {
        e.known.remove(&a);
    }
    if was_known {
        notify_destroy(registry, sink, a, b);
        notify_destroy(registry, sink, b, a);
    }
}

/// Tear down everything `id` knows, symmetrically. Called before movement
/// recompute and during destroy.
pub fn destroy_known(registry: &mut Registry, sink: &dyn ProtocolSink, id: EntityId) {
    let known: Vec<EntityId> = registry
        .get(id)
        .map(|e| e.known.iter().copied().collect())
        .unwrap_or_default();
    for other in known {
        remove_known_pair(registry, sink, id, other);
    }
}

/// Recompute `viewer`'s awareness from scratch: union of the global index,
/// the viewer's partition-local index, and (when the viewer is contained)
/// everything under the same structure. Each accepted pair becomes mutually
/// known in one step.
pub fn init_objects_in_range(
    registry: &mut Registry,
    containers: &ContainerIndex,
    spatial: &SpatialIndex,
    sink: &dyn ProtocolSink,
    viewer: EntityId,
    view_range: f32,
) {
    let Some(v) = registry.get(viewer) else { return };
    let position = v.position;
    let partition = v.partition;
    let contained = v.is_contained();

    let mut candidates = spatial.query_global(position, view_range);
    if partition != 0 {
        candidates.extend(spatial.query_partition(partition, position, view_range));
    }
    if contained {
        let root = registry.top_level(viewer);
        candidates.push(root);
        candidates.extend(containers.descendants(root));
    }

    for subject in candidates {
        if subject == viewer {
            continue;
        }
        if registry.get(subject).map(Entity::kind) == Some(EntityKind::Region) {
            continue;
        }
        if !objects_in_range(registry, viewer, subject, view_range) {
            continue;
        }
        if !visible_to(registry, viewer, subject) || !visible_to(registry, subject, viewer) {
            continue;
        }
        add_known_pair(registry, sink, viewer, subject);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use zone_core::{EntityData, PlayerData, Rect};
    use zone_proto::RecordingSink;

    fn player(id: u64, pos: Vec3) -> Entity {
        Entity::new(
            EntityId(id),
            EntityData::Player(PlayerData::new(id as u32)),
            pos,
        )
    }

    struct Fixture {
        registry: Registry,
        containers: ContainerIndex,
        spatial: SpatialIndex,
        sink: RecordingSink,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                registry: Registry::new(),
                containers: ContainerIndex::new(),
                spatial: SpatialIndex::new(Rect::new(-512.0, -512.0, 1024.0, 1024.0), 4),
                sink: RecordingSink::new(),
            }
        }

        fn spawn_player(&mut self, id: u64, pos: Vec3) {
            let mut e = player(id, pos);
            e.partition = self.spatial.partition_at(pos);
            let partition = e.partition;
            self.registry.insert(e);
            self.spatial.insert(EntityId(id), pos, partition);
        }
    }

    #[test]
    fn test_uncontained_pair_in_range() {
        let mut f = Fixture::new();
        f.spawn_player(1, Vec3::ZERO);
        f.spawn_player(2, Vec3::new(10.0, 0.0, 0.0));
        assert!(objects_in_range(&f.registry, EntityId(1), EntityId(2), 50.0));
        assert!(!objects_in_range(&f.registry, EntityId(1), EntityId(2), 5.0));
    }

    #[test]
    fn test_different_buildings_never_in_range() {
        let mut f = Fixture::new();
        // Two buildings a unit apart, one occupant each.
        for (bid, cid, pid, x) in [(10, 11, 1, 0.0), (20, 21, 2, 1.0)] {
            f.registry.insert(Entity::new(
                EntityId(bid),
                EntityData::Static,
                Vec3::new(x, 0.0, 0.0),
            ));
            f.registry
                .insert(Entity::new(EntityId(cid), EntityData::Cell, Vec3::ZERO));
            f.containers
                .attach(&mut f.registry, EntityId(cid), EntityId(bid));
            f.registry.insert(player(pid, Vec3::new(x, 0.0, 0.0)));
            f.containers
                .attach(&mut f.registry, EntityId(pid), EntityId(cid));
        }
        assert!(!objects_in_range(&f.registry, EntityId(1), EntityId(2), 50.0));
        // Inside vs outside is also never in range.
        f.spawn_player(3, Vec3::new(0.5, 0.0, 0.0));
        assert!(!objects_in_range(&f.registry, EntityId(1), EntityId(3), 50.0));
        // Same structure keeps the distance check.
        f.registry.insert(player(4, Vec3::new(200.0, 0.0, 0.0)));
        f.containers
            .attach(&mut f.registry, EntityId(4), EntityId(11));
        assert!(!objects_in_range(&f.registry, EntityId(1), EntityId(4), 50.0));
        assert!(objects_in_range(&f.registry, EntityId(1), EntityId(4), 250.0));
    }

    #[test]
    fn test_known_sets_stay_symmetric() {
        let mut f = Fixture::new();
        f.spawn_player(1, Vec3::ZERO);
        f.spawn_player(2, Vec3::new(10.0, 0.0, 0.0));
        add_known_pair(&mut f.registry, &f.sink, EntityId(1), EntityId(2));
        assert!(f.registry.get(EntityId(1)).unwrap().known.contains(&EntityId(2)));
        assert!(f.registry.get(EntityId(2)).unwrap().known.contains(&EntityId(1)));
        destroy_known(&mut f.registry, &f.sink, EntityId(1));
        assert!(f.registry.get(EntityId(1)).unwrap().known.is_empty());
        assert!(f.registry.get(EntityId(2)).unwrap().known.is_empty());
    }

    #[test]
    fn test_init_notifies_both_players() {
        let mut f = Fixture::new();
        f.spawn_player(1, Vec3::ZERO);
        f.spawn_player(2, Vec3::new(10.0, 0.0, 0.0));
        init_objects_in_range(
            &mut f.registry,
            &f.containers,
            &f.spatial,
            &f.sink,
            EntityId(1),
            50.0,
        );
        assert_eq!(f.sink.creates_for(EntityId(1)), vec![EntityId(2)]);
        assert_eq!(f.sink.creates_for(EntityId(2)), vec![EntityId(1)]);
    }

    #[test]
    fn test_private_item_visible_only_to_owner() {
        let mut f = Fixture::new();
        f.spawn_player(1, Vec3::ZERO);
        f.spawn_player(2, Vec3::new(5.0, 0.0, 0.0));
        let item = Entity::new(
            EntityId(30),
            EntityData::Item {
                private_owner: EntityId(1),
                craft_station: false,
            },
            Vec3::new(2.0, 0.0, 0.0),
        );
        f.registry.insert(item);
        f.spatial.insert(EntityId(30), Vec3::new(2.0, 0.0, 0.0), 0);
        init_objects_in_range(
            &mut f.registry,
            &f.containers,
            &f.spatial,
            &f.sink,
            EntityId(1),
            50.0,
        );
        init_objects_in_range(
            &mut f.registry,
            &f.containers,
            &f.spatial,
            &f.sink,
            EntityId(2),
            50.0,
        );
        assert!(f.registry.get(EntityId(1)).unwrap().known.contains(&EntityId(30)));
        assert!(!f.registry.get(EntityId(2)).unwrap().known.contains(&EntityId(30)));
    }

    #[test]
    fn test_duplicate_add_emits_no_second_create() {
        let mut f = Fixture::new();
        f.spawn_player(1, Vec3::ZERO);
        f.spawn_player(2, Vec3::new(10.0, 0.0, 0.0));
        add_known_pair(&mut f.registry, &f.sink, EntityId(1), EntityId(2));
        add_known_pair(&mut f.registry, &f.sink, EntityId(1), EntityId(2));
        assert_eq!(f.sink.creates_for(EntityId(1)).len(), 1);
    }
}
