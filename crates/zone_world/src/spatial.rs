//! Spatial indexing: zone partitions, point lookups, footprints.
//!
//! The zone is carved into a static grid of partitions at startup; camps
//! spawn additional partitions at runtime. Uncontained mobile entities live
//! in the point map of the partition they stand in, everything else
//! uncontained lives in the global point map, and buildings/regions register
//! footprint rectangles. Retiring a camp partition never deletes it
//! immediately — ids go on a retired list that is flushed once per
//! region-update tick, so nothing iterating a partition ever sees it vanish
//! mid-pass.

use glam::Vec3;
use std::collections::HashMap;
use zone_core::{distance_2d, EntityId, Rect};

/// One partition's local state.
#[derive(Debug)]
pub struct Partition {
    pub id: u64,
    pub bounds: Rect,
    pub camp: bool,
    points: HashMap<EntityId, Vec3>,
}

#[derive(Debug)]
pub struct SpatialIndex {
    bounds: Rect,
    grid: u32,
    global: HashMap<EntityId, Vec3>,
    footprints: HashMap<EntityId, Rect>,
    partitions: HashMap<u64, Partition>,
    retired: Vec<u64>,
    next_camp: u64,
}

impl SpatialIndex {
    /// Build the static partition grid over `bounds`.
    #[must_use]
    pub fn new(bounds: Rect, grid: u32) -> Self {
        let grid = grid.max(1);
        let mut partitions = HashMap::new();
        let cell_w = bounds.width / grid as f32;
        let cell_h = bounds.height / grid as f32;
        for row in 0..grid {
            for col in 0..grid {
                let id = 1 + u64::from(row * grid + col);
                partitions.insert(
                    id,
                    Partition {
                        id,
                        bounds: Rect::new(
                            bounds.x + col as f32 * cell_w,
                            bounds.z + row as f32 * cell_h,
                            cell_w,
                            cell_h,
                        ),
                        camp: false,
                        points: HashMap::new(),
                    },
                );
            }
        }
        Self {
            bounds,
            grid,
            global: HashMap::new(),
            footprints: HashMap::new(),
            partitions,
            retired: Vec::new(),
            next_camp: 1 + u64::from(grid * grid),
        }
    }

    /// Partition containing `pos`. Camp partitions win over the static grid;
    /// positions outside the zone bounds map to the nearest edge partition.
    #[must_use]
    pub fn partition_at(&self, pos: Vec3) -> u64 {
        for p in self.partitions.values() {
            if p.camp && p.bounds.contains(pos) {
                return p.id;
            }
        }
        let cell_w = self.bounds.width / self.grid as f32;
        let cell_h = self.bounds.height / self.grid as f32;
        let col = (((pos.x - self.bounds.x) / cell_w) as i64).clamp(0, i64::from(self.grid) - 1);
        let row = (((pos.z - self.bounds.z) / cell_h) as i64).clamp(0, i64::from(self.grid) - 1);
        1 + (row as u64) * u64::from(self.grid) + col as u64
    }

    /// Create a camp partition covering `bounds`.
    pub fn spawn_camp(&mut self, bounds: Rect) -> u64 {
        let id = self.next_camp;
        self.next_camp += 1;
        self.partitions.insert(
            id,
            Partition {
                id,
                bounds,
                camp: true,
                points: HashMap::new(),
            },
        );
        id
    }

    /// Mark a camp partition for deletion at the next flush. Static grid
    /// partitions are never retired.
    pub fn retire_camp(&mut self, id: u64) {
        if self.partitions.get(&id).is_some_and(|p| p.camp) {
            self.retired.push(id);
        }
    }

    /// Delete every retired partition. Returns the entities that were still
    /// in their local indices so the caller can re-home them.
    pub fn flush_retired(&mut self) -> Vec<EntityId> {
        let mut orphans = Vec::new();
        for id in std::mem::take(&mut self.retired) {
            if let Some(p) = self.partitions.remove(&id) {
                orphans.extend(p.points.into_keys());
            }
        }
        orphans
    }

    /// Register a point. `partition` 0 means the global map.
    pub fn insert(&mut self, id: EntityId, pos: Vec3, partition: u64) {
        if partition == 0 {
            self.global.insert(id, pos);
        } else if let Some(p) = self.partitions.get_mut(&partition) {
            p.points.insert(id, pos);
        } else {
            // Stale partition id; fall back to the global map.
            self.global.insert(id, pos);
        }
    }

    /// Remove a point from wherever it is registered.
    pub fn remove(&mut self, id: EntityId, partition: u64) {
        if partition != 0 {
            if let Some(p) = self.partitions.get_mut(&partition) {
                if p.points.remove(&id).is_some() {
                    return;
                }
            }
        }
        self.global.remove(&id);
    }

    pub fn insert_footprint(&mut self, id: EntityId, rect: Rect) {
        self.footprints.insert(id, rect);
    }

    pub fn remove_footprint(&mut self, id: EntityId) {
        self.footprints.remove(&id);
    }

    #[must_use]
    pub fn footprint(&self, id: EntityId) -> Option<Rect> {
        self.footprints.get(&id).copied()
    }

    /// Footprint owners whose rectangle contains `pos`.
    #[must_use]
    pub fn footprints_at(&self, pos: Vec3) -> Vec<EntityId> {
        self.footprints
            .iter()
            .filter(|(_, rect)| rect.contains(pos))
            .map(|(id, _)| *id)
            .collect()
    }

    /// Global candidates within `radius` of `center`: points in range plus
    /// footprints the circle touches.
    #[must_use]
    pub fn query_global(&self, center: Vec3, radius: f32) -> Vec<EntityId> {
        let mut out: Vec<EntityId> = self
            .global
            .iter()
            .filter(|(_, pos)| distance_2d(center, **pos) <= radius)
            .map(|(id, _)| *id)
            .collect();
        out.extend(
            self.footprints
                .iter()
                .filter(|(_, rect)| circle_touches(center, radius, **rect))
                .map(|(id, _)| *id),
        );
        out
    }

    /// Candidates in one partition's local index.
    #[must_use]
    pub fn query_partition(&self, partition: u64, center: Vec3, radius: f32) -> Vec<EntityId> {
        let Some(p) = self.partitions.get(&partition) else {
            return Vec::new();
        };
        p.points
            .iter()
            .filter(|(_, pos)| distance_2d(center, **pos) <= radius)
            .map(|(id, _)| *id)
            .collect()
    }

    #[must_use]
    pub fn partition(&self, id: u64) -> Option<&Partition> {
        self.partitions.get(&id)
    }

    #[must_use]
    pub fn partition_count(&self) -> usize {
        self.partitions.len()
    }
}

fn circle_touches(center: Vec3, radius: f32, rect: Rect) -> bool {
    let cx = center.x.clamp(rect.x, rect.x + rect.width);
    let cz = center.z.clamp(rect.z, rect.z + rect.height);
    let dx = center.x - cx;
    let dz = center.z - cz;
    dx * dx + dz * dz <= radius * radius
}
