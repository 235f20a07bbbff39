//! Parent/child containment.
//!
//! A contained entity (an item in a cell, a cell in a building) is reached
//! through its parent and never appears in a spatial index. Attaching to a
//! parent that does not exist logs and leaves the child orphaned at world
//! level; nothing in here panics on bad references.

use crate::registry::Registry;
use std::collections::{BTreeSet, HashMap};
use tracing::warn;
use zone_core::EntityId;

#[derive(Debug, Default)]
pub struct ContainerIndex {
    children: HashMap<EntityId, BTreeSet<EntityId>>,
}

impl ContainerIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach `child` to `parent`. Reparenting detaches first. A missing
    /// parent orphans the child at world level.
    pub fn attach(&mut self, registry: &mut Registry, child: EntityId, parent: EntityId) {
        if !registry.contains(child) {
            return;
        }
        self.detach(registry, child);
        if !registry.contains(parent) {
            warn!(%child, %parent, "container missing, leaving entity at world level");
            return;
        }
        self.children.entry(parent).or_default().insert(child);
        if let Some(e) = registry.get_mut(child) {
            debug_assert_eq!(e.partition, 0, "contained entity still spatially indexed");
            e.container = parent;
        }
    }

    /// Detach `child` from its current parent, if any.
    pub fn detach(&mut self, registry: &mut Registry, child: EntityId) {
        let Some(parent) = registry.get(child).map(|e| e.container) else {
            return;
        };
        if !parent.is_valid() {
            return;
        }
        if let Some(set) = self.children.get_mut(&parent) {
            set.remove(&child);
            if set.is_empty() {
                self.children.remove(&parent);
            }
        }
        if let Some(e) = registry.get_mut(child) {
            e.container = EntityId::INVALID;
        }
    }

    /// Direct children of `parent`.
    #[must_use]
    pub fn children(&self, parent: EntityId) -> Vec<EntityId> {
        self.children
            .get(&parent)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Every entity contained under `root`, transitively.
    #[must_use]
    pub fn descendants(&self, root: EntityId) -> Vec<EntityId> {
        let mut out = Vec::new();
        let mut stack = self.children(root);
        while let Some(id) = stack.pop() {
            stack.extend(self.children(id));
            out.push(id);
        }
        out
    }
}
