//! The outbound notification seam.

use crate::messages::{EntityCreate, EntityDestroy, Notification, ServerTime, ZoneBroadcast};
use glam::Vec3;
use std::cell::RefCell;
use zone_core::{EntityId, EntityKind};

/// Receives the notifications the world core emits.
///
/// Called synchronously from the tick thread; implementations must not block.
pub trait ProtocolSink {
    /// An entity entered `viewer`'s awareness.
    fn entity_create(&self, viewer: EntityId, subject: EntityId, kind: EntityKind, position: Vec3);

    /// An entity left `viewer`'s awareness.
    fn entity_destroy(&self, viewer: EntityId, subject: EntityId);

    /// Zone-wide system message for all connected players.
    fn broadcast(&self, text: &str);

    /// Periodic galactic-time announcement. Most sinks can ignore it.
    fn server_time(&self, _galactic_time_ms: u64) {}
}

/// Discards everything. Useful for headless tools and load runs.
#[derive(Debug, Default)]
pub struct NullSink;

impl ProtocolSink for NullSink {
    fn entity_create(&self, _: EntityId, _: EntityId, _: EntityKind, _: Vec3) {}
    fn entity_destroy(&self, _: EntityId, _: EntityId) {}
    fn broadcast(&self, _: &str) {}
}

/// Records every notification in order. The test double for assertions on
/// what the world emitted.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: RefCell<Vec<Notification>>,
}

impl RecordingSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything recorded so far, in emission order.
    #[must_use]
    pub fn events(&self) -> Vec<Notification> {
        self.events.borrow().clone()
    }

    /// Create notifications addressed to `viewer`.
    #[must_use]
    pub fn creates_for(&self, viewer: EntityId) -> Vec<EntityId> {
        self.events
            .borrow()
            .iter()
            .filter_map(|n| match n {
                Notification::Create(c) if c.viewer == viewer => Some(c.subject),
                _ => None,
            })
            .collect()
    }

    /// Destroy notifications addressed to `viewer`.
    #[must_use]
    pub fn destroys_for(&self, viewer: EntityId) -> Vec<EntityId> {
        self.events
            .borrow()
            .iter()
            .filter_map(|n| match n {
                Notification::Destroy(d) if d.viewer == viewer => Some(d.subject),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }
}

impl ProtocolSink for RecordingSink {
    fn entity_create(&self, viewer: EntityId, subject: EntityId, kind: EntityKind, position: Vec3) {
        self.events
            .borrow_mut()
            .push(Notification::Create(EntityCreate {
                viewer,
                subject,
                kind,
                position,
            }));
    }

    fn entity_destroy(&self, viewer: EntityId, subject: EntityId) {
        self.events
            .borrow_mut()
            .push(Notification::Destroy(EntityDestroy { viewer, subject }));
    }

    fn broadcast(&self, text: &str) {
        self.events
            .borrow_mut()
            .push(Notification::Broadcast(ZoneBroadcast {
                text: text.to_owned(),
            }));
    }

    fn server_time(&self, galactic_time_ms: u64) {
        self.events
            .borrow_mut()
            .push(Notification::Time(ServerTime { galactic_time_ms }));
    }
}
