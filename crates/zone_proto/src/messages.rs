//! Notification payloads handed to the session layer.
//!
//! All types derive `Serialize` and `Deserialize` so the session layer can
//! encode them for whatever wire format it speaks; the world core only
//! constructs them.

use glam::Vec3;
use serde::{Deserialize, Serialize};
use zone_core::{EntityId, EntityKind};

// ── Visibility ──────────────────────────────────────────────────────────────

/// Tells a viewer that an entity has entered its awareness.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityCreate {
    /// The player (or observing entity) this notification is addressed to.
    pub viewer: EntityId,
    /// The entity that became visible.
    pub subject: EntityId,
    pub kind: EntityKind,
    pub position: Vec3,
}

/// Tells a viewer that an entity has left its awareness.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityDestroy {
    pub viewer: EntityId,
    pub subject: EntityId,
}

// ── Broadcasts ──────────────────────────────────────────────────────────────

/// A zone-wide system message delivered to every connected player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneBroadcast {
    pub text: String,
}

/// Periodic galactic-time announcement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerTime {
    pub galactic_time_ms: u64,
}

/// Every notification the world core can emit, for sinks that record or
/// multiplex rather than dispatch immediately.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Notification {
    Create(EntityCreate),
    Destroy(EntityDestroy),
    Broadcast(ZoneBroadcast),
    Time(ServerTime),
}
