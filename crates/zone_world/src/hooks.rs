//! Collaborator seams for scripting and combat.
//!
//! The world core fires lifecycle events into [`ScriptHooks`] and delegates
//! attack resolution to [`CombatResolver`]; neither trait exposes world
//! internals beyond ids and snapshots, so the collaborators cannot reach
//! around the registry.

use std::cell::RefCell;
use zone_core::{Entity, EntityId};

/// Lifecycle events the scripting layer can react to.
pub trait ScriptHooks {
    /// A player finished entering the zone.
    fn on_player_entered(&self, _player: EntityId) {}

    /// A player is leaving the zone (teardown has not happened yet).
    fn on_player_left(&self, _player: EntityId) {}

    /// Bootstrap finished and the zone is running.
    fn on_zone_ready(&self) {}
}

/// Resolves one attack swing. Returns the damage to apply to the defender.
pub trait CombatResolver {
    fn resolve_attack(&self, attacker: &Entity, defender: &Entity) -> u32;
}

/// No-op scripting layer.
#[derive(Debug, Default)]
pub struct NullHooks;

impl ScriptHooks for NullHooks {}

/// Combat resolver that never lands a hit.
#[derive(Debug, Default)]
pub struct NullCombat;

impl CombatResolver for NullCombat {
    fn resolve_attack(&self, _: &Entity, _: &Entity) -> u32 {
        0
    }
}

/// Records hook invocations, for tests.
#[derive(Debug, Default)]
pub struct RecordingHooks {
    events: RefCell<Vec<String>>,
}

impl RecordingHooks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn events(&self) -> Vec<String> {
        self.events.borrow().clone()
    }
}

impl ScriptHooks for RecordingHooks {
    fn on_player_entered(&self, player: EntityId) {
        self.events.borrow_mut().push(format!("entered:{player}"));
    }

    fn on_player_left(&self, player: EntityId) {
        self.events.borrow_mut().push(format!("left:{player}"));
    }

    fn on_zone_ready(&self) {
        self.events.borrow_mut().push("ready".to_owned());
    }
}

/// Deals a fixed amount per swing, for tests.
#[derive(Debug)]
pub struct FixedCombat(pub u32);

impl CombatResolver for FixedCombat {
    fn resolve_attack(&self, _: &Entity, _: &Entity) -> u32 {
        self.0
    }
}
