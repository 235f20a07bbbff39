//! The live-world simulation core of a zone server.
//!
//! A [`Zone`](zone::Zone) owns every mutable piece of one world partition:
//! the entity registry, container hierarchy, spatial index, visibility state,
//! timer queue, NPC tier scheduler, and the load coordinator that drives
//! bootstrap. All of it is mutated from a single tick thread; persistence
//! work runs elsewhere and re-enters through a completion channel drained at
//! the top of each tick.

pub mod behavior;
pub mod config;
pub mod container;
pub mod error;
pub mod hooks;
pub mod loader;
pub mod registry;
pub mod spatial;
pub mod tiers;
pub mod timer;
pub mod visibility;
pub mod zone;

pub use config::WorldConfig;
pub use error::WorldError;
pub use hooks::{CombatResolver, NullCombat, NullHooks, ScriptHooks};
pub use loader::ZoneState;
pub use timer::TaskId;
pub use zone::{SubsystemTask, Zone};
