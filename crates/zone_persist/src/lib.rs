//! Persistence boundary of the zone simulation.
//!
//! The world core describes what it wants as typed [`Query`] values and gets
//! typed [`QueryResult`]s back. Execution happens on a tokio worker through
//! [`PersistHandle`]; completions return over a channel the tick thread
//! drains, so all world mutation stays on one thread.

pub mod backend;
pub mod dispatch;
pub mod error;
pub mod query;

pub use backend::{FixtureBackend, QueryBackend};
pub use dispatch::{Completion, PersistHandle};
pub use error::PersistError;
pub use query::{
    BuildingRow, LookupTable, ObjectRow, PlayerSave, Query, QueryResult, RegionRow, RegionTable,
};
