//! Backend trait and the in-memory fixture store.

use crate::error::PersistError;
use crate::query::{BuildingRow, LookupTable, ObjectRow, PlayerSave, Query, QueryResult, RegionRow, RegionTable};
use std::collections::HashMap;
use std::sync::Mutex;

/// Executes queries against a store. Implementations run off the tick thread
/// and must be safe to call from worker tasks.
pub trait QueryBackend: Send + Sync + 'static {
    fn execute(&self, query: &Query) -> Result<QueryResult, PersistError>;
}

/// In-memory backend serving canned rows. Stands in for the database in
/// tests and headless runs; also records every save it receives.
#[derive(Debug, Default)]
pub struct FixtureBackend {
    pub buildings: Vec<BuildingRow>,
    pub loose_objects: Vec<ObjectRow>,
    pub regions: HashMap<RegionTable, Vec<RegionRow>>,
    pub lookups: HashMap<LookupTable, Vec<String>>,
    saves: Mutex<Vec<PlayerSave>>,
}

impl FixtureBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Entities the count query will report: buildings, their cells, loose
    /// objects, and every region row.
    #[must_use]
    pub fn object_count(&self) -> u64 {
        let building_objects: usize = self
            .buildings
            .iter()
            .map(|b| 1 + b.cells.len())
            .sum();
        let region_rows: usize = self.regions.values().map(Vec::len).sum();
        (building_objects + self.loose_objects.len() + region_rows) as u64
    }

    /// Saves recorded so far, in arrival order.
    #[must_use]
    pub fn saves(&self) -> Vec<PlayerSave> {
        self.saves.lock().expect("saves lock poisoned").clone()
    }
}

impl QueryBackend for FixtureBackend {
    fn execute(&self, query: &Query) -> Result<QueryResult, PersistError> {
        match query {
            Query::ObjectCount { .. } => Ok(QueryResult::ObjectCount(self.object_count())),
            Query::Buildings { .. } => Ok(QueryResult::Buildings(self.buildings.clone())),
            Query::LooseObjects { .. } => {
                Ok(QueryResult::LooseObjects(self.loose_objects.clone()))
            }
            Query::Regions { table, .. } => Ok(QueryResult::Regions(
                *table,
                self.regions.get(table).cloned().unwrap_or_default(),
            )),
            Query::Lookup(table) => Ok(QueryResult::Lookup(
                *table,
                self.lookups.get(table).cloned().unwrap_or_default(),
            )),
            Query::SavePlayer(save) => {
                self.saves
                    .lock()
                    .expect("saves lock poisoned")
                    .push(save.clone());
                Ok(QueryResult::SaveAck(save.id))
            }
        }
    }
}
