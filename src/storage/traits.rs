//! Storage traits and error types

use crate::inventory::{PageKind, SiteInventory};
use crate::storage::RunRecord;
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Corrupt record in {table}: {detail}")]
    Corrupt { table: &'static str, detail: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Persistence of completed inventories
///
/// An inventory is written as a unit and read back as a unit; there is no
/// partial update of a stored run.
pub trait InventoryStore {
    // ===== Runs =====

    /// Persists a completed inventory in a single transaction
    ///
    /// # Arguments
    ///
    /// * `inventory` - The crawl's output
    /// * `config_hash` - Hash of the configuration file that produced it
    ///
    /// # Returns
    ///
    /// The ID of the new run
    fn save_inventory(&mut self, inventory: &SiteInventory, config_hash: &str)
        -> StorageResult<i64>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    /// All runs, newest first
    fn list_runs(&self) -> StorageResult<Vec<RunRecord>>;

    // ===== Inventories =====

    /// Rebuilds the inventory stored for a run
    fn load_inventory(&self, run_id: i64) -> StorageResult<SiteInventory>;

    /// Rebuilds the most recently stored inventory
    fn load_latest_inventory(&self) -> StorageResult<Option<SiteInventory>> {
        match self.get_latest_run()? {
            Some(run) => self.load_inventory(run.id).map(Some),
            None => Ok(None),
        }
    }

    // ===== Statistics =====

    /// Counts screens by page kind
    fn count_screens_by_kind(&self, run_id: i64) -> StorageResult<HashMap<PageKind, u64>>;

    /// Gets screen count breakdown by depth
    fn get_depth_breakdown(&self, run_id: i64) -> StorageResult<BTreeMap<u32, u64>>;

    /// Counts screens whose snapshot could not be produced
    fn count_capture_failures(&self, run_id: i64) -> StorageResult<u64>;

    /// Skip reasons with their counts, most frequent first
    fn get_skip_summary(&self, run_id: i64) -> StorageResult<Vec<(String, u64)>>;

    /// Templates that collapsed more than one URL, largest first
    fn get_collapsed_templates(&self, run_id: i64) -> StorageResult<Vec<(String, u32)>>;
}
