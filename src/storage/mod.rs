//! Storage module for persisting crawl results
//!
//! This module handles all database operations for the crawler, including:
//! - SQLite database initialization and schema management
//! - Writing a completed inventory as one unit
//! - Reloading stored inventories and computing run statistics

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteInventoryStore;
pub use traits::{InventoryStore, StorageError, StorageResult};

use crate::inventory::{SiteInventory, TruncationReason};
use std::path::Path;

/// Opens or creates an inventory database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteInventoryStore)` - Successfully initialized storage
/// * `Err(StorageError)` - Failed to initialize storage
pub fn open_storage(path: &Path) -> StorageResult<SqliteInventoryStore> {
    SqliteInventoryStore::new(path)
}

/// Represents a stored crawl run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub base_url: String,
    pub started_at: String,
    pub finished_at: String,
    pub duration_ms: u64,
    pub config_hash: String,
    pub status: RunStatus,
    pub pages_visited: u32,
    pub truncation: Option<TruncationReason>,
}

/// How a stored run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// The frontier emptied
    Completed,
    /// A page or depth bound was hit
    Truncated,
    /// Cancelled or stopped by the deadline
    Interrupted,
}

impl RunStatus {
    /// Status of the run that produced `inventory`
    pub fn of(inventory: &SiteInventory) -> Self {
        match inventory.truncation {
            None => Self::Completed,
            Some(TruncationReason::PageLimit | TruncationReason::DepthLimit) => Self::Truncated,
            Some(TruncationReason::Deadline | TruncationReason::Cancelled) => Self::Interrupted,
        }
    }

    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Truncated => "truncated",
            Self::Interrupted => "interrupted",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "completed" => Some(Self::Completed),
            "truncated" => Some(Self::Truncated),
            "interrupted" => Some(Self::Interrupted),
            _ => None,
        }
    }
}
