//! Output module for crawl reports
//!
//! This module handles:
//! - Serializing the inventory to JSON for downstream consumers
//! - Generating a markdown summary of the captured screens
//! - Printing statistics of stored runs

mod json;
mod markdown;
pub mod stats;

pub use json::{inventory_to_json, read_inventory_json, write_inventory_json};
pub use markdown::{format_markdown_summary, generate_markdown_summary, EMPTY_INVENTORY_NOTICE};
pub use stats::{load_statistics, print_statistics, CrawlStatistics};

use crate::storage::StorageError;
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;
