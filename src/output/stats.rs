//! Statistics of stored crawl runs
//!
//! This module provides functionality for extracting and displaying
//! statistics of the latest run from the storage layer.

use crate::inventory::PageKind;
use crate::output::OutputResult;
use crate::storage::{InventoryStore, RunRecord};
use std::collections::{BTreeMap, HashMap};

/// Statistics of one stored run
#[derive(Debug, Clone)]
pub struct CrawlStatistics {
    pub run: RunRecord,

    /// Total number of captured screens
    pub total_screens: u64,

    /// Count of screens by page kind
    pub screens_by_kind: HashMap<PageKind, u64>,

    /// Count of screens by depth
    pub depth_breakdown: BTreeMap<u32, u64>,

    /// Screens without a snapshot
    pub capture_failures: u64,

    /// Skip reasons and their counts
    pub skip_summary: Vec<(String, u64)>,

    /// Templates that collapsed more than one URL
    pub collapsed_templates: Vec<(String, u32)>,
}

impl CrawlStatistics {
    pub fn total_skipped(&self) -> u64 {
        self.skip_summary.iter().map(|(_, count)| count).sum()
    }

    /// Share of visited pages that did not end up skipped, in percent
    pub fn success_rate(&self) -> f64 {
        let visited = self.run.pages_visited as f64;
        if visited == 0.0 {
            return 0.0;
        }
        (visited - self.total_skipped() as f64).max(0.0) / visited * 100.0
    }
}

/// Loads statistics of the latest run
///
/// # Arguments
///
/// * `storage` - The storage backend to query
///
/// # Returns
///
/// * `Ok(Some(CrawlStatistics))` - Statistics of the latest run
/// * `Ok(None)` - No run has been stored yet
/// * `Err(OutputError)` - Failed to query statistics
pub fn load_statistics(storage: &dyn InventoryStore) -> OutputResult<Option<CrawlStatistics>> {
    let Some(run) = storage.get_latest_run()? else {
        return Ok(None);
    };

    let screens_by_kind = storage.count_screens_by_kind(run.id)?;
    let depth_breakdown = storage.get_depth_breakdown(run.id)?;

    Ok(Some(CrawlStatistics {
        total_screens: screens_by_kind.values().sum(),
        screens_by_kind,
        depth_breakdown,
        capture_failures: storage.count_capture_failures(run.id)?,
        skip_summary: storage.get_skip_summary(run.id)?,
        collapsed_templates: storage.get_collapsed_templates(run.id)?,
        run,
    }))
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &CrawlStatistics) {
    let run = &stats.run;
    println!("=== Crawl Statistics (run {}) ===\n", run.id);

    println!("Overview:");
    println!("  Base URL: {}", run.base_url);
    println!("  Started: {}", run.started_at);
    println!("  Duration: {:.1}s", run.duration_ms as f64 / 1000.0);
    println!("  Status: {}", run.status.to_db_string());
    if let Some(reason) = run.truncation {
        println!("  Truncated by: {}", reason.as_str());
    }
    println!("  Pages visited: {}", run.pages_visited);
    println!("  Screens captured: {}", stats.total_screens);
    println!();

    println!("Screens by Kind:");
    for kind in [PageKind::Content, PageKind::Login, PageKind::Error] {
        let count = stats.screens_by_kind.get(&kind).copied().unwrap_or(0);
        println!("  {}: {}", kind.as_str(), count);
    }
    println!();

    if !stats.depth_breakdown.is_empty() {
        println!("Screens by Depth:");
        for (depth, count) in &stats.depth_breakdown {
            println!("  {}: {}", depth, count);
        }
        println!();
    }

    if !stats.collapsed_templates.is_empty() {
        println!("Collapsed Templates ({}):", stats.collapsed_templates.len());
        for (key, instances) in &stats.collapsed_templates {
            println!("  {} ({} URLs)", key, instances);
        }
        println!();
    }

    if !stats.skip_summary.is_empty() {
        println!("Skipped URLs ({}):", stats.total_skipped());
        for (reason, count) in &stats.skip_summary {
            println!("  {}: {}", reason, count);
        }
        println!();
    }

    if stats.capture_failures > 0 {
        println!("Screens without snapshot: {}", stats.capture_failures);
    }

    println!(
        "Success Rate: {:.1}% ({} skipped of {} pages visited)",
        stats.success_rate(),
        stats.total_skipped(),
        run.pages_visited
    );
}
