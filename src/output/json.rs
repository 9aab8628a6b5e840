//! JSON serialization of the inventory

use crate::inventory::SiteInventory;
use crate::output::{OutputError, OutputResult};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

pub fn inventory_to_json(inventory: &SiteInventory) -> OutputResult<String> {
    Ok(serde_json::to_string_pretty(inventory)?)
}

/// Writes the inventory as pretty-printed JSON
///
/// # Arguments
///
/// * `inventory` - The crawl's output
/// * `output_path` - Destination file, replaced if it exists
pub fn write_inventory_json(inventory: &SiteInventory, output_path: &Path) -> OutputResult<()> {
    let write_error = |source| OutputError::Write {
        path: output_path.display().to_string(),
        source,
    };

    let file = File::create(output_path).map_err(write_error)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, inventory)?;
    writer.write_all(b"\n").map_err(write_error)?;
    writer.flush().map_err(write_error)?;

    tracing::debug!("Wrote inventory JSON to {}", output_path.display());
    Ok(())
}

pub fn read_inventory_json(path: &Path) -> OutputResult<SiteInventory> {
    let file = File::open(path)?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}
