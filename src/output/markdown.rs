//! Markdown summary generation
//!
//! This module generates a human-readable markdown summary of an inventory:
//! run information, the navigation tree, the screen table, inferred
//! templates and skipped URLs.

use crate::inventory::{CrawledScreen, ScreenId, SiteInventory};
use crate::output::{OutputError, OutputResult};
use std::fmt::Write as _;
use std::path::Path;

/// Printed instead of the screen sections when nothing was captured
pub const EMPTY_INVENTORY_NOTICE: &str =
    "No pages were crawled. Check the deployment URL and auth configuration.";

/// Skipped URLs listed before the table is cut off
const MAX_SKIPPED_ROWS: usize = 50;

/// Writes a markdown summary of the inventory
///
/// # Arguments
///
/// * `inventory` - The crawl's output
/// * `output_path` - Path where the markdown file should be written
///
/// # Returns
///
/// * `Ok(())` - Successfully wrote markdown summary
/// * `Err(OutputError)` - Failed to write summary
pub fn generate_markdown_summary(inventory: &SiteInventory, output_path: &Path) -> OutputResult<()> {
    let markdown = format_markdown_summary(inventory);

    std::fs::write(output_path, markdown).map_err(|source| OutputError::Write {
        path: output_path.display().to_string(),
        source,
    })?;

    Ok(())
}

/// Formats an inventory as markdown
pub fn format_markdown_summary(inventory: &SiteInventory) -> String {
    let mut md = String::new();

    md.push_str("# Screen Atlas Inventory\n\n");

    md.push_str("## Run Information\n\n");
    let _ = writeln!(md, "- **Base URL**: {}", inventory.base_url);
    let _ = writeln!(md, "- **Started**: {}", inventory.started_at.to_rfc3339());
    let _ = writeln!(
        md,
        "- **Duration**: {:.1} seconds",
        inventory.duration_ms as f64 / 1000.0
    );
    let _ = writeln!(md, "- **Pages Visited**: {}", inventory.pages_visited);
    let _ = writeln!(md, "- **Screens**: {}", inventory.total_screens());
    let _ = writeln!(md, "- **URL Templates**: {}", inventory.templates.len());
    match inventory.truncation {
        Some(reason) => {
            let _ = writeln!(md, "- **Truncated**: yes ({})", reason.as_str());
        }
        None => md.push_str("- **Truncated**: no\n"),
    }
    md.push('\n');

    if inventory.is_empty() {
        md.push_str(EMPTY_INVENTORY_NOTICE);
        md.push('\n');
        push_skipped(&mut md, inventory);
        return md;
    }

    md.push_str("## Navigation\n\n");
    push_tree(&mut md, inventory);
    md.push('\n');

    md.push_str("## Screens\n\n");
    md.push_str("| Screen | Title | URL | Template | Kind | Depth | Snapshot |\n");
    md.push_str("|--------|-------|-----|----------|------|-------|----------|\n");
    for screen in &inventory.screens {
        let _ = writeln!(
            md,
            "| {} | {} | {} | `{}` | {} | {} | {} |",
            screen.id,
            escape_cell(&screen.title),
            screen.url,
            screen.template,
            screen.kind.as_str(),
            screen.depth,
            snapshot_cell(screen)
        );
    }
    md.push('\n');

    let collapsed: Vec<_> = inventory
        .templates
        .iter()
        .filter(|t| t.instances > 1)
        .collect();
    if !collapsed.is_empty() {
        md.push_str("## Collapsed URL Templates\n\n");
        md.push_str("| Template | Instances | Inference | Representative |\n");
        md.push_str("|----------|-----------|-----------|----------------|\n");
        for template in collapsed {
            let _ = writeln!(
                md,
                "| `{}` | {} | {} | {} |",
                template.key,
                template.instances,
                template.inference.as_str(),
                template.representative
            );
        }
        md.push('\n');
    }

    md.push_str("## Screen Details\n\n");
    for screen in &inventory.screens {
        push_screen_details(&mut md, screen);
    }

    push_skipped(&mut md, inventory);
    md
}

/// Indented list of screens under their parents, in discovery order
fn push_tree(md: &mut String, inventory: &SiteInventory) {
    fn visit(md: &mut String, inventory: &SiteInventory, id: ScreenId, level: usize) {
        let Some(screen) = inventory.screen(id) else {
            return;
        };
        let _ = writeln!(md, "{}- {} ({})", "  ".repeat(level), screen.title, screen.url);
        for child in inventory.screens.iter().filter(|s| s.parent == Some(id)) {
            visit(md, inventory, child.id, level + 1);
        }
    }

    for root in inventory.screens.iter().filter(|s| s.parent.is_none()) {
        visit(md, inventory, root.id, 0);
    }
}

fn push_screen_details(md: &mut String, screen: &CrawledScreen) {
    let structure = &screen.structure;
    let _ = writeln!(md, "### {}\n", screen.title);
    let _ = writeln!(md, "- **Path**: {}", screen.nav_path.join(" > "));

    if !structure.headings.is_empty() {
        let headings: Vec<String> = structure
            .headings
            .iter()
            .map(|h| format!("h{} {}", h.level, h.text))
            .collect();
        let _ = writeln!(md, "- **Headings**: {}", headings.join("; "));
    }
    if !structure.landmarks.is_empty() {
        let _ = writeln!(md, "- **Landmarks**: {}", structure.landmarks.join(", "));
    }
    if !structure.nav_links.is_empty() {
        let links: Vec<String> = structure
            .nav_links
            .iter()
            .map(|l| if l.is_active { format!("**{}**", l.text) } else { l.text.clone() })
            .collect();
        let _ = writeln!(md, "- **Navigation**: {}", links.join(", "));
    }
    if !structure.interactive.is_empty() {
        let _ = writeln!(md, "- **Controls**: {}", structure.interactive.len());
    }
    if !structure.form_fields.is_empty() {
        let fields: Vec<String> = structure
            .form_fields
            .iter()
            .map(|f| {
                let name = f
                    .label
                    .as_deref()
                    .or(f.name.as_deref())
                    .unwrap_or(&f.field_type);
                if f.hints.required {
                    format!("{}*", name)
                } else {
                    name.to_string()
                }
            })
            .collect();
        let _ = writeln!(md, "- **Form Fields**: {}", fields.join(", "));
    }
    if !structure.tabs.is_empty() {
        let tabs: Vec<&str> = structure.tabs.iter().map(|t| t.label.as_str()).collect();
        let _ = writeln!(md, "- **Tabs**: {}", tabs.join(", "));
    }
    if !structure.modals.is_empty() {
        let _ = writeln!(md, "- **Modals**: {}", structure.modals.join(", "));
    }
    md.push('\n');
}

fn push_skipped(md: &mut String, inventory: &SiteInventory) {
    if inventory.skipped.is_empty() {
        return;
    }

    md.push_str("\n## Skipped URLs\n\n");
    md.push_str("| URL | Depth | Reason |\n");
    md.push_str("|-----|-------|--------|\n");
    for skipped in inventory.skipped.iter().take(MAX_SKIPPED_ROWS) {
        let _ = writeln!(
            md,
            "| {} | {} | {} |",
            skipped.url,
            skipped.depth,
            escape_cell(&skipped.reason)
        );
    }
    if inventory.skipped.len() > MAX_SKIPPED_ROWS {
        let _ = writeln!(
            md,
            "\n... and {} more",
            inventory.skipped.len() - MAX_SKIPPED_ROWS
        );
    }
}

fn snapshot_cell(screen: &CrawledScreen) -> String {
    match (&screen.snapshot, screen.capture_failed) {
        (Some(snapshot), _) => snapshot.id.clone(),
        (None, true) => "capture failed".to_string(),
        (None, false) => "-".to_string(),
    }
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|")
}
