//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the InventoryStore
//! trait. Nested values (navigation path, structure, snapshot reference) are
//! stored as JSON text.

use crate::inventory::{
    CrawledScreen, PageKind, ScreenId, SiteInventory, SkippedUrl, TemplateInference,
    TruncationReason, UrlTemplate,
};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{InventoryStore, StorageError, StorageResult};
use crate::storage::{RunRecord, RunStatus};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

const RUN_COLUMNS: &str = "id, base_url, started_at, finished_at, duration_ms, config_hash, status, pages_visited, truncation";

/// SQLite storage backend
pub struct SqliteInventoryStore {
    conn: Connection,
}

impl SqliteInventoryStore {
    /// Opens or creates the database at `path`
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteInventoryStore)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    fn load_screens(&self, run_id: i64) -> StorageResult<Vec<CrawledScreen>> {
        let mut stmt = self.conn.prepare(
            "SELECT screen_index, url, title, nav_path, template_key, kind, status_code,
                    depth, parent_index, snapshot, capture_failed, structure
             FROM screens WHERE run_id = ?1 ORDER BY screen_index",
        )?;

        let rows = stmt.query_map(params![run_id], |row| {
            Ok(ScreenRow {
                index: row.get(0)?,
                url: row.get(1)?,
                title: row.get(2)?,
                nav_path: row.get(3)?,
                template: row.get(4)?,
                kind: row.get(5)?,
                status: row.get(6)?,
                depth: row.get(7)?,
                parent: row.get(8)?,
                snapshot: row.get(9)?,
                capture_failed: row.get(10)?,
                structure: row.get(11)?,
            })
        })?;

        let mut screens = Vec::new();
        for row in rows {
            screens.push(row?.into_screen()?);
        }
        Ok(screens)
    }

    fn load_templates(&self, run_id: i64) -> StorageResult<Vec<UrlTemplate>> {
        let mut stmt = self.conn.prepare(
            "SELECT template_key, representative_index, instances, inference
             FROM templates WHERE run_id = ?1 ORDER BY representative_index",
        )?;

        let rows = stmt.query_map(params![run_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut templates = Vec::new();
        for row in rows {
            let (key, representative, instances, inference) = row?;
            let inference =
                TemplateInference::from_str(&inference).ok_or_else(|| StorageError::Corrupt {
                    table: "templates",
                    detail: format!("unknown inference '{}'", inference),
                })?;
            templates.push(UrlTemplate {
                key,
                representative: ScreenId(representative as usize),
                instances: instances as u32,
                inference,
            });
        }
        Ok(templates)
    }

    fn load_skipped(&self, run_id: i64) -> StorageResult<Vec<SkippedUrl>> {
        let mut stmt = self
            .conn
            .prepare("SELECT url, depth, reason FROM skipped_urls WHERE run_id = ?1 ORDER BY id")?;

        let skipped = stmt
            .query_map(params![run_id], |row| {
                Ok(SkippedUrl {
                    url: row.get(0)?,
                    depth: row.get::<_, i64>(1)? as u32,
                    reason: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(skipped)
    }
}

/// Raw column values of one `screens` row
struct ScreenRow {
    index: i64,
    url: String,
    title: String,
    nav_path: String,
    template: String,
    kind: String,
    status: i64,
    depth: i64,
    parent: Option<i64>,
    snapshot: Option<String>,
    capture_failed: bool,
    structure: String,
}

impl ScreenRow {
    fn into_screen(self) -> StorageResult<CrawledScreen> {
        let kind = PageKind::from_str(&self.kind).ok_or_else(|| StorageError::Corrupt {
            table: "screens",
            detail: format!("unknown kind '{}'", self.kind),
        })?;

        Ok(CrawledScreen {
            id: ScreenId(self.index as usize),
            url: self.url,
            title: self.title,
            nav_path: serde_json::from_str(&self.nav_path)?,
            template: self.template,
            kind,
            status: self.status as u16,
            snapshot: self
                .snapshot
                .as_deref()
                .map(serde_json::from_str)
                .transpose()?,
            capture_failed: self.capture_failed,
            structure: serde_json::from_str(&self.structure)?,
            depth: self.depth as u32,
            parent: self.parent.map(|p| ScreenId(p as usize)),
        })
    }
}

fn run_from_row(row: &Row) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        base_url: row.get(1)?,
        started_at: row.get(2)?,
        finished_at: row.get(3)?,
        duration_ms: row.get::<_, i64>(4)? as u64,
        config_hash: row.get(5)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(6)?)
            .unwrap_or(RunStatus::Completed),
        pages_visited: row.get::<_, i64>(7)? as u32,
        truncation: row
            .get::<_, Option<String>>(8)?
            .and_then(|s| TruncationReason::from_str(&s)),
    })
}

impl InventoryStore for SqliteInventoryStore {
    // ===== Runs =====

    fn save_inventory(
        &mut self,
        inventory: &SiteInventory,
        config_hash: &str,
    ) -> StorageResult<i64> {
        let tx = self.conn.transaction()?;

        tx.execute(
            "INSERT INTO runs (base_url, started_at, finished_at, duration_ms, config_hash,
                               status, pages_visited, truncation)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                inventory.base_url,
                inventory.started_at.to_rfc3339(),
                Utc::now().to_rfc3339(),
                inventory.duration_ms as i64,
                config_hash,
                RunStatus::of(inventory).to_db_string(),
                inventory.pages_visited,
                inventory.truncation.map(|t| t.as_str()),
            ],
        )?;
        let run_id = tx.last_insert_rowid();

        {
            let mut insert_screen = tx.prepare(
                "INSERT INTO screens (run_id, screen_index, url, title, nav_path, template_key,
                                      kind, status_code, depth, parent_index, snapshot,
                                      capture_failed, structure)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            )?;
            for screen in &inventory.screens {
                let snapshot = screen
                    .snapshot
                    .as_ref()
                    .map(serde_json::to_string)
                    .transpose()?;
                insert_screen.execute(params![
                    run_id,
                    screen.id.0 as i64,
                    screen.url,
                    screen.title,
                    serde_json::to_string(&screen.nav_path)?,
                    screen.template,
                    screen.kind.as_str(),
                    screen.status,
                    screen.depth,
                    screen.parent.map(|p| p.0 as i64),
                    snapshot,
                    screen.capture_failed,
                    serde_json::to_string(&screen.structure)?,
                ])?;
            }

            let mut insert_template = tx.prepare(
                "INSERT INTO templates (run_id, template_key, representative_index, instances, inference)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for template in &inventory.templates {
                insert_template.execute(params![
                    run_id,
                    template.key,
                    template.representative.0 as i64,
                    template.instances,
                    template.inference.as_str(),
                ])?;
            }

            let mut insert_skipped = tx.prepare(
                "INSERT INTO skipped_urls (run_id, url, depth, reason) VALUES (?1, ?2, ?3, ?4)",
            )?;
            for skipped in &inventory.skipped {
                insert_skipped.execute(params![run_id, skipped.url, skipped.depth, skipped.reason])?;
            }
        }

        tx.commit()?;
        tracing::debug!(
            "Stored run {} with {} screens",
            run_id,
            inventory.screens.len()
        );
        Ok(run_id)
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        let sql = format!("SELECT {} FROM runs WHERE id = ?1", RUN_COLUMNS);
        self.conn
            .query_row(&sql, params![run_id], run_from_row)
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let sql = format!("SELECT {} FROM runs ORDER BY id DESC LIMIT 1", RUN_COLUMNS);
        Ok(self.conn.query_row(&sql, [], run_from_row).optional()?)
    }

    fn list_runs(&self) -> StorageResult<Vec<RunRecord>> {
        let sql = format!("SELECT {} FROM runs ORDER BY id DESC", RUN_COLUMNS);
        let mut stmt = self.conn.prepare(&sql)?;
        let runs = stmt
            .query_map([], run_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(runs)
    }

    // ===== Inventories =====

    fn load_inventory(&self, run_id: i64) -> StorageResult<SiteInventory> {
        let run = self.get_run(run_id)?;
        let started_at = DateTime::parse_from_rfc3339(&run.started_at)
            .map_err(|e| StorageError::Corrupt {
                table: "runs",
                detail: format!("bad started_at '{}': {}", run.started_at, e),
            })?
            .with_timezone(&Utc);

        Ok(SiteInventory {
            base_url: run.base_url,
            screens: self.load_screens(run_id)?,
            templates: self.load_templates(run_id)?,
            skipped: self.load_skipped(run_id)?,
            pages_visited: run.pages_visited,
            started_at,
            duration_ms: run.duration_ms,
            truncated: run.truncation.is_some(),
            truncation: run.truncation,
        })
    }

    // ===== Statistics =====

    fn count_screens_by_kind(&self, run_id: i64) -> StorageResult<HashMap<PageKind, u64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT kind, COUNT(*) FROM screens WHERE run_id = ?1 GROUP BY kind")?;

        let mut summary = HashMap::new();
        let rows = stmt.query_map(params![run_id], |row| {
            let kind: String = row.get(0)?;
            let count: i64 = row.get(1)?;
            Ok((kind, count))
        })?;

        for row in rows {
            let (kind, count) = row?;
            if let Some(kind) = PageKind::from_str(&kind) {
                summary.insert(kind, count as u64);
            }
        }

        Ok(summary)
    }

    fn get_depth_breakdown(&self, run_id: i64) -> StorageResult<BTreeMap<u32, u64>> {
        let mut stmt = self.conn.prepare(
            "SELECT depth, COUNT(*) FROM screens WHERE run_id = ?1 GROUP BY depth ORDER BY depth",
        )?;

        let breakdown = stmt
            .query_map(params![run_id], |row| {
                Ok((row.get::<_, i64>(0)? as u32, row.get::<_, i64>(1)? as u64))
            })?
            .collect::<Result<BTreeMap<_, _>, _>>()?;

        Ok(breakdown)
    }

    fn count_capture_failures(&self, run_id: i64) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM screens WHERE run_id = ?1 AND capture_failed = 1",
            params![run_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn get_skip_summary(&self, run_id: i64) -> StorageResult<Vec<(String, u64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT reason, COUNT(*) as count FROM skipped_urls WHERE run_id = ?1
             GROUP BY reason ORDER BY count DESC, reason",
        )?;

        let summary = stmt
            .query_map(params![run_id], |row| {
                Ok((row.get(0)?, row.get::<_, i64>(1)? as u64))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(summary)
    }

    fn get_collapsed_templates(&self, run_id: i64) -> StorageResult<Vec<(String, u32)>> {
        let mut stmt = self.conn.prepare(
            "SELECT template_key, instances FROM templates WHERE run_id = ?1 AND instances > 1
             ORDER BY instances DESC, template_key",
        )?;

        let templates = stmt
            .query_map(params![run_id], |row| {
                Ok((row.get(0)?, row.get::<_, i64>(1)? as u32))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(templates)
    }
}
