//! Database schema definitions
//!
//! Each run is written once, as a unit, when its crawl completes. Screens and
//! templates reference their run; nothing is updated after insertion.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- One row per completed crawl
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    base_url TEXT NOT NULL,
    started_at TEXT NOT NULL,
    finished_at TEXT NOT NULL,
    duration_ms INTEGER NOT NULL,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL,
    pages_visited INTEGER NOT NULL,
    truncation TEXT
);

-- Captured screens, in discovery order within a run
CREATE TABLE IF NOT EXISTS screens (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id INTEGER NOT NULL REFERENCES runs(id),
    screen_index INTEGER NOT NULL,
    url TEXT NOT NULL,
    title TEXT NOT NULL,
    nav_path TEXT NOT NULL,
    template_key TEXT NOT NULL,
    kind TEXT NOT NULL,
    status_code INTEGER NOT NULL,
    depth INTEGER NOT NULL,
    parent_index INTEGER,
    snapshot TEXT,
    capture_failed INTEGER NOT NULL DEFAULT 0,
    structure TEXT NOT NULL,
    UNIQUE(run_id, screen_index)
);

CREATE INDEX IF NOT EXISTS idx_screens_run ON screens(run_id);
CREATE INDEX IF NOT EXISTS idx_screens_template ON screens(run_id, template_key);

-- Inferred URL templates
CREATE TABLE IF NOT EXISTS templates (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id INTEGER NOT NULL REFERENCES runs(id),
    template_key TEXT NOT NULL,
    representative_index INTEGER NOT NULL,
    instances INTEGER NOT NULL,
    inference TEXT NOT NULL,
    UNIQUE(run_id, template_key)
);

-- URLs that were dispatched but produced no screen
CREATE TABLE IF NOT EXISTS skipped_urls (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id INTEGER NOT NULL REFERENCES runs(id),
    url TEXT NOT NULL,
    depth INTEGER NOT NULL,
    reason TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_skipped_run ON skipped_urls(run_id);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
