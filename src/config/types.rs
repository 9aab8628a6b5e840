use crate::snapshot::{SnapshotFormat, SnapshotSettings};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;

/// Main configuration structure for Screen Atlas
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawl: CrawlSection,

    #[serde(default)]
    pub browser: BrowserConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

/// Crawl target, bounds and scope
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlSection {
    /// Root URL of the application; the crawl starts here
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Maximum number of concrete URLs fetched
    #[serde(rename = "max-pages", default = "default_max_pages")]
    pub max_pages: u32,

    /// Maximum discovery depth from the base URL
    #[serde(rename = "max-depth", default = "default_max_depth")]
    pub max_depth: u32,

    /// Number of concurrent workers, each with its own browsing context
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Upper bound on one page fetch (milliseconds)
    #[serde(rename = "page-timeout-ms", default = "default_page_timeout_ms")]
    pub page_timeout_ms: u64,

    /// Budget for network and DOM activity to quiesce (milliseconds)
    #[serde(rename = "settle-ms", default = "default_settle_ms")]
    pub settle_ms: u64,

    /// Overall crawl deadline (seconds)
    #[serde(rename = "deadline-secs", default)]
    pub deadline_secs: Option<u64>,

    /// Controls engaged per page during script-navigation discovery
    #[serde(rename = "max-probes-per-page", default = "default_max_probes")]
    pub max_probes_per_page: usize,

    /// Minimum structural similarity for merging literal route variants
    #[serde(rename = "similarity-threshold", default = "default_similarity_threshold")]
    pub similarity_threshold: f64,

    #[serde(default)]
    pub auth: Option<AuthConfig>,

    #[serde(default)]
    pub scope: ScopeConfig,

    #[serde(default)]
    pub snapshot: SnapshotConfig,
}

/// How credentials are presented to the application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuthStrategy {
    Cookies,
    BearerToken,
}

/// Credential configuration
#[derive(Clone, Deserialize)]
pub struct AuthConfig {
    pub strategy: AuthStrategy,

    /// Literal bearer token
    #[serde(default)]
    pub token: Option<String>,

    /// Environment variable holding the bearer token
    #[serde(rename = "token-env", default)]
    pub token_env: Option<String>,

    /// Extra headers sent with the bearer token
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    #[serde(default)]
    pub cookies: Vec<CookieEntry>,
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("strategy", &self.strategy)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("token_env", &self.token_env)
            .field("headers", &self.headers.keys().collect::<Vec<_>>())
            .field("cookies", &self.cookies)
            .finish()
    }
}

/// One session cookie
#[derive(Clone, Deserialize)]
pub struct CookieEntry {
    pub name: String,
    pub value: String,

    #[serde(default)]
    pub domain: Option<String>,

    #[serde(default)]
    pub path: Option<String>,
}

impl fmt::Debug for CookieEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CookieEntry")
            .field("name", &self.name)
            .field("value", &"<redacted>")
            .field("domain", &self.domain)
            .field("path", &self.path)
            .finish()
    }
}

/// Route glob patterns; exclude wins over include
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScopeConfig {
    #[serde(default)]
    pub include: Vec<String>,

    #[serde(default)]
    pub exclude: Vec<String>,
}

/// Snapshot encoding configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SnapshotConfig {
    #[serde(default)]
    pub format: SnapshotFormat,

    /// JPEG quality (1-100)
    #[serde(default = "default_quality")]
    pub quality: u8,

    /// Captures wider than this are scaled down before encoding
    #[serde(rename = "max-width", default = "default_max_width")]
    pub max_width: u32,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            format: SnapshotFormat::default(),
            quality: default_quality(),
            max_width: default_max_width(),
        }
    }
}

impl From<&SnapshotConfig> for SnapshotSettings {
    fn from(config: &SnapshotConfig) -> Self {
        Self {
            format: config.format,
            quality: config.quality,
            max_width: config.max_width,
        }
    }
}

/// Rendering engine selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// Static DOM over HTTP; no script execution and no pixel capture
    #[default]
    Http,
    /// Headless Chromium (requires the `chrome` feature)
    Chrome,
}

/// Browser engine configuration
#[derive(Debug, Clone, Deserialize)]
pub struct BrowserConfig {
    #[serde(default)]
    pub engine: EngineKind,

    #[serde(rename = "viewport-width", default = "default_viewport_width")]
    pub viewport_width: u32,

    #[serde(rename = "viewport-height", default = "default_viewport_height")]
    pub viewport_height: u32,

    #[serde(default = "default_headless")]
    pub headless: bool,

    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            engine: EngineKind::default(),
            viewport_width: default_viewport_width(),
            viewport_height: default_viewport_height(),
            headless: default_headless(),
            user_agent: default_user_agent(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Directory for encoded snapshots
    #[serde(rename = "snapshot-dir", default = "default_snapshot_dir")]
    pub snapshot_dir: String,

    /// Path to the SQLite database file
    #[serde(rename = "database-path", default = "default_database_path")]
    pub database_path: String,

    /// Path to the JSON inventory file
    #[serde(rename = "inventory-path", default = "default_inventory_path")]
    pub inventory_path: String,

    /// Path to the markdown summary file
    #[serde(rename = "summary-path", default = "default_summary_path")]
    pub summary_path: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            snapshot_dir: default_snapshot_dir(),
            database_path: default_database_path(),
            inventory_path: default_inventory_path(),
            summary_path: default_summary_path(),
        }
    }
}

pub(crate) fn default_max_pages() -> u32 {
    50
}

pub(crate) fn default_max_depth() -> u32 {
    4
}

pub(crate) fn default_workers() -> usize {
    2
}

pub(crate) fn default_page_timeout_ms() -> u64 {
    30_000
}

pub(crate) fn default_settle_ms() -> u64 {
    2_000
}

pub(crate) fn default_max_probes() -> usize {
    20
}

pub(crate) fn default_similarity_threshold() -> f64 {
    0.9
}

fn default_quality() -> u8 {
    85
}

fn default_max_width() -> u32 {
    1280
}

fn default_viewport_width() -> u32 {
    1280
}

fn default_viewport_height() -> u32 {
    720
}

fn default_headless() -> bool {
    true
}

fn default_user_agent() -> String {
    format!("screen-atlas/{}", env!("CARGO_PKG_VERSION"))
}

fn default_snapshot_dir() -> String {
    "./snapshots".to_string()
}

fn default_database_path() -> String {
    "./atlas.db".to_string()
}

fn default_inventory_path() -> String {
    "./inventory.json".to_string()
}

fn default_summary_path() -> String {
    "./inventory.md".to_string()
}
