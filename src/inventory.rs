//! Inventory data model
//!
//! A [`SiteInventory`] is the single output of one crawl. Everything in it is
//! created during that crawl and is never mutated afterwards.

use crate::extract::StructureDescription;
use crate::snapshot::SnapshotRef;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Index of a screen in [`SiteInventory::screens`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScreenId(pub usize);

impl fmt::Display for ScreenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "screen-{}", self.0)
    }
}

/// Coarse classification of a rendered page; only content pages become screens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageKind {
    Content,
    Login,
    Error,
}

impl PageKind {
    /// Path markers of sign-in screens
    pub const LOGIN_MARKERS: &'static [&'static str] = &["/login", "/signin", "/sign-in", "/auth"];

    /// Classifies a page from its HTTP status and route
    pub fn classify(status: u16, route: &str) -> Self {
        if status >= 400 {
            return Self::Error;
        }
        let route = route.to_ascii_lowercase();
        if Self::LOGIN_MARKERS.iter().any(|m| route.contains(m)) {
            Self::Login
        } else {
            Self::Content
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Content => "content",
            Self::Login => "login",
            Self::Error => "error",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "content" => Some(Self::Content),
            "login" => Some(Self::Login),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

/// One logical screen of the application
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawledScreen {
    pub id: ScreenId,

    /// Normalized URL of the first concrete instance visited
    pub url: String,

    pub title: String,

    /// Titles from the root screen down to this one
    pub nav_path: Vec<String>,

    /// Key of the owning [`UrlTemplate`]
    pub template: String,

    pub kind: PageKind,

    /// HTTP status of the representative instance
    pub status: u16,

    pub snapshot: Option<SnapshotRef>,

    /// Set when the snapshot could not be captured, encoded or stored
    pub capture_failed: bool,

    pub structure: StructureDescription,

    pub depth: u32,
    pub parent: Option<ScreenId>,
}

/// How a template's variable segments were inferred
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateInference {
    /// No variable segments
    Literal,
    /// Identifier-shaped segments (numeric, UUID, opaque token)
    Identifier,
    /// Merged by structural similarity of the rendered pages
    Structural,
}

impl TemplateInference {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Literal => "literal",
            Self::Identifier => "identifier",
            Self::Structural => "structural",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "literal" => Some(Self::Literal),
            "identifier" => Some(Self::Identifier),
            "structural" => Some(Self::Structural),
            _ => None,
        }
    }
}

/// An equivalence class of concrete URLs, e.g. `/users/:id`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlTemplate {
    pub key: String,

    /// The first concrete instance visited
    pub representative: ScreenId,

    /// Number of concrete URLs collapsed into this template, representative included
    pub instances: u32,

    pub inference: TemplateInference,
}

/// A URL that could not be crawled
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedUrl {
    pub url: String,
    pub depth: u32,
    pub reason: String,
}

/// Which bound cut the crawl short
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TruncationReason {
    PageLimit,
    DepthLimit,
    Deadline,
    Cancelled,
}

impl TruncationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PageLimit => "page_limit",
            Self::DepthLimit => "depth_limit",
            Self::Deadline => "deadline",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "page_limit" => Some(Self::PageLimit),
            "depth_limit" => Some(Self::DepthLimit),
            "deadline" => Some(Self::Deadline),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

/// The crawl's final output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteInventory {
    pub base_url: String,

    /// Screens in discovery order; `screens[i].id == ScreenId(i)`
    pub screens: Vec<CrawledScreen>,

    pub templates: Vec<UrlTemplate>,
    pub skipped: Vec<SkippedUrl>,

    /// Concrete pages fetched, successful or not
    pub pages_visited: u32,

    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,

    /// Set if a bound was hit before the frontier emptied
    pub truncated: bool,
    pub truncation: Option<TruncationReason>,
}

impl SiteInventory {
    pub fn total_screens(&self) -> usize {
        self.screens.len()
    }

    pub fn screen(&self, id: ScreenId) -> Option<&CrawledScreen> {
        self.screens.get(id.0)
    }

    pub fn template(&self, key: &str) -> Option<&UrlTemplate> {
        self.templates.iter().find(|t| t.key == key)
    }

    pub fn is_empty(&self) -> bool {
        self.screens.is_empty()
    }
}
