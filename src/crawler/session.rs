//! Crawl session state
//!
//! The frontier, the visited set, the template registry and the growing
//! inventory live here. The session is owned by the coordinator task alone;
//! workers never see it and only learn its decisions through [`Verdict`]s,
//! so check-and-mark of a URL and template classification are never
//! interleaved with another update.

use crate::config::CrawlConfig;
use crate::crawler::fetcher::{FetchError, RenderedPage};
use crate::crawler::template::{TemplateMatch, TemplateRegistry};
use crate::extract::{page_title, StructureDescription};
use crate::inventory::{
    CrawledScreen, PageKind, ScreenId, SiteInventory, SkippedUrl, TruncationReason,
};
use crate::snapshot::{SnapshotError, SnapshotRef};
use crate::url::{classify_scope, normalize_parsed, route_of, ScopeDecision, ScopeFilter};
use chrono::{DateTime, Utc};
use std::collections::{HashSet, VecDeque};
use url::Url;

/// A URL waiting in the frontier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedUrl {
    /// Normalized URL
    pub url: Url,

    /// Discovery depth; the base URL is 0
    pub depth: u32,

    /// Screen the URL was discovered on
    pub parent: Option<ScreenId>,
}

/// The coordinator's decision on a rendered page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// First instance of its template: capture it as this screen
    Capture(ScreenId),

    /// Another instance of the template represented by this screen
    Duplicate(ScreenId),

    /// Not part of the inventory (redirect alias or out of scope)
    Skip,
}

/// Explicit state of one crawl invocation
pub struct CrawlSession {
    base: Url,
    scope: ScopeFilter,
    max_pages: u32,
    max_depth: u32,

    frontier: VecDeque<QueuedUrl>,
    queued: HashSet<String>,
    visited: HashSet<String>,
    refused: HashSet<String>,

    templates: TemplateRegistry,
    screens: Vec<CrawledScreen>,
    skipped: Vec<SkippedUrl>,

    dispatched: u32,
    depth_pruned: bool,
}

impl CrawlSession {
    /// Creates a session with the base URL seeded at depth 0
    pub fn new(base: Url, config: &CrawlConfig) -> Self {
        let mut session = Self {
            base: base.clone(),
            scope: config.scope.clone(),
            max_pages: config.max_pages,
            max_depth: config.max_depth,
            frontier: VecDeque::new(),
            queued: HashSet::new(),
            visited: HashSet::new(),
            refused: HashSet::new(),
            templates: TemplateRegistry::new(config.similarity_threshold),
            screens: Vec::new(),
            skipped: Vec::new(),
            dispatched: 0,
            depth_pruned: false,
        };

        session.queued.insert(base.to_string());
        session.frontier.push_back(QueuedUrl {
            url: base,
            depth: 0,
            parent: None,
        });
        session
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    pub fn dispatched(&self) -> u32 {
        self.dispatched
    }

    pub fn frontier_len(&self) -> usize {
        self.frontier.len()
    }

    /// True while the page budget allows another fetch
    pub fn has_budget(&self) -> bool {
        self.dispatched < self.max_pages
    }

    /// True if the frontier still holds an unvisited URL
    pub fn has_pending(&self) -> bool {
        self.frontier
            .iter()
            .any(|q| !self.visited.contains(q.url.as_str()))
    }

    /// Takes the earliest-discovered unvisited URL and marks it visited
    pub fn next_job(&mut self) -> Option<QueuedUrl> {
        if !self.has_budget() {
            return None;
        }

        while let Some(job) = self.frontier.pop_front() {
            if self.visited.insert(job.url.to_string()) {
                self.dispatched += 1;
                return Some(job);
            }
        }
        None
    }

    /// Offers a discovered URL to the frontier
    ///
    /// The URL is normalized and dropped if it is out of scope, already
    /// visited or queued, or deeper than the depth bound. Destructive routes
    /// are never fetched and are listed once among the skipped URLs.
    pub fn offer(&mut self, candidate: &Url, depth: u32, parent: Option<ScreenId>) -> bool {
        let Ok(url) = normalize_parsed(candidate.clone()) else {
            return false;
        };

        match classify_scope(&url, &self.base, &self.scope) {
            ScopeDecision::InScope => {}
            ScopeDecision::Destructive => {
                if self.refused.insert(url.to_string()) {
                    tracing::debug!("Refusing destructive route {}", url);
                    self.skipped.push(SkippedUrl {
                        url: url.to_string(),
                        depth,
                        reason: ScopeDecision::Destructive.reason().to_string(),
                    });
                }
                return false;
            }
            decision => {
                tracing::trace!("Dropping {} ({:?})", url, decision);
                return false;
            }
        }

        let key = url.to_string();
        if self.visited.contains(&key) || self.queued.contains(&key) {
            return false;
        }

        if depth > self.max_depth {
            self.depth_pruned = true;
            return false;
        }

        self.queued.insert(key);
        self.frontier.push_back(QueuedUrl { url, depth, parent });
        true
    }

    /// Classifies a rendered page and, for a new template, creates its screen
    ///
    /// Runs under the same ownership as the visited-set update: the final
    /// URL is marked visited here, before classification. Only content pages
    /// become screens; error and login pages are recorded as skipped.
    pub fn record_render(
        &mut self,
        job: &QueuedUrl,
        page: &RenderedPage,
        structure: StructureDescription,
    ) -> Verdict {
        let Ok(final_url) = normalize_parsed(page.final_url.clone()) else {
            self.record_skipped(job, "final URL could not be normalized".to_string());
            return Verdict::Skip;
        };

        if final_url != job.url {
            if !classify_scope(&final_url, &self.base, &self.scope).should_crawl() {
                self.record_skipped(job, format!("redirected out of scope to {}", final_url));
                return Verdict::Skip;
            }
            if !self.visited.insert(final_url.to_string()) {
                tracing::debug!("{} resolves to already visited {}", job.url, final_url);
                return Verdict::Skip;
            }
        }

        match PageKind::classify(page.status, &route_of(&final_url)) {
            PageKind::Content => {}
            PageKind::Error => {
                tracing::warn!("Skipping {}: HTTP {}", final_url, page.status);
                self.record_skipped(job, format!("HTTP {}", page.status));
                return Verdict::Skip;
            }
            PageKind::Login => {
                tracing::debug!("Skipping login page {}", final_url);
                self.record_skipped(job, "login page".to_string());
                return Verdict::Skip;
            }
        }

        let candidate = ScreenId(self.screens.len());
        let fingerprint = structure.fingerprint();

        match self.templates.classify(&final_url, &fingerprint, candidate) {
            TemplateMatch::Existing {
                key,
                representative,
                renamed_from,
            } => {
                if renamed_from.is_some() {
                    if let Some(screen) = self.screens.get_mut(representative.0) {
                        screen.template = key.clone();
                    }
                }
                tracing::debug!("{} is another instance of {}", final_url, key);
                Verdict::Duplicate(representative)
            }
            TemplateMatch::New { key } => {
                let parent = job.parent.and_then(|id| self.screens.get(id.0));
                let title = screen_title(&page.html, &structure, &final_url);
                let mut nav_path = parent.map(|p| p.nav_path.clone()).unwrap_or_default();
                nav_path.push(title.clone());

                let screen = CrawledScreen {
                    id: candidate,
                    url: final_url.to_string(),
                    title,
                    nav_path,
                    template: key,
                    kind: PageKind::Content,
                    status: page.status,
                    snapshot: None,
                    capture_failed: false,
                    structure,
                    depth: parent.map_or(0, |p| p.depth + 1),
                    parent: parent.map(|p| p.id),
                };
                tracing::info!("New screen {}: {} ({})", screen.id, screen.title, screen.template);
                self.screens.push(screen);
                Verdict::Capture(candidate)
            }
        }
    }

    /// Attaches a snapshot outcome to a captured screen
    pub fn record_snapshot(&mut self, screen: ScreenId, result: Result<SnapshotRef, SnapshotError>) {
        let Some(entry) = self.screens.get_mut(screen.0) else {
            return;
        };
        match result {
            Ok(snapshot) => {
                entry.snapshot = Some(snapshot);
                entry.capture_failed = false;
            }
            Err(e) => {
                tracing::warn!("No snapshot for {}: {}", entry.url, e);
                entry.snapshot = None;
                entry.capture_failed = true;
            }
        }
    }

    pub fn record_fetch_error(&mut self, job: &QueuedUrl, error: &FetchError) {
        tracing::warn!("Skipping {}: {}", job.url, error);
        self.record_skipped(job, error.to_string());
    }

    /// Records a URL that was dispatched but produced no screen
    pub fn record_skipped(&mut self, job: &QueuedUrl, reason: String) {
        self.skipped.push(SkippedUrl {
            url: job.url.to_string(),
            depth: job.depth,
            reason,
        });
    }

    /// Which bound, if any, left work undone
    pub fn truncation(&self, interrupted: Option<TruncationReason>) -> Option<TruncationReason> {
        if interrupted.is_some() {
            return interrupted;
        }
        if !self.has_budget() && self.has_pending() {
            return Some(TruncationReason::PageLimit);
        }
        if self.depth_pruned {
            return Some(TruncationReason::DepthLimit);
        }
        None
    }

    /// Consumes the session into the final inventory
    pub fn finish(
        self,
        started_at: DateTime<Utc>,
        duration_ms: u64,
        interrupted: Option<TruncationReason>,
    ) -> SiteInventory {
        let truncation = self.truncation(interrupted);

        SiteInventory {
            base_url: self.base.to_string(),
            templates: self.templates.templates(),
            screens: self.screens,
            skipped: self.skipped,
            pages_visited: self.dispatched,
            started_at,
            duration_ms,
            truncated: truncation.is_some(),
            truncation,
        }
    }
}

/// Title from `<title>`, else the first `h1`, else a label derived from the route
pub fn screen_title(html: &str, structure: &StructureDescription, url: &Url) -> String {
    page_title(html)
        .or_else(|| {
            structure
                .headings
                .iter()
                .find(|h| h.level == 1)
                .map(|h| h.text.clone())
        })
        .unwrap_or_else(|| route_label(url))
}

/// Human label from the last named route segment: `/user-settings` becomes "User Settings"
pub fn route_label(url: &Url) -> String {
    let route = route_of(url);
    let last = route
        .split(['/', '#', '!'])
        .filter(|s| !s.is_empty() && !s.chars().all(|c| c.is_ascii_digit()))
        .last()
        .map(|s| s.split('?').next().unwrap_or(s));

    let Some(segment) = last.filter(|s| !s.is_empty()) else {
        return "Home".to_string();
    };

    segment
        .split(['-', '_'])
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
