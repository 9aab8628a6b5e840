//! In-memory fixture application for scenario tests
//!
//! A [`FixtureSite`] maps routes (`/items/1`, `/#/settings`) to HTML, with
//! optional redirects, an auth requirement, scripted control engagements and
//! per-route capture failures. [`FixtureEngine`] serves it through the
//! browser traits so the real crawler can run against it.

#![allow(dead_code)]

use async_trait::async_trait;
use screen_atlas::auth::AuthDescriptor;
use screen_atlas::browser::{
    same_document, BrowserEngine, BrowserError, BrowsingContext, NavigationOutcome,
    NavigationResponse,
};
use screen_atlas::crawler::SiteCrawler;
use screen_atlas::snapshot::{MemorySnapshotStore, SnapshotStore};
use screen_atlas::url::route_of;
use screen_atlas::{AtlasError, CrawlConfig, SiteInventory};
use std::collections::{HashMap, HashSet};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;

pub const BASE: &str = "https://fixture.test/";

pub fn base_url() -> Url {
    Url::parse(BASE).unwrap()
}

pub fn url(route: &str) -> Url {
    base_url().join(route).unwrap()
}

/// A complete HTML document
pub fn html(title: &str, body: &str) -> String {
    format!(
        "<html><head><title>{}</title></head><body>{}</body></html>",
        title, body
    )
}

/// Crawl settings tuned for the fixture: no settle time, short timeouts
pub fn config(max_pages: u32, max_depth: u32) -> CrawlConfig {
    let mut config = CrawlConfig::new(base_url());
    config.max_pages = max_pages;
    config.max_depth = max_depth;
    config.page_timeout = Duration::from_secs(5);
    config.settle = Duration::ZERO;
    config
}

struct FixturePage {
    status: u16,
    html: String,
}

#[derive(Default)]
pub struct FixtureSite {
    pages: HashMap<String, FixturePage>,
    redirects: HashMap<String, String>,
    engagements: HashMap<(String, String), String>,
    failing_captures: HashSet<String>,
    requires_auth: bool,
    latency: Duration,

    fetches: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    contexts_opened: AtomicUsize,
}

impl FixtureSite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(self, route: &str, html: impl Into<String>) -> Self {
        self.page_with_status(route, 200, html)
    }

    pub fn page_with_status(mut self, route: &str, status: u16, html: impl Into<String>) -> Self {
        self.pages.insert(
            route.to_string(),
            FixturePage {
                status,
                html: html.into(),
            },
        );
        self
    }

    pub fn redirect(mut self, from: &str, to: &str) -> Self {
        self.redirects.insert(from.to_string(), to.to_string());
        self
    }

    /// Engaging `selector` on the page at `origin` moves to `target`
    pub fn engage(mut self, origin: &str, selector: &str, target: &str) -> Self {
        self.engagements
            .insert((origin.to_string(), selector.to_string()), target.to_string());
        self
    }

    pub fn failing_capture(mut self, route: &str) -> Self {
        self.failing_captures.insert(route.to_string());
        self
    }

    /// Contexts opened without credentials are redirected to `/login`
    pub fn requires_auth(mut self) -> Self {
        self.requires_auth = true;
        self
    }

    /// Delay applied to every navigation
    pub fn latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// URLs passed to `navigate`, in call order
    pub fn fetches(&self) -> Vec<String> {
        self.fetches.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn contexts_opened(&self) -> usize {
        self.contexts_opened.load(Ordering::SeqCst)
    }

    fn resolve(&self, route: &str, authenticated: bool) -> Result<(Url, u16, String), BrowserError> {
        let mut route = route.to_string();
        let mut hops = 0;
        while let Some(next) = self.redirects.get(&route) {
            hops += 1;
            if hops > 10 {
                return Err(BrowserError::Navigation("redirect loop".to_string()));
            }
            route = next.clone();
        }

        if self.requires_auth && !authenticated && !route.starts_with("/login") {
            route = "/login".to_string();
        }

        let (status, html) = match self.pages.get(&route) {
            Some(page) => (page.status, page.html.clone()),
            None => (404, html("Not Found", "<h1>Not Found</h1>")),
        };
        Ok((url(&route), status, html))
    }
}

#[derive(Clone)]
pub struct FixtureEngine {
    site: Arc<FixtureSite>,
}

impl FixtureEngine {
    pub fn new(site: FixtureSite) -> Self {
        Self {
            site: Arc::new(site),
        }
    }

    pub fn site(&self) -> &FixtureSite {
        &self.site
    }
}

#[async_trait]
impl BrowserEngine for FixtureEngine {
    type Context = FixtureContext;

    fn name(&self) -> &'static str {
        "fixture"
    }

    async fn open_context(
        &self,
        auth: Option<&AuthDescriptor>,
    ) -> Result<FixtureContext, BrowserError> {
        self.site.contexts_opened.fetch_add(1, Ordering::SeqCst);
        Ok(FixtureContext {
            site: Arc::clone(&self.site),
            authenticated: auth.is_some(),
            current: None,
            html: String::new(),
        })
    }
}

pub struct FixtureContext {
    site: Arc<FixtureSite>,
    authenticated: bool,
    current: Option<Url>,
    html: String,
}

impl FixtureContext {
    fn current(&self) -> Result<Url, BrowserError> {
        self.current
            .clone()
            .ok_or_else(|| BrowserError::Navigation("no page loaded".to_string()))
    }
}

#[async_trait]
impl BrowsingContext for FixtureContext {
    async fn navigate(&mut self, target: &Url) -> Result<NavigationResponse, BrowserError> {
        let site = Arc::clone(&self.site);
        site.fetches.lock().unwrap().push(target.to_string());

        let now = site.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        site.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !site.latency.is_zero() {
            tokio::time::sleep(site.latency).await;
        }
        site.in_flight.fetch_sub(1, Ordering::SeqCst);

        let (final_url, status, html) = site.resolve(&route_of(target), self.authenticated)?;
        self.current = Some(final_url.clone());
        self.html = html;
        Ok(NavigationResponse { final_url, status })
    }

    async fn wait_stable(&mut self, _budget: Duration) -> Result<(), BrowserError> {
        Ok(())
    }

    async fn current_url(&mut self) -> Result<Url, BrowserError> {
        self.current()
    }

    async fn read_dom(&mut self) -> Result<String, BrowserError> {
        self.current()?;
        Ok(self.html.clone())
    }

    async fn engage(&mut self, selector: &str) -> Result<NavigationOutcome, BrowserError> {
        let current = self.current()?;
        let key = (route_of(&current), selector.to_string());
        let Some(target) = self.site.engagements.get(&key).cloned() else {
            return Ok(NavigationOutcome::Unchanged);
        };

        let target = url(&target);
        if same_document(&target, &current) {
            let (final_url, _, html) = self.site.resolve(&route_of(&target), self.authenticated)?;
            self.current = Some(final_url.clone());
            self.html = html;
            return Ok(NavigationOutcome::HistoryChanged(final_url));
        }

        let response = self.navigate(&target).await?;
        Ok(NavigationOutcome::Navigated(response.final_url))
    }

    async fn capture(&mut self) -> Result<Vec<u8>, BrowserError> {
        let route = route_of(&self.current()?);
        if self.site.failing_captures.contains(&route) {
            return Err(BrowserError::Capture("compositor unavailable".to_string()));
        }
        Ok(fixture_png(&route))
    }

    async fn close(&mut self) -> Result<(), BrowserError> {
        self.current = None;
        Ok(())
    }
}

/// A small PNG whose color depends only on the route
pub fn fixture_png(route: &str) -> Vec<u8> {
    let shade = route.bytes().fold(0u8, |acc, b| acc.wrapping_add(b));
    let image = image::RgbImage::from_pixel(32, 20, image::Rgb([shade, 128, 255 - shade]));
    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgb8(image)
        .write_to(&mut Cursor::new(&mut bytes), image::ImageOutputFormat::Png)
        .unwrap();
    bytes
}

/// Crawls the fixture with an in-memory snapshot store
pub async fn crawl(
    engine: &FixtureEngine,
    config: CrawlConfig,
) -> (Result<SiteInventory, AtlasError>, Arc<MemorySnapshotStore>) {
    let store = Arc::new(MemorySnapshotStore::new());
    let crawler = SiteCrawler::new(
        engine.clone(),
        config,
        Arc::clone(&store) as Arc<dyn SnapshotStore>,
    );
    (crawler.crawl().await, store)
}

/// Checks the structural invariants every inventory must satisfy
pub fn assert_inventory_invariants(inventory: &SiteInventory, max_pages: u32) {
    assert!(inventory.pages_visited <= max_pages);
    assert!(inventory.templates.len() <= inventory.pages_visited as usize);

    let mut urls = HashSet::new();
    for (index, screen) in inventory.screens.iter().enumerate() {
        assert_eq!(screen.id.0, index);
        assert!(urls.insert(screen.url.clone()), "{} captured twice", screen.url);

        match screen.parent {
            Some(parent) => {
                let parent = inventory
                    .screen(parent)
                    .unwrap_or_else(|| panic!("parent of {} missing", screen.url));
                assert_eq!(screen.depth, parent.depth + 1);
                assert!(parent.id.0 < screen.id.0);
            }
            None => assert_eq!(screen.depth, 0),
        }
    }

    for template in &inventory.templates {
        assert!(inventory.screen(template.representative).is_some());
        assert!(template.instances >= 1);
    }
}
