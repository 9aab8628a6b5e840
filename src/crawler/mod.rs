//! Crawler module for screen discovery
//!
//! This module contains the core crawling logic, including:
//! - Page rendering with a per-page time budget
//! - Script-driven navigation discovery through scoped probes
//! - URL template inference and structural deduplication
//! - Worker pool coordination around a single-owner crawl session

mod coordinator;
mod fetcher;
mod probe;
mod session;
mod template;
mod triggers;
mod worker;

pub use coordinator::{CrawlCanceller, SiteCrawler};
pub use fetcher::{FetchError, NavTarget, PageFetcher, RenderedPage, TargetSource};
pub use probe::{discover_script_targets, Probe};
pub use session::{route_label, screen_title, CrawlSession, QueuedUrl, Verdict};
pub use template::{TemplateMatch, TemplateRegistry};
pub use triggers::{find_triggers, Trigger};
pub use worker::{CaptureReport, WorkerEvent};
