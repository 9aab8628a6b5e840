//! Crawler coordinator - main crawl orchestration logic
//!
//! The coordinator owns the [`CrawlSession`] and a pool of fetch workers.
//! Workers only talk to it through channels, so every frontier, visited-set
//! and template update happens on this one task. The loop:
//! - Validates the session through the auth probe
//! - Hands the earliest-discovered URL to each idle worker
//! - Classifies rendered pages and feeds their targets back to the frontier
//! - Stops dispatching on deadline or cancellation, drains, and emits

use crate::auth;
use crate::browser::BrowserEngine;
use crate::config::CrawlConfig;
use crate::crawler::fetcher::PageFetcher;
use crate::crawler::session::{CrawlSession, QueuedUrl, Verdict};
use crate::crawler::worker::{Worker, WorkerEvent, WorkerSettings};
use crate::inventory::{SiteInventory, TruncationReason};
use crate::snapshot::SnapshotStore;
use crate::url::normalize_parsed;
use crate::AtlasError;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;

/// Handle that aborts a running crawl
///
/// Cancelling stops dispatch of new pages; pages already in flight finish
/// and the crawl still returns a (truncated) inventory.
#[derive(Debug, Clone)]
pub struct CrawlCanceller {
    tx: Arc<watch::Sender<bool>>,
}

impl CrawlCanceller {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Crawls one application through a browser engine
pub struct SiteCrawler<E: BrowserEngine> {
    engine: E,
    config: CrawlConfig,
    store: Arc<dyn SnapshotStore>,
    cancel: Arc<watch::Sender<bool>>,
}

impl<E: BrowserEngine> SiteCrawler<E> {
    /// Creates a new crawler
    ///
    /// # Arguments
    ///
    /// * `engine` - Engine that opens one browsing context per worker
    /// * `config` - Bounds, scope, credentials and snapshot settings
    /// * `store` - Destination for encoded snapshots
    pub fn new(engine: E, config: CrawlConfig, store: Arc<dyn SnapshotStore>) -> Self {
        let (tx, _rx) = watch::channel(false);
        Self {
            engine,
            config,
            store,
            cancel: Arc::new(tx),
        }
    }

    pub fn config(&self) -> &CrawlConfig {
        &self.config
    }

    pub fn canceller(&self) -> CrawlCanceller {
        CrawlCanceller {
            tx: Arc::clone(&self.cancel),
        }
    }

    /// Runs the crawl to completion
    ///
    /// # Returns
    ///
    /// * `Ok(SiteInventory)` - The inventory, possibly truncated by a bound,
    ///   the deadline or cancellation
    /// * `Err(AtlasError::Auth)` - The pre-crawl auth check failed; nothing
    ///   was crawled
    /// * `Err(AtlasError)` - The base URL is invalid or no browsing context
    ///   could be opened
    pub async fn crawl(&self) -> Result<SiteInventory, AtlasError> {
        let started_at = Utc::now();
        let clock = Instant::now();
        let config = &self.config;

        let base = normalize_parsed(config.base_url.clone())?;
        let mut session = CrawlSession::new(base.clone(), config);
        let mut cancel = self.cancel.subscribe();

        if *cancel.borrow() {
            tracing::warn!("Crawl cancelled before it started");
            return Ok(session.finish(started_at, 0, Some(TruncationReason::Cancelled)));
        }

        tracing::info!(
            "Starting crawl of {} (max {} pages, depth {}, {} workers, engine {})",
            base,
            config.max_pages,
            config.max_depth,
            config.workers,
            self.engine.name()
        );

        let first = auth::establish(
            &self.engine,
            config.auth.as_ref(),
            &base,
            config.page_timeout,
            config.settle,
        )
        .await?;

        let mut contexts = vec![first];
        for index in 1..config.workers.max(1) {
            match self.engine.open_context(config.auth.as_ref()).await {
                Ok(context) => contexts.push(context),
                Err(e) => {
                    tracing::warn!(
                        "Could not open browsing context {}: {}; continuing with {} workers",
                        index,
                        e,
                        contexts.len()
                    );
                    break;
                }
            }
        }

        let settings = WorkerSettings {
            fetcher: PageFetcher::new(config.page_timeout, config.settle),
            snapshot: config.snapshot,
            max_probes: config.max_probes_per_page,
            store: Arc::clone(&self.store),
        };

        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let mut workers = JoinSet::new();
        let mut pool = WorkerPool::default();
        for (index, context) in contexts.into_iter().enumerate() {
            let (jobs_tx, jobs_rx) = mpsc::channel(1);
            let worker = Worker::new(index, context, jobs_rx, events_tx.clone(), settings.clone());
            workers.spawn(worker.run());
            pool.add(index, jobs_tx);
        }
        drop(events_tx);

        let deadline = config
            .deadline
            .map(|budget| tokio::time::Instant::now() + budget);
        let mut interrupted: Option<TruncationReason> = None;
        let mut cancel_open = true;
        let mut completed: u64 = 0;

        loop {
            if interrupted.is_none() {
                pool.dispatch(&mut session);
            }
            if pool.is_drained() {
                break;
            }

            let expiry = async {
                match deadline {
                    Some(at) => tokio::time::sleep_until(at).await,
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                event = events_rx.recv() => {
                    let Some(event) = event else {
                        break;
                    };
                    if pool.apply(event, &mut session) {
                        completed += 1;
                        if completed % 10 == 0 {
                            let rate = completed as f64 / clock.elapsed().as_secs_f64();
                            tracing::info!(
                                "Progress: {} pages crawled, {} in frontier, {:.2} pages/sec",
                                completed,
                                session.frontier_len(),
                                rate
                            );
                        }
                    }
                }
                _ = expiry, if interrupted.is_none() => {
                    tracing::warn!("Crawl deadline reached; draining {} in-flight pages", pool.in_flight());
                    interrupted = Some(TruncationReason::Deadline);
                }
                changed = cancel.changed(), if interrupted.is_none() && cancel_open => {
                    match changed {
                        Ok(()) if *cancel.borrow() => {
                            tracing::warn!("Crawl cancelled; draining {} in-flight pages", pool.in_flight());
                            interrupted = Some(TruncationReason::Cancelled);
                        }
                        Ok(()) => {}
                        Err(_) => cancel_open = false,
                    }
                }
            }
        }

        pool.shutdown();
        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                tracing::error!("Worker task failed: {}", e);
            }
        }

        let duration_ms = u64::try_from(clock.elapsed().as_millis()).unwrap_or(u64::MAX);
        let inventory = session.finish(started_at, duration_ms, interrupted);

        tracing::info!(
            "Crawl completed: {} screens from {} pages in {:?}",
            inventory.total_screens(),
            inventory.pages_visited,
            clock.elapsed()
        );
        if let Some(reason) = inventory.truncation {
            tracing::warn!("Inventory is truncated ({})", reason.as_str());
        }

        Ok(inventory)
    }
}

/// Job channels of the live workers and what each one is doing
#[derive(Default)]
struct WorkerPool {
    senders: HashMap<usize, mpsc::Sender<QueuedUrl>>,
    idle: Vec<usize>,
    busy: HashMap<usize, QueuedUrl>,
}

impl WorkerPool {
    fn add(&mut self, worker: usize, jobs: mpsc::Sender<QueuedUrl>) {
        self.senders.insert(worker, jobs);
        // Reversed so the lowest index is handed work first
        self.idle.insert(0, worker);
    }

    fn in_flight(&self) -> usize {
        self.busy.len()
    }

    /// True when nothing is in flight, so no event can change the frontier
    fn is_drained(&self) -> bool {
        self.busy.is_empty()
    }

    /// Hands frontier URLs to idle workers
    fn dispatch(&mut self, session: &mut CrawlSession) {
        while let Some(&worker) = self.idle.last() {
            let Some(sender) = self.senders.get(&worker) else {
                self.idle.pop();
                continue;
            };
            let Some(job) = session.next_job() else {
                return;
            };

            self.idle.pop();
            match sender.try_send(job.clone()) {
                Ok(()) => {
                    self.busy.insert(worker, job);
                }
                Err(_) => {
                    tracing::warn!("Worker {} is gone; dropping {}", worker, job.url);
                    self.senders.remove(&worker);
                    session.record_skipped(&job, "worker unavailable".to_string());
                }
            }
        }
    }

    /// Applies one worker event; returns true when a page completed
    fn apply(&mut self, event: WorkerEvent, session: &mut CrawlSession) -> bool {
        match event {
            WorkerEvent::Rendered {
                job,
                page,
                structure,
                reply,
                ..
            } => {
                let verdict = session.record_render(&job, &page, structure);
                let parent = match verdict {
                    Verdict::Capture(screen) | Verdict::Duplicate(screen) => Some(screen),
                    Verdict::Skip => None,
                };
                if parent.is_some() {
                    for url in page.target_urls() {
                        session.offer(&url, job.depth + 1, parent);
                    }
                }
                if reply.send(verdict).is_err() {
                    tracing::debug!("Worker stopped before the verdict on {}", job.url);
                }
                false
            }

            WorkerEvent::Finished {
                worker,
                job,
                capture,
            } => {
                self.release(worker);
                if let Some(report) = capture {
                    session.record_snapshot(report.screen, report.snapshot);
                    for target in report.discovered {
                        session.offer(&target.url, job.depth + 1, Some(report.screen));
                    }
                }
                true
            }

            WorkerEvent::Failed { worker, job, error } => {
                self.release(worker);
                session.record_fetch_error(&job, &error);
                true
            }

            WorkerEvent::Exited { worker } => {
                self.senders.remove(&worker);
                self.idle.retain(|&w| w != worker);
                match self.busy.remove(&worker) {
                    Some(job) => {
                        tracing::error!("Worker {} stopped while fetching {}", worker, job.url);
                        session.record_skipped(&job, "worker stopped unexpectedly".to_string());
                        true
                    }
                    None => false,
                }
            }
        }
    }

    fn release(&mut self, worker: usize) {
        if self.busy.remove(&worker).is_some() && self.senders.contains_key(&worker) {
            self.idle.push(worker);
        }
    }

    /// Closes every job channel so workers close their contexts and exit
    fn shutdown(&mut self) {
        self.senders.clear();
        self.idle.clear();
    }
}
