//! Fetch workers
//!
//! A worker owns one browsing context for the whole crawl. It pulls jobs from
//! its own channel, renders them, and asks the coordinator what to do with
//! each page before spending time on snapshots and probes.

use crate::browser::BrowsingContext;
use crate::crawler::fetcher::{FetchError, NavTarget, PageFetcher, RenderedPage, TargetSource};
use crate::crawler::probe::discover_script_targets;
use crate::crawler::session::{QueuedUrl, Verdict};
use crate::crawler::triggers::find_triggers;
use crate::extract::{extract_structure, StructureDescription};
use crate::inventory::ScreenId;
use crate::snapshot::{store_snapshot, SnapshotError, SnapshotRef, SnapshotSettings, SnapshotStore};
use crate::url::route_of;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use url::Url;

/// Messages from workers to the coordinator
#[derive(Debug)]
pub enum WorkerEvent {
    /// A page rendered; the worker waits for a verdict on `reply`
    Rendered {
        worker: usize,
        job: QueuedUrl,
        page: RenderedPage,
        structure: StructureDescription,
        reply: oneshot::Sender<Verdict>,
    },

    /// The job is done; `capture` is set when the page became a screen
    Finished {
        worker: usize,
        job: QueuedUrl,
        capture: Option<CaptureReport>,
    },

    /// The page could not be rendered
    Failed {
        worker: usize,
        job: QueuedUrl,
        error: FetchError,
    },

    /// The worker stopped, normally or by panicking
    Exited { worker: usize },
}

/// Reports the worker's exit when dropped, including during a panic unwind
struct ExitNotice {
    worker: usize,
    events: mpsc::UnboundedSender<WorkerEvent>,
}

impl Drop for ExitNotice {
    fn drop(&mut self) {
        let _ = self.events.send(WorkerEvent::Exited {
            worker: self.worker,
        });
    }
}

/// Snapshot and script-navigation results for a new screen
#[derive(Debug)]
pub struct CaptureReport {
    pub screen: ScreenId,
    pub snapshot: Result<SnapshotRef, SnapshotError>,
    pub discovered: Vec<NavTarget>,
}

/// Settings shared by every worker
#[derive(Clone)]
pub struct WorkerSettings {
    pub fetcher: PageFetcher,
    pub snapshot: SnapshotSettings,
    pub max_probes: usize,
    pub store: Arc<dyn SnapshotStore>,
}

pub struct Worker<C: BrowsingContext> {
    index: usize,
    context: C,
    jobs: mpsc::Receiver<QueuedUrl>,
    events: mpsc::UnboundedSender<WorkerEvent>,
    settings: WorkerSettings,
}

impl<C: BrowsingContext> Worker<C> {
    pub fn new(
        index: usize,
        context: C,
        jobs: mpsc::Receiver<QueuedUrl>,
        events: mpsc::UnboundedSender<WorkerEvent>,
        settings: WorkerSettings,
    ) -> Self {
        Self {
            index,
            context,
            jobs,
            events,
            settings,
        }
    }

    /// Processes jobs until the job channel closes, then closes the context
    pub async fn run(mut self) -> usize {
        let _notice = ExitNotice {
            worker: self.index,
            events: self.events.clone(),
        };

        while let Some(job) = self.jobs.recv().await {
            if self.process(job).await.is_err() {
                break;
            }
        }

        if let Err(e) = self.context.close().await {
            tracing::debug!("Worker {} failed to close its context: {}", self.index, e);
        }
        self.index
    }

    /// Returns Err only when the coordinator has gone away
    async fn process(&mut self, job: QueuedUrl) -> Result<(), ()> {
        tracing::debug!("Worker {} fetching {} (depth {})", self.index, job.url, job.depth);

        let page = match self.settings.fetcher.render(&mut self.context, &job.url).await {
            Ok(page) => page,
            Err(error) => {
                return self.send(WorkerEvent::Failed {
                    worker: self.index,
                    job,
                    error,
                });
            }
        };

        let structure = extract_structure(&page);
        let origin = page.final_url.clone();
        let html = page.html.clone();

        let (reply, verdict) = oneshot::channel();
        self.send(WorkerEvent::Rendered {
            worker: self.index,
            job: job.clone(),
            page,
            structure,
            reply,
        })?;

        let capture = match verdict.await.map_err(|_| ())? {
            Verdict::Capture(screen) => Some(self.capture(screen, &origin, &html).await),
            Verdict::Duplicate(_) | Verdict::Skip => None,
        };

        self.send(WorkerEvent::Finished {
            worker: self.index,
            job,
            capture,
        })
    }

    /// Captures the pristine page, then probes its controls
    async fn capture(&mut self, screen: ScreenId, origin: &Url, html: &str) -> CaptureReport {
        let snapshot = self.snapshot(origin).await;

        let triggers = find_triggers(html, self.settings.max_probes);
        let settle = self.settings.fetcher.settle;
        let probing = discover_script_targets(&mut self.context, origin, &triggers, settle);

        let discovered = match tokio::time::timeout(self.settings.fetcher.page_timeout, probing).await {
            Ok(urls) => urls,
            Err(_) => {
                tracing::warn!("Probing {} exceeded the page timeout", origin);
                Vec::new()
            }
        };

        CaptureReport {
            screen,
            snapshot,
            discovered: discovered
                .into_iter()
                .map(|url| NavTarget {
                    url,
                    source: TargetSource::Script,
                })
                .collect(),
        }
    }

    async fn snapshot(&mut self, origin: &Url) -> Result<SnapshotRef, SnapshotError> {
        let raw = match tokio::time::timeout(self.settings.fetcher.page_timeout, self.context.capture()).await {
            Ok(Ok(raw)) => raw,
            Ok(Err(e)) => return Err(SnapshotError::Capture(e.to_string())),
            Err(_) => return Err(SnapshotError::Capture("capture timed out".to_string())),
        };

        let store = Arc::clone(&self.settings.store);
        let settings = self.settings.snapshot;
        let route = route_of(origin);

        tokio::task::spawn_blocking(move || store_snapshot(&raw, &settings, &route, store.as_ref()))
            .await
            .map_err(|e| SnapshotError::Encode(format!("encoder task failed: {}", e)))?
    }

    fn send(&self, event: WorkerEvent) -> Result<(), ()> {
        self.events.send(event).map_err(|_| ())
    }
}
