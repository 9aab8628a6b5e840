//! Page fetcher
//!
//! Renders one URL in a browsing context and turns the result into a
//! [`RenderedPage`]. Every failure here is recoverable: the crawler records
//! the URL as skipped and moves on.

use crate::auth::probe::is_login_route;
use crate::browser::{BrowserError, BrowsingContext};
use crate::extract::hyperlinks;
use chrono::{DateTime, Utc};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Recoverable per-page failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("network error: {0}")]
    Network(String),

    #[error("script error: {0}")]
    Script(String),

    #[error("server returned HTTP {0}")]
    HttpStatus(u16),

    #[error("session expired: redirected to login page {0}")]
    LoginRedirect(String),
}

impl From<BrowserError> for FetchError {
    fn from(error: BrowserError) -> Self {
        match error {
            BrowserError::Timeout(after) => FetchError::Timeout(after),
            BrowserError::Navigation(message) | BrowserError::Launch(message) => {
                FetchError::Network(message)
            }
            other => FetchError::Script(other.to_string()),
        }
    }
}

/// Where a navigation target was found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetSource {
    /// An `href` in the rendered DOM
    Hyperlink,
    /// Observed by engaging a control
    Script,
}

/// An outbound navigation candidate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavTarget {
    pub url: Url,
    pub source: TargetSource,
}

/// One rendered page
#[derive(Debug, Clone)]
pub struct RenderedPage {
    /// URL the fetch was asked for
    pub requested: Url,

    /// URL after redirects and client-side routing
    pub final_url: Url,

    pub status: u16,
    pub html: String,
    pub targets: Vec<NavTarget>,
    pub fetched_at: DateTime<Utc>,
}

impl RenderedPage {
    /// Target URLs, hyperlinks first, without duplicates
    pub fn target_urls(&self) -> Vec<Url> {
        let mut seen = std::collections::HashSet::new();
        self.targets
            .iter()
            .filter(|t| seen.insert(t.url.as_str().to_string()))
            .map(|t| t.url.clone())
            .collect()
    }
}

/// Renders pages within a per-page time budget
#[derive(Debug, Clone, Copy)]
pub struct PageFetcher {
    /// Bound on navigate + settle + DOM read
    pub page_timeout: Duration,

    /// Budget for network and DOM activity to quiesce
    pub settle: Duration,
}

impl PageFetcher {
    pub fn new(page_timeout: Duration, settle: Duration) -> Self {
        Self {
            page_timeout,
            settle,
        }
    }

    /// Renders `url` and collects its hyperlink targets
    ///
    /// # Errors
    ///
    /// * `Timeout` - the whole render exceeded `page_timeout`
    /// * `Network` / `Script` - the engine failed
    /// * `HttpStatus` - the server answered with a 5xx status
    /// * `LoginRedirect` - the session no longer reaches protected pages
    pub async fn render<C: BrowsingContext>(
        &self,
        context: &mut C,
        url: &Url,
    ) -> Result<RenderedPage, FetchError> {
        let settle = self.settle;
        let render = async {
            let response = context.navigate(url).await?;
            context.wait_stable(settle).await?;
            // Client-side routers may rewrite the URL after load
            let final_url = context.current_url().await?;
            let html = context.read_dom().await?;
            Ok::<_, BrowserError>((response.status, final_url, html))
        };

        let (status, final_url, html) = tokio::time::timeout(self.page_timeout, render)
            .await
            .map_err(|_| FetchError::Timeout(self.page_timeout))??;

        if status >= 500 {
            return Err(FetchError::HttpStatus(status));
        }

        if is_login_route(&final_url) && !is_login_route(url) {
            return Err(FetchError::LoginRedirect(final_url.to_string()));
        }

        let targets = hyperlinks(&html, &final_url)
            .into_iter()
            .map(|url| NavTarget {
                url,
                source: TargetSource::Hyperlink,
            })
            .collect();

        Ok(RenderedPage {
            requested: url.clone(),
            final_url,
            status,
            html,
            targets,
            fetched_at: Utc::now(),
        })
    }
}
