//! Browser automation seam
//!
//! The crawler never talks to a particular browser. It drives a
//! [`BrowserEngine`], which opens one [`BrowsingContext`] per worker. Two
//! engines ship with the crate:
//!
//! - [`HttpEngine`]: fetches server-rendered HTML with reqwest and resolves
//!   declarative navigation hints. It cannot paint pixels.
//! - `ChromeEngine` (feature `chrome`): drives headless Chromium, executes
//!   scripts, clicks real elements and captures screenshots.

#[cfg(feature = "chrome")]
mod chrome;
mod http;

use crate::auth::AuthDescriptor;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use url::Url;

#[cfg(feature = "chrome")]
pub use chrome::{ChromeEngine, ChromeSettings};
pub use http::{HttpContext, HttpEngine, HttpSettings};

/// Errors raised by a browser engine
#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("Failed to open browsing context: {0}")]
    Launch(String),

    #[error("Navigation failed: {0}")]
    Navigation(String),

    #[error("Navigation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Script error: {0}")]
    Script(String),

    #[error("No element matches selector {0}")]
    ElementNotFound(String),

    #[error("Capture failed: {0}")]
    Capture(String),

    #[error("The {engine} engine does not support {operation}")]
    Unsupported {
        engine: &'static str,
        operation: &'static str,
    },
}

/// Result of a top-level navigation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationResponse {
    /// URL after redirects
    pub final_url: Url,

    /// HTTP status of the main document
    pub status: u16,
}

/// What engaging an element did to the page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationOutcome {
    /// The document was replaced by a navigation to this URL
    Navigated(Url),

    /// The URL changed through the history API or the hash, without a document load
    HistoryChanged(Url),

    /// Nothing observable happened to the URL or history
    Unchanged,
}

impl NavigationOutcome {
    /// The URL the engagement led to, if any
    pub fn target(&self) -> Option<&Url> {
        match self {
            Self::Navigated(url) | Self::HistoryChanged(url) => Some(url),
            Self::Unchanged => None,
        }
    }
}

/// A rendering engine that can open isolated browsing contexts
#[async_trait]
pub trait BrowserEngine: Send + Sync {
    type Context: BrowsingContext;

    /// Short engine name used in logs and error messages
    fn name(&self) -> &'static str;

    /// Opens a context whose every request carries the given credentials
    async fn open_context(
        &self,
        auth: Option<&AuthDescriptor>,
    ) -> Result<Self::Context, BrowserError>;
}

/// One browsing context, owned by exactly one worker
#[async_trait]
pub trait BrowsingContext: Send + 'static {
    async fn navigate(&mut self, url: &Url) -> Result<NavigationResponse, BrowserError>;

    /// Waits until network and DOM activity quiesce or `budget` elapses
    async fn wait_stable(&mut self, budget: Duration) -> Result<(), BrowserError>;

    async fn current_url(&mut self) -> Result<Url, BrowserError>;

    /// Serializes the rendered DOM
    async fn read_dom(&mut self) -> Result<String, BrowserError>;

    /// Clicks the element matching `selector` and reports the URL effect
    async fn engage(&mut self, selector: &str) -> Result<NavigationOutcome, BrowserError>;

    /// Captures the rendered page as PNG bytes
    async fn capture(&mut self) -> Result<Vec<u8>, BrowserError>;

    async fn close(&mut self) -> Result<(), BrowserError>;
}

/// True if `a` and `b` differ only in their fragment
pub fn same_document(a: &Url, b: &Url) -> bool {
    let mut a = a.clone();
    let mut b = b.clone();
    a.set_fragment(None);
    b.set_fragment(None);
    a == b
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_document() {
        let a = Url::parse("https://app.example.com/app#/users").unwrap();
        let b = Url::parse("https://app.example.com/app#/settings").unwrap();
        let c = Url::parse("https://app.example.com/other").unwrap();
        assert!(same_document(&a, &b));
        assert!(!same_document(&a, &c));
    }

    #[test]
    fn test_outcome_target() {
        let url = Url::parse("https://app.example.com/x").unwrap();
        assert_eq!(
            NavigationOutcome::Navigated(url.clone()).target(),
            Some(&url)
        );
        assert_eq!(NavigationOutcome::Unchanged.target(), None);
    }
}
