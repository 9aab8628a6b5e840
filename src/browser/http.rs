//! Static HTML engine
//!
//! Renders pages by fetching the server's HTML with reqwest. Scripts are not
//! executed, so script-driven navigation is only visible through declarative
//! hints (`data-href`, inline `onclick` targets) resolved by [`navigation_hint`].

use crate::auth::AuthDescriptor;
use crate::browser::{
    same_document, BrowserEngine, BrowserError, BrowsingContext, NavigationOutcome,
    NavigationResponse,
};
use crate::extract::navigation_hint;
use async_trait::async_trait;
use reqwest::{redirect::Policy, Client};
use scraper::{Html, Selector};
use std::time::Duration;
use url::Url;

/// Maximum redirect hops followed per navigation
const MAX_REDIRECTS: usize = 10;

/// Settings for [`HttpEngine`]
#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub user_agent: String,
    pub timeout: Duration,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            user_agent: format!("screen-atlas/{}", env!("CARGO_PKG_VERSION")),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Engine that renders server-side HTML over plain HTTP
#[derive(Debug, Clone, Default)]
pub struct HttpEngine {
    settings: HttpSettings,
}

impl HttpEngine {
    pub fn new(settings: HttpSettings) -> Self {
        Self { settings }
    }
}

/// Builds the HTTP client used by one context
///
/// # Arguments
///
/// * `settings` - User agent and request timeout
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
fn build_http_client(settings: &HttpSettings) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(settings.user_agent.as_str())
        .timeout(settings.timeout)
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(MAX_REDIRECTS))
        .gzip(true)
        .brotli(true)
        .build()
}

#[async_trait]
impl BrowserEngine for HttpEngine {
    type Context = HttpContext;

    fn name(&self) -> &'static str {
        "http"
    }

    async fn open_context(
        &self,
        auth: Option<&AuthDescriptor>,
    ) -> Result<HttpContext, BrowserError> {
        let client =
            build_http_client(&self.settings).map_err(|e| BrowserError::Launch(e.to_string()))?;

        Ok(HttpContext {
            client,
            auth: auth.cloned(),
            timeout: self.settings.timeout,
            current: None,
            html: String::new(),
        })
    }
}

/// A browsing context of the [`HttpEngine`]
pub struct HttpContext {
    client: Client,
    auth: Option<AuthDescriptor>,
    timeout: Duration,
    current: Option<Url>,
    html: String,
}

impl HttpContext {
    fn current(&self) -> Result<&Url, BrowserError> {
        self.current
            .as_ref()
            .ok_or_else(|| BrowserError::Navigation("no page loaded".to_string()))
    }

    /// Target declared by the first element matching `selector`
    fn declared_target(&self, selector: &str) -> Result<Option<String>, BrowserError> {
        let parsed = Selector::parse(selector)
            .map_err(|_| BrowserError::ElementNotFound(selector.to_string()))?;
        let document = Html::parse_document(&self.html);
        let element = document
            .select(&parsed)
            .next()
            .ok_or_else(|| BrowserError::ElementNotFound(selector.to_string()))?;

        Ok(navigation_hint(element).or_else(|| {
            (element.value().name() == "a")
                .then(|| element.value().attr("href").map(str::to_string))
                .flatten()
        }))
    }
}

#[async_trait]
impl BrowsingContext for HttpContext {
    async fn navigate(&mut self, url: &Url) -> Result<NavigationResponse, BrowserError> {
        let mut request = self.client.get(url.as_str());
        if let Some(auth) = &self.auth {
            for (name, value) in auth.request_headers(url) {
                request = request.header(name, value);
            }
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                BrowserError::Timeout(self.timeout)
            } else {
                BrowserError::Navigation(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        let mut final_url = response.url().clone();
        // Fragments never reach the server; carry the requested one over
        if final_url.fragment().is_none() && url.fragment().is_some() && same_document(&final_url, url)
        {
            final_url.set_fragment(url.fragment());
        }

        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                BrowserError::Timeout(self.timeout)
            } else {
                BrowserError::Navigation(e.to_string())
            }
        })?;

        self.html = body;
        self.current = Some(final_url.clone());

        Ok(NavigationResponse { final_url, status })
    }

    async fn wait_stable(&mut self, _budget: Duration) -> Result<(), BrowserError> {
        // Static HTML is stable once the body has been read
        Ok(())
    }

    async fn current_url(&mut self) -> Result<Url, BrowserError> {
        self.current().cloned()
    }

    async fn read_dom(&mut self) -> Result<String, BrowserError> {
        self.current()?;
        Ok(self.html.clone())
    }

    async fn engage(&mut self, selector: &str) -> Result<NavigationOutcome, BrowserError> {
        let current = self.current()?.clone();

        let Some(hint) = self.declared_target(selector)? else {
            return Ok(NavigationOutcome::Unchanged);
        };
        let target = current
            .join(&hint)
            .map_err(|e| BrowserError::Script(format!("bad navigation target {}: {}", hint, e)))?;

        if target == current {
            return Ok(NavigationOutcome::Unchanged);
        }

        if same_document(&target, &current) {
            self.current = Some(target.clone());
            return Ok(NavigationOutcome::HistoryChanged(target));
        }

        let response = self.navigate(&target).await?;
        Ok(NavigationOutcome::Navigated(response.final_url))
    }

    async fn capture(&mut self) -> Result<Vec<u8>, BrowserError> {
        Err(BrowserError::Unsupported {
            engine: "http",
            operation: "pixel capture",
        })
    }

    async fn close(&mut self) -> Result<(), BrowserError> {
        self.current = None;
        self.html.clear();
        Ok(())
    }
}
