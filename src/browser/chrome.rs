//! Headless Chromium engine
//!
//! headless_chrome is synchronous, so every call runs on the blocking pool.
//! One Chromium process serves the whole crawl; each context is one tab.

use crate::auth::{AuthCookie, AuthDescriptor};
use crate::browser::{
    same_document, BrowserEngine, BrowserError, BrowsingContext, NavigationOutcome,
    NavigationResponse,
};
use crate::extract::HIDDEN_MARKER;
use async_trait::async_trait;
use headless_chrome::browser::tab::RequestPausedDecision;
use headless_chrome::protocol::cdp::Fetch::{
    events::RequestPausedEvent, ContinueRequest, RequestPattern, RequestStage,
};
use headless_chrome::protocol::cdp::Network::CookieParam;
use headless_chrome::protocol::cdp::Page::CaptureScreenshotFormatOption;
use headless_chrome::{Browser, LaunchOptions, Tab};
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};
use url::Url;

/// Quiet period required before a page counts as stable
const QUIET_WINDOW: Duration = Duration::from_millis(500);
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Time given to script handlers after a click
const ENGAGE_SETTLE: Duration = Duration::from_millis(300);

const INSTALL_OBSERVER: &str = r#"(() => {
    if (window.__atlasMutations === undefined) {
        window.__atlasMutations = 0;
        new MutationObserver(m => { window.__atlasMutations += m.length; })
            .observe(document, { subtree: true, childList: true, attributes: true, characterData: true });
    }
    return true;
})()"#;

const ACTIVITY_PROBE: &str = r#"(() => [
    window.__atlasMutations || 0,
    performance.getEntriesByType('resource').length
].join(':'))()"#;

const NAVIGATION_STATUS: &str = r#"(() => {
    const entry = performance.getEntriesByType('navigation')[0];
    return entry && entry.responseStatus ? entry.responseStatus : 200;
})()"#;

/// Settings for [`ChromeEngine`]
#[derive(Debug, Clone)]
pub struct ChromeSettings {
    pub headless: bool,
    pub viewport: (u32, u32),
    pub user_agent: Option<String>,
    pub timeout: Duration,
}

/// Engine backed by a headless Chromium process
pub struct ChromeEngine {
    browser: Arc<Browser>,
    settings: ChromeSettings,
}

/// Runs a synchronous browser call on the blocking pool
async fn blocking<T, F>(f: F) -> Result<T, BrowserError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, BrowserError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| BrowserError::Script(format!("browser task failed: {}", e)))?
}

fn hide_marker_script() -> String {
    format!(
        r#"(() => {{
    for (const el of document.querySelectorAll('body *')) {{
        const style = window.getComputedStyle(el);
        const rect = el.getBoundingClientRect();
        if (style.display === 'none' || style.visibility === 'hidden'
            || (rect.width === 0 && rect.height === 0 && el.children.length === 0)) {{
            el.setAttribute('{}', '');
        }}
    }}
    return true;
}})()"#,
        HIDDEN_MARKER
    )
}

fn clear_marker_script() -> String {
    format!(
        "document.querySelectorAll('[{0}]').forEach(el => el.removeAttribute('{0}'))",
        HIDDEN_MARKER
    )
}

fn evaluate_string(tab: &Tab, script: &str) -> Result<String, BrowserError> {
    let result = tab
        .evaluate(script, false)
        .map_err(|e| BrowserError::Script(e.to_string()))?;
    Ok(result
        .value
        .map(|v| match v {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        })
        .unwrap_or_default())
}

fn tab_url(tab: &Tab) -> Result<Url, BrowserError> {
    Url::parse(&tab.get_url()).map_err(|e| BrowserError::Navigation(e.to_string()))
}

/// Installs credentials for `origin` in a tab
///
/// Cookies go into the browser's cookie jar, which applies their domain and
/// path on every request. Bearer headers are added by request interception,
/// and only to requests for `origin`.
fn install_credentials(tab: &Tab, auth: &AuthDescriptor, origin: &Url) -> Result<(), BrowserError> {
    match auth {
        AuthDescriptor::Cookies(cookies) => {
            let params = cookies
                .iter()
                .map(|cookie| cookie_param(cookie, origin))
                .collect::<Result<Vec<_>, _>>()?;
            tab.set_cookies(params)
                .map_err(|e| BrowserError::Launch(format!("Failed to set cookies: {}", e)))
        }
        AuthDescriptor::BearerToken { .. } => {
            let patterns = vec![RequestPattern {
                url_pattern: Some("*".to_string()),
                resource_Type: None,
                request_stage: Some(RequestStage::Request),
            }];
            tab.enable_fetch(Some(&patterns), None)
                .map_err(|e| BrowserError::Launch(format!("Failed to enable interception: {}", e)))?;

            let auth = auth.clone();
            let origin = origin.clone();
            tab.enable_request_interception(Arc::new(
                move |_transport, _session_id, intercepted: RequestPausedEvent| {
                    let extra = match Url::parse(&intercepted.params.request.url) {
                        Ok(target) => auth.scoped_headers(&origin, &target),
                        Err(_) => Vec::new(),
                    };
                    if extra.is_empty() {
                        return RequestPausedDecision::Continue(None);
                    }
                    RequestPausedDecision::Continue(continue_with_headers(&intercepted, extra))
                },
            ))
            .map_err(|e| BrowserError::Launch(format!("Failed to intercept requests: {}", e)))
        }
    }
}

fn cookie_param(cookie: &AuthCookie, origin: &Url) -> Result<CookieParam, BrowserError> {
    let mut param = json!({
        "name": cookie.name,
        "value": cookie.value,
        "url": origin.as_str(),
        "path": cookie.path.as_deref().unwrap_or("/"),
    });
    if let Some(domain) = &cookie.domain {
        param["domain"] = json!(domain.trim_start_matches('*'));
    }
    serde_json::from_value(param)
        .map_err(|e| BrowserError::Launch(format!("Invalid cookie {}: {}", cookie.name, e)))
}

/// The paused request's headers with `extra` added, replacing same-named ones
fn continue_with_headers(
    intercepted: &RequestPausedEvent,
    extra: Vec<(String, String)>,
) -> Option<ContinueRequest> {
    let request = &intercepted.params.request;
    let mut headers: Vec<serde_json::Value> = request
        .headers
        .0
        .as_ref()
        .and_then(|h| h.as_object())
        .map(|existing| {
            existing
                .iter()
                .filter(|(name, _)| !extra.iter().any(|(n, _)| n.eq_ignore_ascii_case(name)))
                .map(|(name, value)| json!({ "name": name, "value": value.as_str().unwrap_or_default() }))
                .collect()
        })
        .unwrap_or_default();
    headers.extend(
        extra
            .into_iter()
            .map(|(name, value)| json!({ "name": name, "value": value })),
    );

    match serde_json::from_value(json!({
        "requestId": intercepted.params.request_id,
        "headers": headers,
    })) {
        Ok(request) => Some(request),
        Err(e) => {
            tracing::debug!("Continuing {} without credentials: {}", request.url, e);
            None
        }
    }
}

impl ChromeEngine {
    /// Launches Chromium
    pub async fn launch(settings: ChromeSettings) -> Result<Self, BrowserError> {
        let launch = settings.clone();
        let browser = blocking(move || {
            let options = LaunchOptions::default_builder()
                .headless(launch.headless)
                .window_size(Some(launch.viewport))
                .idle_browser_timeout(Duration::from_secs(60 * 60))
                .build()
                .map_err(|e| BrowserError::Launch(e.to_string()))?;
            Browser::new(options).map_err(|e| BrowserError::Launch(e.to_string()))
        })
        .await?;

        tracing::info!("Launched headless Chromium ({}x{})", settings.viewport.0, settings.viewport.1);

        Ok(Self {
            browser: Arc::new(browser),
            settings,
        })
    }
}

#[async_trait]
impl BrowserEngine for ChromeEngine {
    type Context = ChromeContext;

    fn name(&self) -> &'static str {
        "chrome"
    }

    async fn open_context(
        &self,
        auth: Option<&AuthDescriptor>,
    ) -> Result<ChromeContext, BrowserError> {
        let browser = Arc::clone(&self.browser);
        let settings = self.settings.clone();
        let auth = auth.cloned();

        blocking(move || {
            let tab = browser
                .new_tab()
                .map_err(|e| BrowserError::Launch(format!("Failed to create tab: {}", e)))?;
            tab.set_default_timeout(settings.timeout);

            if let Some(agent) = &settings.user_agent {
                tab.set_user_agent(agent, None, None)
                    .map_err(|e| BrowserError::Launch(e.to_string()))?;
            }

            Ok(ChromeContext {
                _browser: browser,
                tab,
                auth,
                timeout: settings.timeout,
                credentials_installed: false,
            })
        })
        .await
    }
}

/// A browsing context of the [`ChromeEngine`]: one tab
pub struct ChromeContext {
    _browser: Arc<Browser>,
    tab: Arc<Tab>,
    auth: Option<AuthDescriptor>,
    timeout: Duration,
    credentials_installed: bool,
}

#[async_trait]
impl BrowsingContext for ChromeContext {
    async fn navigate(&mut self, url: &Url) -> Result<NavigationResponse, BrowserError> {
        // The first navigation of a context is always on the crawl origin
        let credentials = if self.credentials_installed {
            None
        } else {
            self.auth.clone()
        };
        self.credentials_installed = true;

        let tab = Arc::clone(&self.tab);
        let origin = url.clone();
        let target = url.to_string();
        let timeout = self.timeout;

        blocking(move || {
            if let Some(auth) = credentials {
                install_credentials(&tab, &auth, &origin)?;
            }

            tab.navigate_to(&target)
                .map_err(|e| BrowserError::Navigation(e.to_string()))?;
            tab.wait_until_navigated().map_err(|e| {
                let message = e.to_string();
                if message.to_ascii_lowercase().contains("timeout") {
                    BrowserError::Timeout(timeout)
                } else {
                    BrowserError::Navigation(message)
                }
            })?;

            let status = evaluate_string(&tab, NAVIGATION_STATUS)?
                .parse::<u16>()
                .unwrap_or(200);

            Ok(NavigationResponse {
                final_url: tab_url(&tab)?,
                status,
            })
        })
        .await
    }

    async fn wait_stable(&mut self, budget: Duration) -> Result<(), BrowserError> {
        let tab = Arc::clone(&self.tab);

        blocking(move || {
            evaluate_string(&tab, INSTALL_OBSERVER)?;

            let started = Instant::now();
            let mut last = evaluate_string(&tab, ACTIVITY_PROBE)?;
            let mut quiet_since = Instant::now();

            while started.elapsed() < budget {
                std::thread::sleep(POLL_INTERVAL);
                let now = evaluate_string(&tab, ACTIVITY_PROBE)?;
                if now != last {
                    last = now;
                    quiet_since = Instant::now();
                } else if quiet_since.elapsed() >= QUIET_WINDOW {
                    return Ok(());
                }
            }

            tracing::debug!("Page still active after {:?}, continuing", budget);
            Ok(())
        })
        .await
    }

    async fn current_url(&mut self) -> Result<Url, BrowserError> {
        tab_url(&self.tab)
    }

    async fn read_dom(&mut self) -> Result<String, BrowserError> {
        let tab = Arc::clone(&self.tab);
        blocking(move || {
            evaluate_string(&tab, &hide_marker_script())?;
            let html = tab
                .get_content()
                .map_err(|e| BrowserError::Script(e.to_string()));
            evaluate_string(&tab, &clear_marker_script())?;
            html
        })
        .await
    }

    async fn engage(&mut self, selector: &str) -> Result<NavigationOutcome, BrowserError> {
        let tab = Arc::clone(&self.tab);
        let selector = selector.to_string();

        blocking(move || {
            let before = tab_url(&tab)?;
            let history_before = evaluate_string(&tab, "history.length")?;

            tab.find_element(&selector)
                .map_err(|_| BrowserError::ElementNotFound(selector.clone()))?
                .click()
                .map_err(|e| BrowserError::Script(e.to_string()))?;

            std::thread::sleep(ENGAGE_SETTLE);

            let after = tab_url(&tab)?;
            if !same_document(&before, &after) {
                if let Err(e) = tab.wait_until_navigated() {
                    tracing::debug!("Load after engaging {} not observed: {}", selector, e);
                }
                return Ok(NavigationOutcome::Navigated(tab_url(&tab)?));
            }

            let history_after = evaluate_string(&tab, "history.length")?;
            if after != before || history_after != history_before {
                Ok(NavigationOutcome::HistoryChanged(after))
            } else {
                Ok(NavigationOutcome::Unchanged)
            }
        })
        .await
    }

    async fn capture(&mut self) -> Result<Vec<u8>, BrowserError> {
        let tab = Arc::clone(&self.tab);
        blocking(move || {
            tab.capture_screenshot(CaptureScreenshotFormatOption::Png, None, None, true)
                .map_err(|e| BrowserError::Capture(e.to_string()))
        })
        .await
    }

    async fn close(&mut self) -> Result<(), BrowserError> {
        let tab = Arc::clone(&self.tab);
        blocking(move || {
            tab.close(false)
                .map(|_| ())
                .map_err(|e| BrowserError::Script(e.to_string()))
        })
        .await
    }
}
