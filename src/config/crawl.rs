//! The resolved, immutable settings of one crawl

use crate::auth::{AuthCookie, AuthDescriptor};
use crate::config::types::{
    default_max_depth, default_max_pages, default_max_probes, default_page_timeout_ms,
    default_settle_ms, default_similarity_threshold, default_workers, AuthConfig, AuthStrategy,
    Config,
};
use crate::snapshot::SnapshotSettings;
use crate::url::ScopeFilter;
use crate::{ConfigError, ConfigResult};
use std::time::Duration;
use url::Url;

/// Everything a crawl needs, with credentials resolved
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    pub base_url: Url,
    pub auth: Option<AuthDescriptor>,
    pub max_pages: u32,
    pub max_depth: u32,
    pub workers: usize,
    pub page_timeout: Duration,
    pub settle: Duration,
    pub deadline: Option<Duration>,
    pub max_probes_per_page: usize,
    pub similarity_threshold: f64,
    pub scope: ScopeFilter,
    pub snapshot: SnapshotSettings,
}

impl CrawlConfig {
    /// An unauthenticated crawl of `base_url` with default bounds
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            auth: None,
            max_pages: default_max_pages(),
            max_depth: default_max_depth(),
            workers: default_workers(),
            page_timeout: Duration::from_millis(default_page_timeout_ms()),
            settle: Duration::from_millis(default_settle_ms()),
            deadline: None,
            max_probes_per_page: default_max_probes(),
            similarity_threshold: default_similarity_threshold(),
            scope: ScopeFilter::default(),
            snapshot: SnapshotSettings::default(),
        }
    }

    /// Builds the crawl settings from a validated configuration file
    ///
    /// # Errors
    ///
    /// * `ConfigError::InvalidUrl` - the base URL does not parse
    /// * `ConfigError::MissingEnv` - `token-env` names an unset variable
    /// * `ConfigError::InvalidPattern` - a scope pattern is not a valid glob
    pub fn from_config(config: &Config) -> ConfigResult<Self> {
        let crawl = &config.crawl;
        let base_url = Url::parse(&crawl.base_url).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid base-url '{}': {}", crawl.base_url, e))
        })?;

        let auth = crawl.auth.as_ref().map(resolve_auth).transpose()?;

        Ok(Self {
            base_url,
            auth,
            max_pages: crawl.max_pages,
            max_depth: crawl.max_depth,
            workers: crawl.workers,
            page_timeout: Duration::from_millis(crawl.page_timeout_ms),
            settle: Duration::from_millis(crawl.settle_ms),
            deadline: crawl.deadline_secs.map(Duration::from_secs),
            max_probes_per_page: crawl.max_probes_per_page,
            similarity_threshold: crawl.similarity_threshold,
            scope: ScopeFilter::new(&crawl.scope.include, &crawl.scope.exclude)
                .map_err(|e| ConfigError::InvalidPattern(e.to_string()))?,
            snapshot: SnapshotSettings::from(&crawl.snapshot),
        })
    }
}

fn resolve_auth(auth: &AuthConfig) -> ConfigResult<AuthDescriptor> {
    match auth.strategy {
        AuthStrategy::Cookies => Ok(AuthDescriptor::Cookies(
            auth.cookies
                .iter()
                .map(|entry| AuthCookie {
                    name: entry.name.clone(),
                    value: entry.value.clone(),
                    domain: entry.domain.clone(),
                    path: entry.path.clone(),
                })
                .collect(),
        )),
        AuthStrategy::BearerToken => {
            let token = match (&auth.token, &auth.token_env) {
                (Some(token), _) => token.clone(),
                (None, Some(var)) => {
                    std::env::var(var).map_err(|_| ConfigError::MissingEnv(var.clone()))?
                }
                (None, None) => {
                    return Err(ConfigError::Validation(
                        "bearer-token auth needs token or token-env".to_string(),
                    ))
                }
            };
            Ok(AuthDescriptor::BearerToken {
                token,
                headers: auth.headers.clone(),
            })
        }
    }
}
