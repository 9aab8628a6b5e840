//! URL handling for the crawler
//!
//! This module provides URL normalization, origin checks, glob matching of
//! routes, and the scope classification that decides whether a discovered
//! URL may enter the frontier.

mod domain;
mod matcher;
mod normalize;

use ::url::Url;
use glob::{Pattern, PatternError};

// Re-export main functions
pub use domain::{extract_host, same_origin};
pub use matcher::{compile_pattern, is_destructive_route, matches_domain, matches_glob};
pub use normalize::{is_hash_route, normalize_parsed, normalize_url, route_of};

/// Include/exclude glob patterns applied to routes (see [`route_of`])
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeFilter {
    /// If non-empty, a route must match at least one of these
    pub include: Vec<Pattern>,

    /// A route matching any of these is never crawled
    pub exclude: Vec<Pattern>,
}

impl ScopeFilter {
    /// Compiles include and exclude patterns once for the whole crawl
    pub fn new<S: AsRef<str>>(include: &[S], exclude: &[S]) -> Result<Self, PatternError> {
        let compile = |patterns: &[S]| {
            patterns
                .iter()
                .map(|p| compile_pattern(p.as_ref()))
                .collect::<Result<Vec<_>, _>>()
        };
        Ok(Self {
            include: compile(include)?,
            exclude: compile(exclude)?,
        })
    }
}

/// Scope classification of a discovered URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeDecision {
    /// Same origin and allowed by the patterns
    InScope,
    /// Different scheme, host or port than the base URL
    ForeignOrigin,
    /// Visiting it would end the session or destroy data
    Destructive,
    /// Matched an exclude pattern
    Excluded,
    /// Include patterns are configured and none matched
    NotIncluded,
}

impl ScopeDecision {
    /// Returns true if the URL may be crawled
    pub fn should_crawl(&self) -> bool {
        matches!(self, Self::InScope)
    }

    /// Reason recorded when a discovered URL is refused
    pub fn reason(&self) -> &'static str {
        match self {
            Self::InScope => "in scope",
            Self::ForeignOrigin => "foreign origin",
            Self::Destructive => "destructive route",
            Self::Excluded => "excluded by scope pattern",
            Self::NotIncluded => "not matched by any include pattern",
        }
    }
}

/// Classifies a URL against the crawl's base URL and scope patterns
///
/// Checks are applied in the following priority order:
/// 1. Origin (anything off the base origin is foreign)
/// 2. Destructive routes (`/logout`, `.../delete`), whatever the patterns say
/// 3. Exclude patterns (exclude wins over include)
/// 4. Include patterns (only when at least one is configured)
/// 5. In scope (default)
///
/// # Arguments
///
/// * `url` - The normalized URL to classify
/// * `base` - The crawl's base URL
/// * `scope` - The include/exclude patterns
///
/// # Examples
///
/// ```
/// use url::Url;
/// use screen_atlas::url::{classify_scope, ScopeDecision, ScopeFilter};
///
/// let base = Url::parse("https://app.example.com/").unwrap();
/// let scope = ScopeFilter::new(&["/app/*"], &["/app/admin*"]).unwrap();
///
/// let url = Url::parse("https://app.example.com/app/admin/users").unwrap();
/// assert_eq!(classify_scope(&url, &base, &scope), ScopeDecision::Excluded);
///
/// let url = Url::parse("https://app.example.com/app/logout").unwrap();
/// assert_eq!(classify_scope(&url, &base, &scope), ScopeDecision::Destructive);
/// ```
pub fn classify_scope(url: &Url, base: &Url, scope: &ScopeFilter) -> ScopeDecision {
    if !same_origin(url, base) {
        return ScopeDecision::ForeignOrigin;
    }

    let route = route_of(url);

    let query = url.query().unwrap_or_default();
    if is_destructive_route(&route) || is_destructive_route(query) {
        return ScopeDecision::Destructive;
    }

    if scope.exclude.iter().any(|p| matches_glob(p, &route)) {
        return ScopeDecision::Excluded;
    }

    if !scope.include.is_empty() && !scope.include.iter().any(|p| matches_glob(p, &route)) {
        return ScopeDecision::NotIncluded;
    }

    ScopeDecision::InScope
}
