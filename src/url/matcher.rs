use glob::{MatchOptions, Pattern, PatternError};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Route words whose target changes server state when merely visited
    static ref DESTRUCTIVE_ROUTE: Regex = Regex::new(
        r"(?i)(?:^|[^a-z0-9])(?:log[-_]?out|log[-_]?off|sign[-_]?out|sign[-_]?off|delete|remove|destroy|deactivate|unsubscribe|revoke|purge)(?:$|[^a-z0-9])"
    )
    .expect("destructive route pattern is valid");
}

/// `*` crosses `/` and `#`, so `/admin/*` covers every nested route
const ROUTE_MATCH: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

/// Compiles a route glob pattern
///
/// Supported syntax is that of [`glob::Pattern`]: `*` matches any run of
/// characters (including `/` and `#`), `?` exactly one, and `[...]` a
/// character class.
///
/// # Examples
///
/// ```
/// use screen_atlas::url::{compile_pattern, matches_glob};
///
/// let admin = compile_pattern("/admin/*").unwrap();
/// assert!(matches_glob(&admin, "/admin/users/7"));
/// assert!(!matches_glob(&admin, "/settings"));
/// assert!(compile_pattern("/items/[").is_err());
/// ```
pub fn compile_pattern(pattern: &str) -> Result<Pattern, PatternError> {
    Pattern::new(pattern)
}

/// Checks if a route matches a compiled glob pattern
pub fn matches_glob(pattern: &Pattern, route: &str) -> bool {
    pattern.matches_with(route, ROUTE_MATCH)
}

/// True if following `target` would log the user out or destroy data
///
/// Looks for words like `logout`, `sign-out` or `delete` as whole tokens
/// anywhere in the path, hash route or query of a route or URL.
///
/// # Examples
///
/// ```
/// use screen_atlas::url::is_destructive_route;
///
/// assert!(is_destructive_route("/logout"));
/// assert!(is_destructive_route("/items/3/delete"));
/// assert!(is_destructive_route("/app#/account/sign-out"));
/// assert!(!is_destructive_route("/removed-items"));
/// ```
pub fn is_destructive_route(target: &str) -> bool {
    DESTRUCTIVE_ROUTE.is_match(target)
}

/// Checks if a host falls under a cookie-style domain
///
/// A domain with a leading dot (or `*.` prefix) matches the domain itself and
/// every subdomain; a bare domain matches only itself.
///
/// # Examples
///
/// ```
/// use screen_atlas::url::matches_domain;
///
/// assert!(matches_domain("app.example.com", "app.example.com"));
/// assert!(matches_domain(".example.com", "app.example.com"));
/// assert!(matches_domain("*.example.com", "example.com"));
/// assert!(!matches_domain("example.com", "app.example.com"));
/// ```
pub fn matches_domain(domain: &str, host: &str) -> bool {
    let wildcard_base = domain
        .strip_prefix("*.")
        .or_else(|| domain.strip_prefix('.'));

    match wildcard_base {
        Some(base) => host == base || host.ends_with(&format!(".{}", base)),
        None => host == domain,
    }
}
