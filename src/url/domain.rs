use url::Url;

/// Extracts the lowercase host from a URL
///
/// # Examples
///
/// ```
/// use url::Url;
/// use screen_atlas::url::extract_host;
///
/// let url = Url::parse("https://APP.example.com/path").unwrap();
/// assert_eq!(extract_host(&url), Some("app.example.com".to_string()));
/// ```
pub fn extract_host(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Returns true if two URLs share scheme, host and port
///
/// The crawl never leaves the origin of its base URL, so every candidate is
/// checked with this before it reaches the frontier.
pub fn same_origin(a: &Url, b: &Url) -> bool {
    a.scheme() == b.scheme()
        && extract_host(a) == extract_host(b)
        && a.port_or_known_default() == b.port_or_known_default()
}
