use crate::UrlError;
use url::Url;

/// List of tracking query parameters to remove during normalization
const TRACKING_PARAMS: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "fbclid",
    "gclid",
    "mc_eid",
    "ref",
    "source",
];

/// Normalizes a URL so that equivalent addresses of the same screen compare equal
///
/// # Normalization Steps
///
/// 1. Parse the URL; reject if malformed or not HTTP(S)
/// 2. Lowercase the host
/// 3. Normalize path:
///    - Remove dot segments (. and ..) and empty segments
///    - Remove trailing slash (except for root /)
///    - Empty path becomes /
/// 4. Fragments:
///    - Client-side routes (`#/settings`, `#!/settings`) are kept, with their
///      path part normalized like the main path
///    - Plain anchors (`#section`) and empty routes (`#/`) are dropped
/// 5. Remove tracking query parameters
/// 6. Sort remaining query parameters by key
/// 7. Remove empty query string (trailing ?)
///
/// Normalization is idempotent: normalizing an already-normalized URL
/// returns it unchanged.
///
/// # Arguments
///
/// * `url_str` - The URL string to normalize
///
/// # Returns
///
/// * `Ok(Url)` - Normalized URL
/// * `Err(UrlError)` - Failed to parse or normalize the URL
///
/// # Examples
///
/// ```
/// use screen_atlas::url::normalize_url;
///
/// let url = normalize_url("https://APP.EXAMPLE.COM/settings/#top").unwrap();
/// assert_eq!(url.as_str(), "https://app.example.com/settings");
///
/// let url = normalize_url("https://app.example.com/app#/users/").unwrap();
/// assert_eq!(url.as_str(), "https://app.example.com/app#/users");
/// ```
pub fn normalize_url(url_str: &str) -> Result<Url, UrlError> {
    let url = Url::parse(url_str).map_err(|e| UrlError::Parse(e.to_string()))?;
    normalize_parsed(url)
}

/// Normalizes an already-parsed URL (see [`normalize_url`])
pub fn normalize_parsed(mut url: Url) -> Result<Url, UrlError> {
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    let host = url
        .host_str()
        .map(|h| h.to_lowercase())
        .ok_or(UrlError::MissingHost)?;
    url.set_host(Some(&host))
        .map_err(|e| UrlError::Malformed(format!("Failed to set host: {}", e)))?;

    let normalized_path = normalize_path(url.path());
    url.set_path(&normalized_path);

    let fragment = url.fragment().and_then(normalize_hash_route);
    url.set_fragment(fragment.as_deref());

    if url.query().is_some() {
        let params = filter_and_sort_query_params(&url);
        if params.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(params);
        }
    }

    Ok(url)
}

/// Returns the part of a URL that identifies a screen inside its origin
///
/// This is the path plus any client-side hash route, e.g. `/app#/settings`.
/// Scope patterns are matched against this string.
pub fn route_of(url: &Url) -> String {
    match url.fragment() {
        Some(fragment) if is_hash_route(fragment) => format!("{}#{}", url.path(), fragment),
        _ => url.path().to_string(),
    }
}

/// Returns true if a fragment is a client-side route rather than an anchor
pub fn is_hash_route(fragment: &str) -> bool {
    fragment.starts_with('/') || fragment.starts_with("!/")
}

/// Normalizes a hash-route fragment, returning None for plain anchors
fn normalize_hash_route(fragment: &str) -> Option<String> {
    let (prefix, rest) = if let Some(rest) = fragment.strip_prefix("!/") {
        ("!", rest)
    } else if let Some(rest) = fragment.strip_prefix('/') {
        ("", rest)
    } else {
        return None;
    };

    // Split off any query carried inside the route
    let (route_path, route_query) = match rest.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (rest, None),
    };

    let path = normalize_path(&format!("/{}", route_path));
    if path == "/" && route_query.map_or(true, str::is_empty) {
        return None;
    }

    let mut normalized = format!("{}{}", prefix, path);
    if let Some(query) = route_query.filter(|q| !q.is_empty()) {
        normalized.push('?');
        normalized.push_str(query);
    }
    Some(normalized)
}

/// Normalizes a URL path by removing dot segments and trailing slashes
fn normalize_path(path: &str) -> String {
    if path.is_empty() {
        return "/".to_string();
    }

    let mut normalized_segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                normalized_segments.pop();
            }
            _ => normalized_segments.push(segment),
        }
    }

    if normalized_segments.is_empty() {
        return "/".to_string();
    }

    format!("/{}", normalized_segments.join("/"))
}

/// Filters out tracking parameters and sorts remaining query parameters
fn filter_and_sort_query_params(url: &Url) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !is_tracking_param(key))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    params.sort();

    params
}

/// Checks if a query parameter is a tracking parameter
fn is_tracking_param(key: &str) -> bool {
    TRACKING_PARAMS.contains(&key) || key.starts_with("utm_")
}
