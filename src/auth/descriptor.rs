use crate::url::{matches_domain, same_origin};
use std::collections::BTreeMap;
use std::fmt;
use url::Url;

/// A cookie injected into every browsing context
#[derive(Clone, PartialEq, Eq)]
pub struct AuthCookie {
    pub name: String,
    pub value: String,

    /// Host the cookie applies to; `None` means every host the crawl visits
    pub domain: Option<String>,

    /// Path prefix the cookie applies to; `None` means `/`
    pub path: Option<String>,
}

impl AuthCookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: None,
            path: None,
        }
    }

    /// True if a browser would send this cookie with a request to `url`
    pub fn applies_to(&self, url: &Url) -> bool {
        let host_ok = match (&self.domain, url.host_str()) {
            (None, _) => true,
            (Some(domain), Some(host)) => matches_domain(domain, host),
            (Some(_), None) => false,
        };
        let path_ok = self
            .path
            .as_deref()
            .map_or(true, |prefix| url.path().starts_with(prefix));
        host_ok && path_ok
    }
}

impl fmt::Debug for AuthCookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthCookie")
            .field("name", &self.name)
            .field("value", &"<redacted>")
            .field("domain", &self.domain)
            .field("path", &self.path)
            .finish()
    }
}

/// Credentials for the target application
///
/// Credential material is never logged: `Debug` redacts every secret.
#[derive(Clone, PartialEq, Eq)]
pub enum AuthDescriptor {
    Cookies(Vec<AuthCookie>),
    BearerToken {
        token: String,
        /// Extra headers sent with every request, e.g. a tenant selector
        headers: BTreeMap<String, String>,
    },
}

impl AuthDescriptor {
    pub fn strategy(&self) -> &'static str {
        match self {
            Self::Cookies(_) => "cookies",
            Self::BearerToken { .. } => "bearer-token",
        }
    }

    /// Headers to attach to a request for `url`
    pub fn request_headers(&self, url: &Url) -> Vec<(String, String)> {
        match self {
            Self::Cookies(cookies) => {
                let pairs: Vec<String> = cookies
                    .iter()
                    .filter(|c| c.applies_to(url))
                    .map(|c| format!("{}={}", c.name, c.value))
                    .collect();
                if pairs.is_empty() {
                    Vec::new()
                } else {
                    vec![("Cookie".to_string(), pairs.join("; "))]
                }
            }
            Self::BearerToken { token, headers } => {
                let mut out = vec![("Authorization".to_string(), format!("Bearer {}", token))];
                out.extend(headers.iter().map(|(k, v)| (k.clone(), v.clone())));
                out
            }
        }
    }
}

impl AuthDescriptor {
    /// Headers a browser should add to a request it makes on its own
    ///
    /// Cookies travel through the browser's cookie jar, so only bearer
    /// credentials are returned, and only for requests to `origin`.
    pub fn scoped_headers(&self, origin: &Url, request: &Url) -> Vec<(String, String)> {
        match self {
            Self::BearerToken { .. } if same_origin(origin, request) => self.request_headers(request),
            _ => Vec::new(),
        }
    }
}

impl fmt::Debug for AuthDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cookies(cookies) => f.debug_tuple("Cookies").field(cookies).finish(),
            Self::BearerToken { headers, .. } => f
                .debug_struct("BearerToken")
                .field("token", &"<redacted>")
                .field("headers", &headers.keys().collect::<Vec<_>>())
                .finish(),
        }
    }
}
