//! Classification of the pre-crawl validation probe

use crate::auth::AuthOutcome;
use crate::browser::{BrowserError, NavigationResponse};
use crate::url::route_of;
use scraper::{Html, Selector};
use url::Url;

/// Route fragments that mark a sign-in or identity-provider screen
const LOGIN_PATH_MARKERS: &[&str] = &["/login", "/signin", "/sign-in", "/auth", "/sso"];

/// Markup that only a login screen carries
const LOGIN_FORM_INDICATORS: &[&str] = &[
    "input[type=password]",
    "form[action*=login]",
    "form[action*=signin]",
    "form[action*=sign-in]",
    "[data-testid=login]",
    "#login-form",
    ".login-form",
];

/// Returns true if the route looks like a login screen
pub fn is_login_route(url: &Url) -> bool {
    let route = route_of(url).to_ascii_lowercase();
    LOGIN_PATH_MARKERS.iter().any(|marker| route.contains(marker))
}

/// Returns true if the DOM contains a login form
pub fn has_login_form(html: &str) -> bool {
    let document = Html::parse_document(html);
    LOGIN_FORM_INDICATORS.iter().any(|css| {
        Selector::parse(css)
            .map(|selector| document.select(&selector).next().is_some())
            .unwrap_or(false)
    })
}

/// Classifies the result of navigating to the base URL
///
/// # Arguments
///
/// * `base` - The crawl's base URL
/// * `response` - The navigation result, or the error it failed with
/// * `dom` - The rendered DOM, when the navigation succeeded
///
/// # Returns
///
/// The [`AuthOutcome`]; only `Authenticated` lets the crawl proceed.
pub fn classify(
    base: &Url,
    response: Result<&NavigationResponse, &BrowserError>,
    dom: Option<&str>,
) -> AuthOutcome {
    let response = match response {
        Ok(response) => response,
        Err(e) => {
            return AuthOutcome::Unreachable {
                reason: e.to_string(),
            }
        }
    };

    match response.status {
        401 | 403 => {
            return AuthOutcome::Unauthorized {
                status: response.status,
            }
        }
        404 => {
            return AuthOutcome::Unreachable {
                reason: format!("{} returned 404 Not Found", base),
            }
        }
        status if status >= 500 => {
            return AuthOutcome::Unreachable {
                reason: format!("{} returned server error {}", base, status),
            }
        }
        _ => {}
    }

    let final_url = &response.final_url;
    let redirected = AuthOutcome::RedirectedToLogin {
        final_url: final_url.to_string(),
    };

    if final_url.host_str() != base.host_str() {
        return redirected;
    }

    if is_login_route(final_url) && !is_login_route(base) {
        return redirected;
    }

    let moved = route_of(final_url) != route_of(base);
    if moved && dom.is_some_and(has_login_form) {
        return redirected;
    }

    AuthOutcome::Authenticated
}
