//! Selection of controls worth engaging during script-navigation discovery
//!
//! Only controls that look navigational are engaged. Anything that could
//! change server state is left alone: submit buttons, controls inside forms,
//! destructive labels or targets, and elements declaring a non-GET
//! `data-method`.

use crate::extract::{inside_form, is_hidden, is_submit_control, navigation_hint, stable_selector};
use crate::url::is_destructive_route;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;

/// Labels of controls that must never be clicked on a live system
const DESTRUCTIVE_WORDS: &[&str] = &[
    "delete",
    "remove",
    "destroy",
    "logout",
    "log out",
    "sign out",
    "signout",
    "archive",
    "unsubscribe",
    "deactivate",
    "reset",
    "revoke",
    "disable",
    "purge",
];

/// Always treated as navigational
const LINK_LIKE: &str = "[role=link], a[onclick]:not([href])";

/// Navigational only when they declare a target
const BUTTON_LIKE: &str = "button, [role=button], [role=menuitem]";

/// A control to engage, with the label it was selected for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trigger {
    pub selector: String,
    pub label: String,
}

/// Finds up to `limit` navigational triggers in document order
pub fn find_triggers(html: &str, limit: usize) -> Vec<Trigger> {
    let document = Html::parse_document(html);
    let mut seen = HashSet::new();
    let mut triggers = Vec::new();

    let candidates = [(LINK_LIKE, false), (BUTTON_LIKE, true)];
    for (css, needs_hint) in candidates {
        let Ok(selector) = Selector::parse(css) else {
            continue;
        };

        for element in document.select(&selector) {
            if triggers.len() >= limit {
                return triggers;
            }
            if needs_hint && navigation_hint(element).is_none() {
                continue;
            }
            if !is_safe(element) {
                continue;
            }

            let selector = stable_selector(element, &document);
            if !seen.insert(selector.clone()) {
                continue;
            }
            triggers.push(Trigger {
                selector,
                label: label_of(element),
            });
        }
    }

    triggers
}

fn label_of(element: ElementRef) -> String {
    let text = element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ");
    if text.is_empty() {
        element
            .value()
            .attr("aria-label")
            .unwrap_or_default()
            .trim()
            .to_string()
    } else {
        text
    }
}

/// True if engaging the element cannot mutate application state
fn is_safe(element: ElementRef) -> bool {
    if is_hidden(element) || is_submit_control(element) || inside_form(element) {
        return false;
    }

    if navigation_hint(element).is_some_and(|target| is_destructive_route(&target)) {
        return false;
    }

    let el = element.value();
    if let Some(method) = el.attr("data-method") {
        let method = method.to_ascii_lowercase();
        if method != "get" {
            return false;
        }
    }

    let label = format!(
        "{} {} {}",
        label_of(element),
        el.attr("title").unwrap_or_default(),
        el.id().unwrap_or_default()
    )
    .to_ascii_lowercase();
    !DESTRUCTIVE_WORDS.iter().any(|word| label.contains(word))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_navigational_controls_selected() {
        let html = r##"
            <div role="link" id="go-reports" data-href="/reports">Reports</div>
            <button id="nav-settings" data-route="#/settings">Settings</button>
            <button id="toggle">Toggle sidebar</button>
            <a onclick="router.push('/team')" id="team">Team</a>"##;
        let selectors: Vec<String> = find_triggers(html, 20)
            .into_iter()
            .map(|t| t.selector)
            .collect();
        assert_eq!(selectors, vec!["#go-reports", "#team", "#nav-settings"]);
    }

    #[test]
    fn test_destructive_and_form_controls_excluded() {
        let html = r#"
            <button data-href="/items/1/delete">Delete item</button>
            <button data-href="/logout">Log out</button>
            <div role="link" data-href="/x" data-method="post">Archive</div>
            <a onclick="navigate('/danger')" data-method="DELETE">Danger</a>
            <form><button type="button" data-href="/next">Next</button></form>
            <button type="submit" data-href="/save">Save</button>
            <button data-href="/billing">Billing</button>"#;
        let labels: Vec<String> = find_triggers(html, 20)
            .into_iter()
            .map(|t| t.label)
            .collect();
        assert_eq!(labels, vec!["Billing"]);
    }

    #[test]
    fn test_destructive_targets_excluded_whatever_the_label() {
        let html = r##"
            <div role="link" id="bye" data-href="/session/logout">Goodbye</div>
            <button id="tidy" data-route="#/items/4/remove">Tidy up</button>
            <a id="leave" onclick="location.href = '/users/sign_out'">Leave</a>
            <div role="link" id="history" data-href="/deleted-items">History</div>"##;
        let selectors: Vec<String> = find_triggers(html, 20)
            .into_iter()
            .map(|t| t.selector)
            .collect();
        assert_eq!(selectors, vec!["#history"]);
    }

    #[test]
    fn test_limit_and_dedup() {
        let html = (0..30)
            .map(|i| format!("<div role='link' id='l{}' data-href='/p{}'>P{}</div>", i, i, i))
            .collect::<String>();
        assert_eq!(find_triggers(&html, 5).len(), 5);
    }

    #[test]
    fn test_hidden_controls_skipped() {
        let html = r#"<div role="link" data-href="/a" hidden>A</div>"#;
        assert!(find_triggers(html, 20).is_empty());
    }
}
