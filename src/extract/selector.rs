//! Stable selectors and declarative navigation hints
//!
//! Both the extractor (to describe controls) and the page fetcher (to engage
//! them) need to point at the same element later, so selectors must be
//! deterministic and unique within the document.

use lazy_static::lazy_static;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

lazy_static! {
    /// Single-quoted, double-quoted or template string literal
    static ref JS_STRING: Regex =
        Regex::new(r#"'([^']*)'|"([^"]*)"|`([^`]*)`"#).expect("string literal pattern is valid");
}

/// Attributes SPA frameworks commonly use to declare a navigation target
const HINT_ATTRIBUTES: &[&str] = &["data-href", "data-route", "data-to", "data-url", "data-link"];

/// Inline-handler calls that navigate, paired with the last quoted argument
const NAVIGATION_CALLS: &[&str] = &[
    "location.href",
    "location.hash",
    "location.assign(",
    "location.replace(",
    "window.location",
    "router.push(",
    "router.navigate(",
    "navigate(",
    "navigateTo(",
    "history.pushState(",
    "history.replaceState(",
];

/// Builds a selector that uniquely identifies `element` in `document`
///
/// Prefers `#id`, then `tag.class1.class2` when that is unique, and otherwise
/// falls back to a `>`-joined `:nth-of-type` path from the nearest ancestor
/// with an id (or the root).
pub fn stable_selector(element: ElementRef, document: &Html) -> String {
    let own = simple_selector(element);
    if own.starts_with('#') || match_count(document, &own) == 1 {
        return own;
    }

    let mut parts = Vec::new();
    let mut current = Some(element);

    while let Some(el) = current {
        if let Some(id) = el.value().id().filter(|id| is_css_ident(id)) {
            parts.push(format!("#{}", id));
            break;
        }
        if el.value().name() == "html" {
            parts.push("html".to_string());
            break;
        }
        parts.push(nth_of_type(el));
        current = el.parent().and_then(ElementRef::wrap);
    }

    parts.reverse();
    parts.join(" > ")
}

/// `#id`, else tag plus first two classes, else tag
fn simple_selector(element: ElementRef) -> String {
    let el = element.value();

    if let Some(id) = el.id().filter(|id| is_css_ident(id)) {
        return format!("#{}", id);
    }

    // Document order; `classes()` yields a sorted set
    let classes: Vec<&str> = el
        .attr("class")
        .unwrap_or_default()
        .split_whitespace()
        .filter(|c| is_css_ident(c))
        .take(2)
        .collect();
    if classes.is_empty() {
        el.name().to_string()
    } else {
        format!("{}.{}", el.name(), classes.join("."))
    }
}

fn nth_of_type(element: ElementRef) -> String {
    let name = element.value().name();
    let position = element
        .prev_siblings()
        .filter_map(ElementRef::wrap)
        .filter(|sibling| sibling.value().name() == name)
        .count()
        + 1;
    format!("{}:nth-of-type({})", name, position)
}

fn match_count(document: &Html, selector: &str) -> usize {
    Selector::parse(selector)
        .map(|s| document.select(&s).count())
        .unwrap_or(0)
}

fn is_css_ident(value: &str) -> bool {
    let mut chars = value.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Returns the navigation target an element declares in markup, if any
///
/// Looks at `data-href`-style attributes first, then at inline `onclick`
/// handlers that assign `location` or call a router.
pub fn navigation_hint(element: ElementRef) -> Option<String> {
    let el = element.value();

    for attribute in HINT_ATTRIBUTES {
        if let Some(value) = el.attr(attribute).map(str::trim).filter(|v| !v.is_empty()) {
            return Some(value.to_string());
        }
    }

    el.attr("onclick").and_then(script_target)
}

fn script_target(script: &str) -> Option<String> {
    for call in NAVIGATION_CALLS {
        let Some(position) = script.find(call) else {
            continue;
        };
        let rest = &script[position + call.len()..];
        let statement = rest.split([')', ';']).next().unwrap_or(rest);

        if let Some(target) = quoted_strings(statement).into_iter().last() {
            if *call == "location.hash" && !target.starts_with('#') {
                return Some(format!("#{}", target));
            }
            return Some(target);
        }
    }
    None
}

/// Non-empty string literals in a JavaScript snippet, in order
fn quoted_strings(snippet: &str) -> Vec<String> {
    JS_STRING
        .captures_iter(snippet)
        .filter_map(|c| c.get(1).or_else(|| c.get(2)).or_else(|| c.get(3)))
        .map(|m| m.as_str())
        .filter(|literal| !literal.trim().is_empty())
        .map(str::to_string)
        .collect()
}
