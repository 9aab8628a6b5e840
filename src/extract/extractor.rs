//! DOM structure extraction
//!
//! Everything here is a pure function of the HTML string: no network, no
//! clock, no randomness. Selectors are evaluated in document order and every
//! collection is built in that order, so repeated extraction of the same page
//! yields identical output.

use crate::extract::selector::{navigation_hint, stable_selector};
use crate::extract::structure::{
    DetectedTab, DetectionSource, ElementAction, ElementKind, FormField, Heading,
    InteractiveElement, NavLink, StructureDescription, ValidationHints,
};
use crate::extract::visibility::{is_hidden, is_non_rendered};
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use url::Url;

/// Cap on the total visible text kept per page
pub const MAX_VISIBLE_TEXT: usize = 10_000;

const NAV_LINK_SELECTORS: &[&str] = &[
    "nav a",
    "[role=navigation] a",
    ".sidebar a",
    ".navbar a",
];

const INTERACTIVE_SELECTOR: &str = "button, [role=button], [role=link], [role=menuitem], \
     input[type=submit], input[type=button], a[onclick]:not([href]), select";

const LANDMARK_ROLES: &[&str] = &[
    "banner",
    "navigation",
    "main",
    "complementary",
    "contentinfo",
    "search",
    "form",
    "region",
];

const SEMANTIC_LANDMARKS: &[(&str, &str)] = &[
    ("header", "banner"),
    ("nav", "navigation"),
    ("main", "main"),
    ("aside", "complementary"),
    ("footer", "contentinfo"),
];

const TAB_ROLE_SELECTOR: &str = "[role=tab]";

const TAB_FALLBACK_SELECTORS: &[&str] = &[
    ".MuiTab-root",
    ".ant-tabs-tab",
    ".nav-tabs .nav-link",
    ".tab-item",
    "[data-toggle=tab]",
    "[data-bs-toggle=tab]",
];

const MODAL_ROLE_SELECTOR: &str =
    "[aria-haspopup=dialog], [role=dialog], [role=alertdialog], dialog";

const MODAL_FALLBACK_SELECTORS: &[&str] = &[
    "[data-toggle=modal]",
    "[data-bs-toggle=modal]",
    ".modal-trigger",
    ".MuiDialog-root",
    ".ant-modal",
];

const MAX_LABEL_CHARS: usize = 80;

/// Extracts a [`StructureDescription`] from rendered HTML
///
/// # Example
///
/// ```
/// use screen_atlas::extract::extract_from_html;
///
/// let html = r#"<main><h1>Users</h1><button>Invite</button></main>"#;
/// let structure = extract_from_html(html);
/// assert_eq!(structure.headings[0].text, "Users");
/// assert_eq!(structure.interactive[0].label, "Invite");
/// ```
pub fn extract_from_html(html: &str) -> StructureDescription {
    let document = Html::parse_document(html);

    let (tabs, tab_source) = detect_tabs(&document);
    let (modals, modal_source) = detect_modals(&document);

    StructureDescription {
        headings: extract_headings(&document),
        nav_links: extract_nav_links(&document),
        interactive: extract_interactive(&document),
        form_fields: extract_form_fields(&document),
        visible_text: extract_visible_text(&document),
        landmarks: extract_landmarks(&document),
        tabs,
        tab_source,
        modals,
        modal_source,
    }
}

/// Extracts the page title from the `<title>` tag
pub fn page_title(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    select_all(&document, "title")
        .into_iter()
        .next()
        .map(text_of)
        .filter(|s| !s.is_empty())
}

/// Extracts hyperlink targets, resolved against `base`
///
/// Skips `javascript:`, `mailto:`, `tel:` and `data:` links, download links,
/// and same-page anchors. Hash routes (`#/settings`) are kept because they
/// address distinct screens in a single-page application.
pub fn hyperlinks(html: &str, base: &Url) -> Vec<Url> {
    let document = Html::parse_document(html);
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for element in select_all(&document, "a[href], area[href]") {
        if element.value().attr("download").is_some() {
            continue;
        }

        if let Some(url) = element
            .value()
            .attr("href")
            .and_then(|href| resolve_link(href, base))
        {
            if seen.insert(url.to_string()) {
                links.push(url);
            }
        }
    }

    links
}

/// Resolves an href to an absolute HTTP(S) URL, or None if it should be skipped
fn resolve_link(href: &str, base: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() {
        return None;
    }

    let lower = href.to_ascii_lowercase();
    if lower.starts_with("javascript:")
        || lower.starts_with("mailto:")
        || lower.starts_with("tel:")
        || lower.starts_with("data:")
    {
        return None;
    }

    // Same-page anchors; hash routes start with "#/" or "#!/"
    if let Some(fragment) = href.strip_prefix('#') {
        if !crate::url::is_hash_route(fragment) {
            return None;
        }
    }

    let absolute = base.join(href).ok()?;
    if absolute.scheme() == "http" || absolute.scheme() == "https" {
        Some(absolute)
    } else {
        None
    }
}

fn select_all<'a>(document: &'a Html, css: &str) -> Vec<ElementRef<'a>> {
    match Selector::parse(css) {
        Ok(selector) => document.select(&selector).collect(),
        Err(_) => Vec::new(),
    }
}

/// Text content with whitespace collapsed
fn text_of(element: ElementRef) -> String {
    element.text().flat_map(str::split_whitespace).collect::<Vec<_>>().join(" ")
}

fn truncate_label(label: String) -> String {
    if label.chars().count() > MAX_LABEL_CHARS {
        label.chars().take(MAX_LABEL_CHARS).collect()
    } else {
        label
    }
}

fn attr_string(element: ElementRef, name: &str) -> Option<String> {
    element
        .value()
        .attr(name)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn extract_headings(document: &Html) -> Vec<Heading> {
    select_all(document, "h1, h2, h3, h4, h5, h6")
        .into_iter()
        .filter(|el| !is_hidden(*el))
        .filter_map(|el| {
            let level = el.value().name()[1..].parse::<u8>().ok()?;
            let text = text_of(el);
            (!text.is_empty()).then_some(Heading { level, text })
        })
        .collect()
}

fn extract_nav_links(document: &Html) -> Vec<NavLink> {
    let mut seen_targets = HashSet::new();
    let mut links = Vec::new();

    for css in NAV_LINK_SELECTORS {
        for element in select_all(document, css) {
            if is_hidden(element) {
                continue;
            }

            let text = text_of(element);
            let Some(target) = attr_string(element, "href") else {
                continue;
            };
            if text.is_empty() || !seen_targets.insert(target.clone()) {
                continue;
            }

            let class_active = element
                .value()
                .classes()
                .any(|c| c.to_ascii_lowercase().contains("active"));
            let aria_current = element.value().attr("aria-current") == Some("page");

            links.push(NavLink {
                text,
                target,
                is_active: class_active || aria_current,
            });
        }
    }

    links
}

fn element_kind(element: ElementRef) -> ElementKind {
    let el = element.value();
    match el.attr("role").map(str::to_ascii_lowercase).as_deref() {
        Some("link") => ElementKind::Link,
        Some("menuitem") => ElementKind::MenuItem,
        Some("button") => ElementKind::Button,
        _ => match el.name() {
            "select" => ElementKind::Select,
            "a" => ElementKind::Link,
            _ => ElementKind::Button,
        },
    }
}

/// True if engaging the element would submit a form
pub(crate) fn is_submit_control(element: ElementRef) -> bool {
    let el = element.value();
    let declared = el.attr("type").map(str::to_ascii_lowercase);

    match el.name() {
        "input" => declared.as_deref() == Some("submit") || declared.as_deref() == Some("image"),
        "button" => match declared.as_deref() {
            Some("submit") => true,
            Some(_) => false,
            // Buttons default to submit inside a form
            None => inside_form(element),
        },
        _ => false,
    }
}

pub(crate) fn inside_form(element: ElementRef) -> bool {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .any(|a| a.value().name() == "form")
}

fn control_label(element: ElementRef, document: &Html) -> String {
    if element.value().name() == "select" {
        return label_for(element, document)
            .or_else(|| attr_string(element, "aria-label"))
            .unwrap_or_else(|| "Dropdown".to_string());
    }

    let text = text_of(element);
    if !text.is_empty() {
        return truncate_label(text);
    }

    attr_string(element, "aria-label")
        .or_else(|| attr_string(element, "title"))
        .or_else(|| attr_string(element, "value"))
        .map(truncate_label)
        .unwrap_or_default()
}

fn extract_interactive(document: &Html) -> Vec<InteractiveElement> {
    let mut seen = HashSet::new();
    let mut elements = Vec::new();

    for element in select_all(document, INTERACTIVE_SELECTOR) {
        if is_hidden(element) {
            continue;
        }

        let label = control_label(element, document);
        if label.is_empty() {
            continue;
        }

        let kind = element_kind(element);
        let target = navigation_hint(element).or_else(|| {
            (element.value().name() == "a")
                .then(|| attr_string(element, "href"))
                .flatten()
        });

        if !seen.insert((kind, label.clone(), target.clone())) {
            continue;
        }

        let action = if kind == ElementKind::Select {
            ElementAction::Select
        } else if is_submit_control(element) {
            ElementAction::Submit
        } else if target.is_some() || kind == ElementKind::Link {
            ElementAction::Navigate
        } else {
            ElementAction::Click
        };

        elements.push(InteractiveElement {
            kind,
            label,
            action,
            target,
            selector: stable_selector(element, document),
            aria_role: attr_string(element, "role"),
        });
    }

    elements
}

/// Text of a `<label for=...>` pointing at the element
fn label_for(element: ElementRef, document: &Html) -> Option<String> {
    let id = element.value().id()?;
    select_all(document, "label[for]")
        .into_iter()
        .find(|label| label.value().attr("for") == Some(id))
        .map(text_of)
        .filter(|text| !text.is_empty())
}

fn enclosing_label(element: ElementRef) -> Option<String> {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|a| a.value().name() == "label")
        .map(text_of)
        .filter(|text| !text.is_empty())
}

fn extract_form_fields(document: &Html) -> Vec<FormField> {
    const SKIPPED_TYPES: &[&str] = &["hidden", "submit", "button", "reset", "image"];

    let mut fields = Vec::new();

    for element in select_all(document, "input, textarea, select") {
        let el = element.value();
        let declared_type = el.attr("type").map(str::to_ascii_lowercase);

        if el.name() == "input"
            && declared_type
                .as_deref()
                .is_some_and(|t| SKIPPED_TYPES.contains(&t))
        {
            continue;
        }
        if is_hidden(element) {
            continue;
        }

        let field_type = match el.name() {
            "textarea" => "textarea".to_string(),
            "select" => "select".to_string(),
            _ => declared_type.unwrap_or_else(|| "text".to_string()),
        };

        let label = label_for(element, document)
            .or_else(|| (el.name() == "input").then(|| enclosing_label(element)).flatten())
            .or_else(|| attr_string(element, "aria-label"));

        let hints = ValidationHints {
            required: el.attr("required").is_some()
                || el.attr("aria-required") == Some("true"),
            pattern: attr_string(element, "pattern"),
            min: attr_string(element, "min"),
            max: attr_string(element, "max"),
            min_length: el.attr("minlength").and_then(|v| v.trim().parse().ok()),
            max_length: el.attr("maxlength").and_then(|v| v.trim().parse().ok()),
        };

        fields.push(FormField {
            field_type,
            name: attr_string(element, "name"),
            label,
            placeholder: attr_string(element, "placeholder"),
            hints,
            selector: stable_selector(element, document),
        });
    }

    fields
}

fn extract_visible_text(document: &Html) -> Vec<String> {
    let Some(body) = select_all(document, "body").into_iter().next() else {
        return Vec::new();
    };

    let mut blocks = Vec::new();
    let mut total = 0usize;

    for node in body.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let Some(parent) = node.parent().and_then(ElementRef::wrap) else {
            continue;
        };
        if is_non_rendered(parent) || is_hidden(parent) {
            continue;
        }

        let block = text.split_whitespace().collect::<Vec<_>>().join(" ");
        if block.is_empty() {
            continue;
        }

        let length = block.chars().count();
        if total + length > MAX_VISIBLE_TEXT {
            let remaining = MAX_VISIBLE_TEXT - total;
            let mut truncated: String = block.chars().take(remaining).collect();
            truncated.push_str("...");
            blocks.push(truncated);
            break;
        }

        total += length;
        blocks.push(block);
    }

    blocks
}

fn extract_landmarks(document: &Html) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();

    for role in LANDMARK_ROLES {
        if !select_all(document, &format!("[role={}]", role)).is_empty() {
            found.push(role.to_string());
        }
    }

    for (tag, role) in SEMANTIC_LANDMARKS {
        if !select_all(document, tag).is_empty() && !found.iter().any(|r| r == role) {
            found.push(role.to_string());
        }
    }

    found
}

fn push_tab(tabs: &mut Vec<DetectedTab>, element: ElementRef) {
    let label = truncate_label(text_of(element));
    let label = if label.is_empty() {
        attr_string(element, "aria-label").unwrap_or_default()
    } else {
        label
    };
    if label.is_empty() || tabs.iter().any(|t| t.label == label) {
        return;
    }

    let el = element.value();
    let selected = el.attr("aria-selected") == Some("true")
        || el
            .classes()
            .any(|c| c.contains("active") || c.contains("selected"));

    tabs.push(DetectedTab { label, selected });
}

/// Tabs by ARIA role, falling back to framework class names when no role is used
fn detect_tabs(document: &Html) -> (Vec<DetectedTab>, Option<DetectionSource>) {
    let mut tabs = Vec::new();

    for element in select_all(document, TAB_ROLE_SELECTOR) {
        if !is_hidden(element) {
            push_tab(&mut tabs, element);
        }
    }
    if !tabs.is_empty() {
        return (tabs, Some(DetectionSource::Aria));
    }

    for css in TAB_FALLBACK_SELECTORS {
        for element in select_all(document, css) {
            if !is_hidden(element) {
                push_tab(&mut tabs, element);
            }
        }
    }
    if tabs.is_empty() {
        (tabs, None)
    } else {
        (tabs, Some(DetectionSource::Heuristic))
    }
}

fn is_dialog_container(element: ElementRef) -> bool {
    let el = element.value();
    el.name() == "dialog"
        || matches!(el.attr("role"), Some("dialog") | Some("alertdialog"))
        || el
            .classes()
            .any(|c| c == "MuiDialog-root" || c == "ant-modal")
}

fn modal_label(element: ElementRef, document: &Html) -> Option<String> {
    if let Some(label) = attr_string(element, "aria-label") {
        return Some(truncate_label(label));
    }

    if let Some(ids) = element.value().attr("aria-labelledby") {
        let label = ids
            .split_whitespace()
            .filter_map(|id| {
                select_all(document, "[id]")
                    .into_iter()
                    .find(|candidate| candidate.value().id() == Some(id))
                    .map(text_of)
            })
            .collect::<Vec<_>>()
            .join(" ");
        if !label.is_empty() {
            return Some(truncate_label(label));
        }
    }

    if is_dialog_container(element) {
        let heading = Selector::parse("h1, h2, h3, h4, h5, h6, .modal-title")
            .ok()
            .and_then(|s| element.select(&s).next())
            .map(text_of)
            .filter(|t| !t.is_empty());
        return heading.map(truncate_label);
    }

    Some(truncate_label(text_of(element))).filter(|t| !t.is_empty())
}

/// Modal triggers and dialogs by ARIA, falling back to class conventions
fn detect_modals(document: &Html) -> (Vec<String>, Option<DetectionSource>) {
    let collect = |elements: Vec<ElementRef>, modals: &mut Vec<String>| {
        for element in elements {
            // Closed dialogs are hidden but still indicate a modal
            if !is_dialog_container(element) && is_hidden(element) {
                continue;
            }
            if let Some(label) = modal_label(element, document) {
                if !modals.contains(&label) {
                    modals.push(label);
                }
            }
        }
    };

    let mut modals = Vec::new();
    collect(select_all(document, MODAL_ROLE_SELECTOR), &mut modals);
    if !modals.is_empty() {
        return (modals, Some(DetectionSource::Aria));
    }

    for css in MODAL_FALLBACK_SELECTORS {
        collect(select_all(document, css), &mut modals);
    }
    if modals.is_empty() {
        (modals, None)
    } else {
        (modals, Some(DetectionSource::Heuristic))
    }
}
