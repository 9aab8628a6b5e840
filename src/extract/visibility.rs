//! Visibility rules for the static DOM
//!
//! Only what is expressed in markup can be seen here: the `hidden` attribute,
//! `aria-hidden`, inline styles, and the `data-atlas-hidden` marker the
//! browser engine stamps on elements whose computed style hides them.

use scraper::ElementRef;

/// Attribute set by the browser engine on elements hidden by computed style
pub const HIDDEN_MARKER: &str = "data-atlas-hidden";

/// Elements whose content is never rendered as text
const NON_RENDERED_TAGS: &[&str] = &["script", "style", "noscript", "svg", "template", "head"];

/// Returns true if the element or any of its ancestors is hidden
pub fn is_hidden(element: ElementRef) -> bool {
    std::iter::once(element)
        .chain(element.ancestors().filter_map(ElementRef::wrap))
        .any(hides_itself)
}

/// Returns true if the element's text would never be painted
pub fn is_non_rendered(element: ElementRef) -> bool {
    std::iter::once(element)
        .chain(element.ancestors().filter_map(ElementRef::wrap))
        .any(|el| NON_RENDERED_TAGS.contains(&el.value().name()))
}

fn hides_itself(element: ElementRef) -> bool {
    let el = element.value();

    if el.attr("hidden").is_some() || el.attr(HIDDEN_MARKER).is_some() {
        return true;
    }

    if el
        .attr("aria-hidden")
        .is_some_and(|v| v.eq_ignore_ascii_case("true"))
    {
        return true;
    }

    if el.name() == "input"
        && el
            .attr("type")
            .is_some_and(|t| t.eq_ignore_ascii_case("hidden"))
    {
        return true;
    }

    if el.name() == "dialog" && el.attr("open").is_none() {
        return true;
    }

    el.attr("style").is_some_and(style_hides)
}

/// Checks inline CSS declarations for display, visibility and zero size
fn style_hides(style: &str) -> bool {
    style
        .split(';')
        .filter_map(|declaration| declaration.split_once(':'))
        .any(|(property, value)| {
            let property = property.trim().to_ascii_lowercase();
            let value = value
                .trim()
                .trim_end_matches("!important")
                .trim()
                .to_ascii_lowercase();

            match property.as_str() {
                "display" => value == "none",
                "visibility" => value == "hidden" || value == "collapse",
                "width" | "height" | "max-width" | "max-height" => is_zero_length(&value),
                _ => false,
            }
        })
}

fn is_zero_length(value: &str) -> bool {
    let number = value.trim_end_matches(|c: char| c.is_ascii_alphabetic() || c == '%');
    number.parse::<f64>().is_ok_and(|n| n == 0.0)
}
