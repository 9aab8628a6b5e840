//! Structure extraction from rendered pages
//!
//! Turns the DOM of a rendered page into a [`StructureDescription`], and
//! provides the helpers the crawler needs to find hyperlinks, titles and
//! engageable controls in the same DOM.

mod extractor;
mod selector;
mod structure;
mod visibility;

use crate::crawler::RenderedPage;

pub use extractor::{extract_from_html, hyperlinks, page_title, MAX_VISIBLE_TEXT};
pub(crate) use extractor::{inside_form, is_submit_control};
pub use selector::{navigation_hint, stable_selector};
pub use structure::{
    similarity, DetectedTab, DetectionSource, ElementAction, ElementKind, FormField, Heading,
    InteractiveElement, NavLink, StructureDescription, ValidationHints,
};
pub use visibility::{is_hidden, HIDDEN_MARKER};

/// Extracts the structure description of a rendered page
///
/// Pure with respect to the page: the same DOM always yields the same
/// description.
pub fn extract_structure(page: &RenderedPage) -> StructureDescription {
    extract_from_html(&page.html)
}
