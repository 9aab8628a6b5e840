//! Structure description types produced by the extractor

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A heading with its level (1-6), in document order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Heading {
    pub level: u8,
    pub text: String,
}

/// A link found in a navigation container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavLink {
    pub text: String,

    /// The raw `href` value as written in the page
    pub target: String,

    /// Marked active via an `active` class or `aria-current="page"`
    pub is_active: bool,
}

/// Kind of interactive control
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    Button,
    Link,
    Select,
    MenuItem,
}

/// What engaging a control does, as far as can be told from markup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementAction {
    Click,
    Navigate,
    Select,
    Submit,
}

/// An interactive control, deduplicated by (kind, label, target)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractiveElement {
    pub kind: ElementKind,
    pub label: String,
    pub action: ElementAction,

    /// Navigation target declared in markup, if any
    pub target: Option<String>,

    /// Selector of the first occurrence
    pub selector: String,

    pub aria_role: Option<String>,
}

/// Validation constraints declared on a form field
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationHints {
    pub required: bool,
    pub pattern: Option<String>,
    pub min: Option<String>,
    pub max: Option<String>,
    pub min_length: Option<u32>,
    pub max_length: Option<u32>,
}

impl ValidationHints {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// A form input, textarea or select
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormField {
    pub field_type: String,
    pub name: Option<String>,
    pub label: Option<String>,
    pub placeholder: Option<String>,
    pub hints: ValidationHints,
    pub selector: String,
}

/// A tab detected on the page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectedTab {
    pub label: String,
    pub selected: bool,
}

/// How tab and modal indicators were found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionSource {
    /// ARIA roles and attributes
    Aria,
    /// Framework class-name conventions
    Heuristic,
}

/// Normalized description of one rendered page
///
/// Derived deterministically from the page's DOM; two extractions of the same
/// page serialize to identical bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructureDescription {
    pub headings: Vec<Heading>,
    pub nav_links: Vec<NavLink>,
    pub interactive: Vec<InteractiveElement>,
    pub form_fields: Vec<FormField>,
    pub visible_text: Vec<String>,
    pub landmarks: Vec<String>,
    pub tabs: Vec<DetectedTab>,
    pub tab_source: Option<DetectionSource>,
    pub modals: Vec<String>,
    pub modal_source: Option<DetectionSource>,
}

impl StructureDescription {
    /// Layout features used to compare two pages for structural equivalence
    ///
    /// Deliberately leaves out heading text, visible text and navigation
    /// links: two instances of one screen differ in content and share the
    /// site chrome, so neither says anything about the screen's shape.
    pub fn fingerprint(&self) -> BTreeSet<String> {
        let mut features = BTreeSet::new();

        for (index, heading) in self.headings.iter().enumerate() {
            features.insert(format!("h{}@{}", heading.level, index));
        }
        for landmark in &self.landmarks {
            features.insert(format!("landmark:{}", landmark));
        }
        for element in &self.interactive {
            features.insert(format!("{:?}:{}", element.kind, element.label.to_lowercase()));
        }
        for field in &self.form_fields {
            let name = field
                .name
                .as_deref()
                .or(field.label.as_deref())
                .unwrap_or("");
            features.insert(format!("field:{}:{}", field.field_type, name));
        }
        for tab in &self.tabs {
            features.insert(format!("tab:{}", tab.label.to_lowercase()));
        }
        for modal in &self.modals {
            features.insert(format!("modal:{}", modal.to_lowercase()));
        }

        features
    }
}

/// Jaccard similarity of two fingerprints; 0.0 when both are empty
pub fn similarity(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}
