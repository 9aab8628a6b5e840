//! URL template inference
//!
//! Concrete URLs are grouped into templates such as `/users/:id`. A segment
//! becomes a placeholder in one of three ways, tried in order:
//!
//! 1. It is a strong identifier on its own: all digits, a UUID, or a long hex
//!    object id.
//! 2. A sibling URL differs from an existing template in exactly that
//!    segment, and both values are opaque tokens (mixed letters and digits).
//! 3. A sibling URL differs in exactly that (non-leading) segment and the two
//!    rendered pages are structurally near-identical. These merges are the
//!    least certain and are logged for operator review.

use crate::inventory::{ScreenId, TemplateInference, UrlTemplate};
use crate::extract::similarity;
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeSet;
use url::Url;

const ID: &str = ":id";
const UUID: &str = ":uuid";
const TOKEN: &str = ":token";
const SLUG: &str = ":slug";

/// Minimum length of an opaque token segment
const MIN_TOKEN_LEN: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(&'static str),
}

impl Segment {
    fn classify(raw: &str) -> Self {
        if NUMERIC_ID.is_match(raw) {
            Segment::Param(ID)
        } else if UUID_ID.is_match(raw) {
            Segment::Param(UUID)
        } else if HEX_ID.is_match(raw) {
            Segment::Param(ID)
        } else {
            Segment::Literal(raw.to_string())
        }
    }

    fn render(&self) -> &str {
        match self {
            Segment::Literal(s) => s,
            Segment::Param(p) => p,
        }
    }

    /// True if a template segment accepts a concrete segment
    fn accepts(&self, concrete: &Segment) -> bool {
        match (self, concrete) {
            (Segment::Literal(a), Segment::Literal(b)) => a == b,
            (Segment::Param(a), Segment::Param(b)) => a == b,
            (Segment::Param(TOKEN), Segment::Literal(value)) => is_opaque_token(value),
            (Segment::Param(SLUG), Segment::Literal(_)) => true,
            _ => false,
        }
    }
}

lazy_static! {
    static ref NUMERIC_ID: Regex = Regex::new(r"^[0-9]+$").expect("numeric id pattern is valid");
    static ref UUID_ID: Regex = Regex::new(
        r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$"
    )
    .expect("uuid pattern is valid");
    /// Bare hex object ids, e.g. 24-character Mongo ids
    static ref HEX_ID: Regex = Regex::new(r"^[0-9a-fA-F]{24,}$").expect("hex id pattern is valid");
}

/// Opaque tokens: long, URL-safe, and mixing letters with digits
fn is_opaque_token(value: &str) -> bool {
    value.len() >= MIN_TOKEN_LEN
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        && value.chars().any(|c| c.is_ascii_digit())
        && value.chars().any(|c| c.is_ascii_alphabetic())
}

/// The structural shape of a route: path segments, hash-route segments, query keys
#[derive(Debug, Clone, PartialEq, Eq)]
struct RouteShape {
    path: Vec<Segment>,
    /// Hash-route segments and whether the route uses `#!`
    hash: Option<(bool, Vec<Segment>)>,
    query_keys: Vec<String>,
}

impl RouteShape {
    fn of(url: &Url) -> Self {
        let path = url
            .path()
            .split('/')
            .filter(|s| !s.is_empty())
            .map(Segment::classify)
            .collect();

        let mut query_keys: BTreeSet<String> = url.query_pairs().map(|(k, _)| k.into_owned()).collect();

        let hash = url.fragment().and_then(|fragment| {
            let (bang, rest) = match fragment.strip_prefix("!/") {
                Some(rest) => (true, rest),
                None => (false, fragment.strip_prefix('/')?),
            };
            let (route, query) = match rest.split_once('?') {
                Some((route, query)) => (route, Some(query)),
                None => (rest, None),
            };
            if let Some(query) = query {
                for pair in query.split('&').filter(|p| !p.is_empty()) {
                    let key = pair.split_once('=').map_or(pair, |(k, _)| k);
                    query_keys.insert(key.to_string());
                }
            }
            let segments = route
                .split('/')
                .filter(|s| !s.is_empty())
                .map(Segment::classify)
                .collect();
            Some((bang, segments))
        });

        Self {
            path,
            hash,
            query_keys: query_keys.into_iter().collect(),
        }
    }

    fn segments(&self) -> impl Iterator<Item = &Segment> {
        self.path
            .iter()
            .chain(self.hash.iter().flat_map(|(_, segments)| segments.iter()))
    }

    fn segment_mut(&mut self, index: usize) -> Option<&mut Segment> {
        let path_len = self.path.len();
        if index < path_len {
            self.path.get_mut(index)
        } else {
            self.hash
                .as_mut()
                .and_then(|(_, segments)| segments.get_mut(index - path_len))
        }
    }

    fn len(&self) -> usize {
        self.segments().count()
    }

    /// Same layout: segment counts, hash-route style and query keys
    fn compatible(&self, other: &Self) -> bool {
        self.path.len() == other.path.len()
            && self.query_keys == other.query_keys
            && match (&self.hash, &other.hash) {
                (None, None) => true,
                (Some((a_bang, a)), Some((b_bang, b))) => a_bang == b_bang && a.len() == b.len(),
                _ => false,
            }
    }

    fn accepts(&self, concrete: &Self) -> bool {
        self.compatible(concrete)
            && self
                .segments()
                .zip(concrete.segments())
                .all(|(t, c)| t.accepts(c))
    }

    /// Index of the single position where the shapes disagree, if exactly one
    fn single_difference(&self, concrete: &Self) -> Option<usize> {
        if !self.compatible(concrete) {
            return None;
        }
        let mut differing = self
            .segments()
            .zip(concrete.segments())
            .enumerate()
            .filter(|(_, (t, c))| !t.accepts(c))
            .map(|(i, _)| i);
        match (differing.next(), differing.next()) {
            (Some(index), None) => Some(index),
            _ => None,
        }
    }

    fn key(&self) -> String {
        let mut key = String::from("/");
        key.push_str(
            &self
                .path
                .iter()
                .map(Segment::render)
                .collect::<Vec<_>>()
                .join("/"),
        );

        if let Some((bang, segments)) = &self.hash {
            key.push('#');
            if *bang {
                key.push('!');
            }
            key.push('/');
            key.push_str(&segments.iter().map(Segment::render).collect::<Vec<_>>().join("/"));
        }

        if !self.query_keys.is_empty() {
            key.push('?');
            key.push_str(&self.query_keys.join("&"));
        }
        key
    }

    fn has_slug(&self) -> bool {
        self.segments().any(|s| *s == Segment::Param(SLUG))
    }

    fn has_params(&self) -> bool {
        self.segments().any(|s| matches!(s, Segment::Param(_)))
    }
}

#[derive(Debug, Clone)]
struct TemplateEntry {
    shape: RouteShape,
    key: String,
    representative: ScreenId,
    instances: u32,
    inference: TemplateInference,
    fingerprint: BTreeSet<String>,
}

impl TemplateEntry {
    /// True if a concrete route is another instance of this template
    ///
    /// A `:slug` position stands for arbitrary words, so it only admits pages
    /// that are still structurally close to the representative.
    fn admits(&self, shape: &RouteShape, fingerprint: &BTreeSet<String>, threshold: f64) -> bool {
        self.shape.accepts(shape)
            && (!self.shape.has_slug() || similarity(&self.fingerprint, fingerprint) >= threshold)
    }

    fn generalize(&mut self, index: usize, placeholder: &'static str, inference: TemplateInference) {
        if let Some(segment) = self.shape.segment_mut(index) {
            *segment = Segment::Param(placeholder);
        }
        self.key = self.shape.key();
        if self.inference != TemplateInference::Structural {
            self.inference = inference;
        }
    }
}

/// Result of classifying a concrete URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateMatch {
    /// The URL is another instance of an existing template
    Existing {
        key: String,
        representative: ScreenId,
        /// Previous key when this match generalized the template
        renamed_from: Option<String>,
    },
    /// A new template was created with the candidate screen as representative
    New { key: String },
}

/// Registry of URL templates discovered during one crawl
#[derive(Debug, Clone)]
pub struct TemplateRegistry {
    entries: Vec<TemplateEntry>,
    similarity_threshold: f64,
}

impl TemplateRegistry {
    pub fn new(similarity_threshold: f64) -> Self {
        Self {
            entries: Vec::new(),
            similarity_threshold,
        }
    }

    /// Classifies a URL, registering a new template if no existing one fits
    ///
    /// # Arguments
    ///
    /// * `url` - The normalized URL of the page
    /// * `fingerprint` - Structure fingerprint of the rendered page
    /// * `candidate` - The screen that will represent a new template
    pub fn classify(
        &mut self,
        url: &Url,
        fingerprint: &BTreeSet<String>,
        candidate: ScreenId,
    ) -> TemplateMatch {
        let shape = RouteShape::of(url);
        let threshold = self.similarity_threshold;

        if let Some(entry) = self
            .entries
            .iter_mut()
            .find(|e| e.admits(&shape, fingerprint, threshold))
        {
            entry.instances += 1;
            if entry.shape.has_slug() {
                tracing::warn!(
                    "Merged {} into template {} by structural similarity; review for false merges",
                    url,
                    entry.key
                );
            }
            return TemplateMatch::Existing {
                key: entry.key.clone(),
                representative: entry.representative,
                renamed_from: None,
            };
        }

        if let Some(found) = self.merge_token_sibling(&shape) {
            return found;
        }

        if let Some(found) = self.merge_structural_sibling(url, &shape, fingerprint) {
            return found;
        }

        let key = shape.key();
        let inference = if shape.has_params() {
            TemplateInference::Identifier
        } else {
            TemplateInference::Literal
        };
        self.entries.push(TemplateEntry {
            shape,
            key: key.clone(),
            representative: candidate,
            instances: 1,
            inference,
            fingerprint: fingerprint.clone(),
        });
        TemplateMatch::New { key }
    }

    fn merge_token_sibling(&mut self, shape: &RouteShape) -> Option<TemplateMatch> {
        for entry in &mut self.entries {
            let Some(index) = entry.shape.single_difference(shape) else {
                continue;
            };
            let both_tokens = matches!(
                (entry.shape.segments().nth(index), shape.segments().nth(index)),
                (Some(Segment::Literal(a)), Some(Segment::Literal(b)))
                    if is_opaque_token(a) && is_opaque_token(b)
            );
            if !both_tokens {
                continue;
            }

            let previous = entry.key.clone();
            entry.generalize(index, TOKEN, TemplateInference::Identifier);
            entry.instances += 1;
            tracing::debug!("Generalized template {} to {}", previous, entry.key);

            return Some(TemplateMatch::Existing {
                key: entry.key.clone(),
                representative: entry.representative,
                renamed_from: Some(previous),
            });
        }
        None
    }

    fn merge_structural_sibling(
        &mut self,
        url: &Url,
        shape: &RouteShape,
        fingerprint: &BTreeSet<String>,
    ) -> Option<TemplateMatch> {
        if shape.len() < 2 {
            return None;
        }

        for entry in &mut self.entries {
            let Some(index) = entry.shape.single_difference(shape) else {
                continue;
            };
            if index == 0 {
                continue;
            }
            let both_literal = matches!(
                (entry.shape.segments().nth(index), shape.segments().nth(index)),
                (Some(Segment::Literal(_)), Some(Segment::Literal(_)))
            );
            if !both_literal {
                continue;
            }

            let score = similarity(&entry.fingerprint, fingerprint);
            if score < self.similarity_threshold {
                continue;
            }

            let previous = entry.key.clone();
            entry.generalize(index, SLUG, TemplateInference::Structural);
            entry.instances += 1;
            tracing::warn!(
                "Merged {} into template {} by structural similarity {:.2}; review for false merges",
                url,
                entry.key,
                score
            );

            return Some(TemplateMatch::Existing {
                key: entry.key.clone(),
                representative: entry.representative,
                renamed_from: Some(previous),
            });
        }
        None
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Templates in creation order
    pub fn templates(&self) -> Vec<UrlTemplate> {
        self.entries
            .iter()
            .map(|e| UrlTemplate {
                key: e.key.clone(),
                representative: e.representative,
                instances: e.instances,
                inference: e.inference,
            })
            .collect()
    }
}
