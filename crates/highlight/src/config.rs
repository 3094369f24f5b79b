use crate::error::HighlightError;
use core_types::{Category, HighlightColor, HighlightId};
use html::{Document, NodeId, PathOptions};
use serde::Deserialize;

const DEFAULT_BLOCK_TAGS: &[&str] = &[
    "address", "article", "aside", "blockquote", "body", "dd", "details", "div", "dl", "dt",
    "fieldset", "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6",
    "header", "li", "main", "nav", "ol", "p", "pre", "section", "table", "td", "th", "tr", "ul",
];

/// How the engine marks up highlights and decides container boundaries.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub wrapper_tag: String,
    /// Carries the highlight id; also how wrappers are recognised.
    pub id_attribute: String,
    pub category_attribute: String,
    /// Adds `cursor: pointer` to the wrapper style.
    pub clickable: bool,
    /// Elements that bound a highlight; a selection is split at every change
    /// of nearest block ancestor.
    pub block_tags: Vec<String>,
    pub skip_whitespace_segments: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            wrapper_tag: "span".to_string(),
            id_attribute: "data-highlight-id".to_string(),
            category_attribute: "data-highlight-category".to_string(),
            clickable: true,
            block_tags: DEFAULT_BLOCK_TAGS.iter().map(|t| t.to_string()).collect(),
            skip_whitespace_segments: true,
        }
    }
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b':'))
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), HighlightError> {
        let invalid = |reason: String| Err(HighlightError::InvalidConfig(reason));
        if !is_valid_name(&self.wrapper_tag) {
            return invalid(format!("wrapper tag `{}` is not a tag name", self.wrapper_tag));
        }
        for (field, value) in [
            ("id_attribute", &self.id_attribute),
            ("category_attribute", &self.category_attribute),
        ] {
            if !is_valid_name(value) {
                return invalid(format!("{field} `{value}` is not an attribute name"));
            }
        }
        if self.id_attribute.eq_ignore_ascii_case(&self.category_attribute) {
            return invalid("id and category attributes must differ".to_string());
        }
        if let Some(tag) = self.block_tags.iter().find(|t| !is_valid_name(t.trim())) {
            return invalid(format!("block tag `{tag}` is not a tag name"));
        }
        if self.is_block_tag(&self.wrapper_tag) {
            return invalid(format!(
                "wrapper tag `{}` is also a block tag",
                self.wrapper_tag
            ));
        }
        Ok(())
    }

    pub fn is_block_tag(&self, name: &str) -> bool {
        self.block_tags
            .iter()
            .any(|t| t.trim().eq_ignore_ascii_case(name))
    }

    /// `true` for elements created by the engine to materialize a highlight.
    pub fn is_wrapper(&self, doc: &Document, node: NodeId) -> bool {
        doc.is_element(node) && doc.attribute(node, &self.id_attribute).is_some()
    }

    pub fn wrapper_id<'d>(&self, doc: &'d Document, node: NodeId) -> Option<&'d str> {
        if doc.is_element(node) {
            doc.attribute(node, &self.id_attribute)
        } else {
            None
        }
    }

    pub(crate) fn is_block(&self, doc: &Document, node: NodeId) -> bool {
        doc.element_name(node).is_some_and(|n| self.is_block_tag(n)) && !self.is_wrapper(doc, node)
    }

    pub fn path_options(&self) -> PathOptions {
        PathOptions::ignoring(&self.id_attribute)
    }
}

/// Explicit construction input for a [`HighlightInfo`](crate::HighlightInfo).
///
/// `id`, `color` and `category` are optional: a missing id is generated, a
/// missing color falls back to the palette default.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HighlightConfig {
    pub id: Option<HighlightId>,
    pub parent_selector: String,
    pub text_start_at: usize,
    pub text_end_at: usize,
    pub text_content: String,
    pub color: Option<String>,
    pub category: Option<Category>,
}

impl HighlightConfig {
    pub fn default_color() -> String {
        HighlightColor::Yellow.css().to_string()
    }
}
