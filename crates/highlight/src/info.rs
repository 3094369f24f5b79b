use crate::config::{EngineConfig, HighlightConfig};
use crate::error::HighlightError;
use crate::selection::{Selection, SpanCandidate, nearest_block_ancestor, single_container_span};
use core_types::{Category, HighlightDescriptor, HighlightId};
use html::traverse::{flattened_text, text_leaves};
use html::{
    Bias, Document, LeafPosition, NodeId, StructuralPath, WrapperSpec, leaf_position_at,
    resolve_structural_path, structural_path, wrap_span,
};
use std::ops::Range;

/// One highlighted span.
///
/// The record owns the identity and the persisted fields. The live wrapper
/// is a rebuildable projection: it is set by [`HighlightInfo::materialize`]
/// and may be re-pointed by the engine, but is never persisted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HighlightInfo {
    id: HighlightId,
    parent_selector: StructuralPath,
    text_start_at: usize,
    text_end_at: usize,
    text_content: String,
    color: String,
    category: Option<Category>,
    live: Option<NodeId>,
}

/// Where a record sits in the current document.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Located {
    pub container: NodeId,
    pub start: LeafPosition,
    pub end: LeafPosition,
}

impl HighlightInfo {
    /// Record for a live selection inside one block.
    pub fn from_selection(
        doc: &Document,
        selection: &Selection,
        config: &EngineConfig,
        color: &str,
        category: Option<&str>,
    ) -> Result<Self, HighlightError> {
        let span = single_container_span(doc, selection, config)?;
        Self::from_candidate(doc, span, config, color, category)
    }

    /// Record for a container-local span, with a fresh id.
    pub fn from_candidate(
        doc: &Document,
        candidate: SpanCandidate,
        config: &EngineConfig,
        color: &str,
        category: Option<&str>,
    ) -> Result<Self, HighlightError> {
        let parent_selector = structural_path(doc, candidate.container, &config.path_options())?;
        let text = flattened_text(doc, candidate.container);
        let text_content = text
            .get(candidate.start..candidate.end)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                HighlightError::InvalidSelection(format!(
                    "{}..{} is not a text span of `{parent_selector}`",
                    candidate.start, candidate.end
                ))
            })?
            .to_string();
        Ok(Self {
            id: HighlightId::generate(),
            parent_selector,
            text_start_at: candidate.start,
            text_end_at: candidate.end,
            text_content,
            color: color.to_string(),
            category: category.map(str::to_string),
            live: None,
        })
    }

    pub fn from_descriptor(descriptor: HighlightDescriptor) -> Result<Self, HighlightError> {
        Self::from_config(HighlightConfig {
            id: Some(descriptor.id),
            parent_selector: descriptor.parent_selector,
            text_start_at: descriptor.text_start_at,
            text_end_at: descriptor.text_end_at,
            text_content: descriptor.text_content,
            color: Some(descriptor.color),
            category: descriptor.category,
        })
    }

    /// Validated construction from explicit fields.
    pub fn from_config(config: HighlightConfig) -> Result<Self, HighlightError> {
        let id = config.id.unwrap_or_else(HighlightId::generate);
        let malformed = |reason: String| HighlightError::MalformedDescriptor {
            id: id.clone(),
            reason,
        };
        let parent_selector = StructuralPath::parse(&config.parent_selector)
            .map_err(|_| malformed(format!("bad selector `{}`", config.parent_selector)))?;
        if config.text_content.is_empty() {
            return Err(malformed("empty text".to_string()));
        }
        if config.text_start_at >= config.text_end_at
            || config.text_end_at - config.text_start_at != config.text_content.len()
        {
            return Err(malformed(format!(
                "span {}..{} does not hold {} bytes of text",
                config.text_start_at,
                config.text_end_at,
                config.text_content.len()
            )));
        }
        Ok(Self {
            id,
            parent_selector,
            text_start_at: config.text_start_at,
            text_end_at: config.text_end_at,
            text_content: config.text_content,
            color: config.color.unwrap_or_else(HighlightConfig::default_color),
            category: config.category,
            live: None,
        })
    }

    pub fn id(&self) -> &HighlightId {
        &self.id
    }

    pub fn parent_selector(&self) -> &StructuralPath {
        &self.parent_selector
    }

    pub fn text_start_at(&self) -> usize {
        self.text_start_at
    }

    pub fn text_end_at(&self) -> usize {
        self.text_end_at
    }

    pub fn text_span(&self) -> Range<usize> {
        self.text_start_at..self.text_end_at
    }

    pub fn text_content(&self) -> &str {
        &self.text_content
    }

    pub fn color(&self) -> &str {
        &self.color
    }

    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    /// The wrapper materializing this record, if any.
    pub fn live_node(&self) -> Option<NodeId> {
        self.live
    }

    pub(crate) fn set_live_node(&mut self, node: Option<NodeId>) {
        self.live = node;
    }

    pub fn serialize(&self) -> HighlightDescriptor {
        HighlightDescriptor {
            id: self.id.clone(),
            parent_selector: self.parent_selector.as_str().to_string(),
            text_start_at: self.text_start_at,
            text_end_at: self.text_end_at,
            text_content: self.text_content.clone(),
            color: self.color.clone(),
            category: self.category.clone(),
        }
    }

    pub fn wrapper_spec(&self, config: &EngineConfig) -> WrapperSpec {
        let mut style = format!("background-color: {}", self.color);
        if config.clickable {
            style.push_str("; cursor: pointer");
        }
        let mut spec = WrapperSpec::new(&config.wrapper_tag)
            .with_attribute(&config.id_attribute, self.id.as_str());
        if let Some(category) = &self.category {
            spec = spec.with_attribute(&config.category_attribute, category);
        }
        spec.with_attribute("style", &style)
    }

    /// Resolve the stored selector and offsets against `doc`, check that the
    /// text there is still the recorded text and that the span stays inside
    /// its container's block.
    pub(crate) fn locate(&self, doc: &Document, config: &EngineConfig) -> Result<Located, HighlightError> {
        let located = self.resolve(doc, config)?;
        if let Some(block) = crossing_block(doc, &located, config) {
            return Err(HighlightError::UnresolvableAnchor {
                selector: self.parent_selector.to_string(),
                reason: format!("span crosses block boundary at {block}"),
            });
        }
        Ok(located)
    }

    /// [`HighlightInfo::locate`] without the block check.
    pub(crate) fn resolve(&self, doc: &Document, config: &EngineConfig) -> Result<Located, HighlightError> {
        let unresolvable = |reason: String| HighlightError::UnresolvableAnchor {
            selector: self.parent_selector.to_string(),
            reason,
        };
        let container = resolve_structural_path(doc, &self.parent_selector, &config.path_options())
            .map_err(|err| unresolvable(err.to_string()))?;
        let text = flattened_text(doc, container);
        match text.get(self.text_span()) {
            Some(found) if found == self.text_content => {}
            Some(found) => {
                return Err(unresolvable(format!(
                    "expected {:?}, found {found:?}",
                    self.text_content
                )));
            }
            None => {
                return Err(unresolvable(format!(
                    "span {}..{} is outside text of length {}",
                    self.text_start_at,
                    self.text_end_at,
                    text.len()
                )));
            }
        }
        let start = leaf_position_at(doc, container, self.text_start_at, Bias::Forward)
            .map_err(|err| unresolvable(err.to_string()))?;
        let end = leaf_position_at(doc, container, self.text_end_at, Bias::Backward)
            .map_err(|err| unresolvable(err.to_string()))?;
        Ok(Located {
            container,
            start,
            end,
        })
    }

    /// Wrap this record's span in the live tree and remember the wrapper.
    pub fn materialize(&mut self, doc: &mut Document, config: &EngineConfig) -> Result<NodeId, HighlightError> {
        let located = self.locate(doc, config)?;
        let wrapper = wrap_span(doc, located.start, located.end, &self.wrapper_spec(config))?;
        self.live = Some(wrapper);
        log::trace!(
            target: "highlight.info",
            "materialized {} as {wrapper} under {}",
            self.id,
            self.parent_selector
        );
        Ok(wrapper)
    }
}

/// First node of the span whose nearest block is not the container: the
/// foreign block itself, or the leaf when it has none.
pub(crate) fn crossing_block(doc: &Document, located: &Located, config: &EngineConfig) -> Option<NodeId> {
    let mut inside = false;
    for leaf in text_leaves(doc, located.container) {
        if leaf == located.start.leaf {
            inside = true;
        }
        if inside && doc.text(leaf).is_some_and(|t| !t.is_empty()) {
            let block = nearest_block_ancestor(doc, leaf, config);
            if block != Some(located.container) {
                return Some(block.unwrap_or(leaf));
            }
        }
        if leaf == located.end.leaf {
            break;
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selection::Anchor;
    use html::dom_snapshot::to_html;
    use html::parse_document;
    use html::traverse::text_leaves;

    const CLICK: &str = "<p>An element receives a <code>click</code> event when a pointing device \
button (such as a <a href='#'>mouse's primary <i>mouse button</i></a>) is both pressed and \
released while the pointer is <strong>located inside</strong> the element.</p>";

    fn click_selection(doc: &Document) -> Selection {
        let leaf = text_leaves(doc, doc.root())
            .find(|id| doc.text(*id) == Some("click"))
            .unwrap();
        Selection::new(Anchor::new(leaf, 0), Anchor::new(leaf, 5))
    }

    #[test]
    fn from_selection_records_offsets_and_text() {
        let doc = parse_document(CLICK);
        let config = EngineConfig::default();
        let info = HighlightInfo::from_selection(&doc, &click_selection(&doc), &config, "red", None)
            .unwrap();
        assert_eq!(info.text_content(), "click");
        assert_eq!(info.text_span(), 22..27);
        assert_eq!(info.parent_selector().as_str(), "p:nth-of-type(1)");
        assert!(info.id().as_str().starts_with("hl_"));
        assert_eq!(info.live_node(), None);
    }

    #[test]
    fn descriptor_round_trip_keeps_fields() {
        let doc = parse_document(CLICK);
        let config = EngineConfig::default();
        let info = HighlightInfo::from_selection(
            &doc,
            &click_selection(&doc),
            &config,
            "red",
            Some("todo"),
        )
        .unwrap();
        let restored = HighlightInfo::from_descriptor(info.serialize()).unwrap();
        assert_eq!(restored, info);
    }

    #[test]
    fn malformed_descriptor_is_rejected() {
        let config = HighlightConfig {
            id: Some(HighlightId::new("hl_bad")),
            parent_selector: "p:nth-of-type(1)".into(),
            text_start_at: 22,
            text_end_at: 28,
            text_content: "click".into(),
            ..HighlightConfig::default()
        };
        assert!(matches!(
            HighlightInfo::from_config(config),
            Err(HighlightError::MalformedDescriptor { id, .. }) if id.as_str() == "hl_bad"
        ));
    }

    #[test]
    fn missing_color_uses_palette_default() {
        let info = HighlightInfo::from_config(HighlightConfig {
            parent_selector: "body".into(),
            text_start_at: 0,
            text_end_at: 1,
            text_content: "x".into(),
            ..HighlightConfig::default()
        })
        .unwrap();
        assert_eq!(info.color(), HighlightConfig::default_color());
        assert!(info.id().as_str().starts_with("hl_"));
    }

    #[test]
    fn materialize_wraps_with_styled_wrapper() {
        let mut doc = parse_document(CLICK);
        let config = EngineConfig::default();
        let mut info = HighlightInfo::from_selection(
            &doc,
            &click_selection(&doc),
            &config,
            "red",
            Some("ui"),
        )
        .unwrap();
        let wrapper = info.materialize(&mut doc, &config).unwrap();
        assert_eq!(info.live_node(), Some(wrapper));
        assert_eq!(flattened_text(&doc, wrapper), "click");
        let expected = format!(
            "<code><span data-highlight-id=\"{}\" data-highlight-category=\"ui\" \
style=\"background-color: red; cursor: pointer\">click</span></code>",
            info.id()
        );
        assert!(to_html(&doc).contains(&expected));
    }

    #[test]
    fn stale_text_is_unresolvable() {
        let mut doc = parse_document("<p>hello world</p>");
        let mut info = HighlightInfo::from_config(HighlightConfig {
            parent_selector: "p:nth-of-type(1)".into(),
            text_start_at: 6,
            text_end_at: 11,
            text_content: "there".into(),
            ..HighlightConfig::default()
        })
        .unwrap();
        assert!(matches!(
            info.materialize(&mut doc, &EngineConfig::default()),
            Err(HighlightError::UnresolvableAnchor { .. })
        ));
        assert_eq!(to_html(&doc), "<p>hello world</p>");
    }
}
