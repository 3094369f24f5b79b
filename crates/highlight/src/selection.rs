//! User selections and their split into per-container spans.

use crate::config::EngineConfig;
use crate::error::HighlightError;
use html::traverse::{common_ancestor, compare_document_position, text_leaves};
use html::{Document, LeafPosition, NodeId, offset_of};
use std::cmp::Ordering;

/// One end of a selection: a text leaf and a byte offset inside it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Anchor {
    pub node: NodeId,
    pub offset: usize,
}

impl Anchor {
    pub fn new(node: NodeId, offset: usize) -> Self {
        Self { node, offset }
    }

    fn position(self) -> LeafPosition {
        LeafPosition {
            leaf: self.node,
            offset: self.offset,
        }
    }
}

/// A live selection. The ends may come in either order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Selection {
    pub start: Anchor,
    pub end: Anchor,
}

impl Selection {
    pub fn new(start: Anchor, end: Anchor) -> Self {
        Self { start, end }
    }

    /// Check both anchors and put them in document order.
    pub fn normalized(&self, doc: &Document) -> Result<Selection, HighlightError> {
        for anchor in [self.start, self.end] {
            let text = doc.text(anchor.node).ok_or_else(|| {
                HighlightError::InvalidSelection("only text spans can be highlighted".to_string())
            })?;
            if !doc.is_attached(anchor.node) {
                return Err(HighlightError::InvalidSelection(format!(
                    "{} is not in the document",
                    anchor.node
                )));
            }
            if anchor.offset > text.len() || !text.is_char_boundary(anchor.offset) {
                return Err(HighlightError::InvalidSelection(format!(
                    "offset {} is not a character position in {}",
                    anchor.offset, anchor.node
                )));
            }
        }
        let order = match compare_document_position(doc, self.start.node, self.end.node) {
            Ordering::Equal => self.start.offset.cmp(&self.end.offset),
            other => other,
        };
        match order {
            Ordering::Less => Ok(*self),
            Ordering::Greater => Ok(Selection::new(self.end, self.start)),
            Ordering::Equal => Err(HighlightError::InvalidSelection(
                "selection is empty".to_string(),
            )),
        }
    }
}

/// A span of flattened text inside one container.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SpanCandidate {
    pub container: NodeId,
    pub start: usize,
    pub end: usize,
}

/// The nearest block-level element containing `node` (itself included),
/// skipping highlight wrappers. Falls back to the outermost element when no
/// ancestor is a block.
pub fn nearest_block_ancestor(doc: &Document, node: NodeId, config: &EngineConfig) -> Option<NodeId> {
    let mut fallback = None;
    for candidate in std::iter::once(node).chain(doc.ancestors(node)) {
        if !doc.is_element(candidate) || config.is_wrapper(doc, candidate) {
            continue;
        }
        if config.is_block(doc, candidate) {
            return Some(candidate);
        }
        fallback = Some(candidate);
    }
    fallback
}

/// Container and offsets for a selection that stays inside one block.
pub(crate) fn single_container_span(
    doc: &Document,
    selection: &Selection,
    config: &EngineConfig,
) -> Result<SpanCandidate, HighlightError> {
    let selection = selection.normalized(doc)?;
    let shared = common_ancestor(doc, selection.start.node, selection.end.node)
        .ok_or_else(|| HighlightError::InvalidSelection("anchors share no ancestor".to_string()))?;
    let container = nearest_block_ancestor(doc, shared, config).ok_or_else(|| {
        HighlightError::InvalidSelection("selection is not inside an element".to_string())
    })?;
    Ok(SpanCandidate {
        container,
        start: offset_of(doc, container, selection.start.position())?,
        end: offset_of(doc, container, selection.end.position())?,
    })
}

struct Segment {
    container: NodeId,
    first: LeafPosition,
    last: LeafPosition,
    whitespace_only: bool,
}

/// Split a selection into one span per block it touches, in document order.
///
/// Leaves are grouped by nearest block ancestor; each run of leaves sharing
/// one becomes a candidate. With `skip_whitespace_segments`, runs holding
/// only whitespace are dropped when the selection touches more than one
/// block (the formatting whitespace between paragraphs).
pub fn split_across_containers(
    doc: &Document,
    selection: &Selection,
    config: &EngineConfig,
) -> Result<Vec<SpanCandidate>, HighlightError> {
    let selection = selection.normalized(doc)?;
    let (start, end) = (selection.start, selection.end);
    let mut segments: Vec<Segment> = Vec::new();
    let mut inside = false;

    for leaf in text_leaves(doc, doc.root()) {
        if leaf == start.node {
            inside = true;
        }
        if !inside {
            continue;
        }
        let text = doc.text(leaf).unwrap_or_default();
        let lo = if leaf == start.node { start.offset } else { 0 };
        let hi = if leaf == end.node { end.offset } else { text.len() };
        let piece = text.get(lo..hi).unwrap_or_default();
        let container = nearest_block_ancestor(doc, leaf, config).ok_or_else(|| {
            HighlightError::InvalidSelection("selection is not inside an element".to_string())
        })?;
        let from = LeafPosition { leaf, offset: lo };
        let to = LeafPosition { leaf, offset: hi };
        match segments.last_mut() {
            Some(segment) if segment.container == container => {
                segment.last = to;
                segment.whitespace_only &= piece.trim().is_empty();
            }
            _ => segments.push(Segment {
                container,
                first: from,
                last: to,
                whitespace_only: piece.trim().is_empty(),
            }),
        }
        if leaf == end.node {
            break;
        }
    }

    let multi_block = segments.len() > 1;
    let mut out = Vec::with_capacity(segments.len());
    for segment in segments {
        if multi_block && config.skip_whitespace_segments && segment.whitespace_only {
            log::trace!(
                target: "highlight.selection",
                "skipping whitespace run in {}",
                segment.container
            );
            continue;
        }
        let candidate = SpanCandidate {
            container: segment.container,
            start: offset_of(doc, segment.container, segment.first)?,
            end: offset_of(doc, segment.container, segment.last)?,
        };
        if candidate.start < candidate.end {
            out.push(candidate);
        }
    }
    if out.is_empty() {
        return Err(HighlightError::InvalidSelection(
            "selection contains no text".to_string(),
        ));
    }
    log::debug!(
        target: "highlight.selection",
        "selection split into {} span(s)",
        out.len()
    );
    Ok(out)
}
