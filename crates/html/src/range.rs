//! Text positions and span wrapping.
//!
//! Offsets are UTF-8 byte offsets into the flattened text of a container.
//! Wrapping splits text leaves and inline elements at the span edges, and
//! every fragment remembers what it was split from. Unwrapping joins exactly
//! those fragments back together, so wrap followed by unwrap restores the
//! original tree shape.

use crate::document::Document;
use crate::traverse::{common_ancestor, compare_document_position, for_each_text_leaf};
use crate::types::{DomError, NodeId, NodeKind};
use std::cmp::Ordering;
use std::ops::ControlFlow;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LeafPosition {
    pub leaf: NodeId,
    pub offset: usize,
}

/// Which leaf wins when an offset falls exactly between two leaves.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Bias {
    /// Start of the following leaf. Use for span starts.
    Forward,
    /// End of the preceding leaf. Use for span ends.
    Backward,
}

/// Map a flattened-text offset under `container` to a leaf position.
///
/// Empty leaves are never returned. An offset equal to the total length
/// resolves to the end of the last leaf regardless of bias.
pub fn leaf_position_at(
    doc: &Document,
    container: NodeId,
    offset: usize,
    bias: Bias,
) -> Result<LeafPosition, DomError> {
    let mut acc = 0usize;
    let mut last: Option<(NodeId, usize)> = None;
    let mut found: Option<LeafPosition> = None;
    let _ = for_each_text_leaf(doc, container, |leaf, text| {
        if text.is_empty() {
            return ControlFlow::Continue(());
        }
        let end = acc + text.len();
        let hit = match bias {
            Bias::Forward => offset < end,
            Bias::Backward => offset <= end,
        };
        if hit {
            found = Some(LeafPosition {
                leaf,
                offset: offset - acc,
            });
            return ControlFlow::Break(());
        }
        last = Some((leaf, text.len()));
        acc = end;
        ControlFlow::Continue(())
    });

    let position = match (found, last) {
        (Some(position), _) => position,
        (None, Some((leaf, len))) if offset == acc => LeafPosition { leaf, offset: len },
        _ => return Err(DomError::OffsetOutOfBounds { offset, len: acc }),
    };
    let text = doc.text(position.leaf).unwrap_or_default();
    if !text.is_char_boundary(position.offset) {
        return Err(DomError::NotCharBoundary {
            node: position.leaf,
            offset: position.offset,
        });
    }
    Ok(position)
}

/// Inverse of [`leaf_position_at`]: flattened offset of `position` under
/// `container`.
pub fn offset_of(doc: &Document, container: NodeId, position: LeafPosition) -> Result<usize, DomError> {
    let mut acc = 0usize;
    let mut result = Err(DomError::NotADescendant {
        ancestor: container,
        node: position.leaf,
    });
    let _ = for_each_text_leaf(doc, container, |leaf, text| {
        if leaf == position.leaf {
            result = if position.offset <= text.len() {
                Ok(acc + position.offset)
            } else {
                Err(DomError::OffsetOutOfBounds {
                    offset: position.offset,
                    len: text.len(),
                })
            };
            return ControlFlow::Break(());
        }
        acc += text.len();
        ControlFlow::Continue(())
    });
    result
}

/// Tag and attributes of the element created by [`wrap_span`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WrapperSpec {
    pub tag: String,
    pub attributes: Vec<(String, Option<String>)>,
}

impl WrapperSpec {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            attributes: Vec::new(),
        }
    }

    pub fn with_attribute(mut self, name: &str, value: &str) -> Self {
        self.attributes.push((name.to_string(), Some(value.to_string())));
        self
    }
}

/// Wrap the text between `start` and `end` in a new element.
///
/// Leaves and inline ancestors are split at both edges so the wrapper can sit
/// under their lowest common ancestor. All arguments are validated before the
/// tree is touched.
pub fn wrap_span(
    doc: &mut Document,
    start: LeafPosition,
    end: LeafPosition,
    spec: &WrapperSpec,
) -> Result<NodeId, DomError> {
    let start_len = checked_leaf(doc, start)?;
    let end_len = checked_leaf(doc, end)?;
    if start.offset >= start_len || end.offset == 0 {
        return Err(DomError::EmptySpan);
    }
    match compare_document_position(doc, start.leaf, end.leaf) {
        Ordering::Greater => return Err(DomError::EmptySpan),
        Ordering::Equal if start.offset >= end.offset => return Err(DomError::EmptySpan),
        _ => {}
    }
    if common_ancestor(doc, start.leaf, end.leaf).is_none() {
        return Err(DomError::Detached(end.leaf));
    }

    // End first: splitting it never moves the start position.
    let mut last = end.leaf;
    if end.offset < end_len {
        doc.split_text(end.leaf, end.offset)?;
    }
    let mut first = start.leaf;
    if start.offset > 0 {
        first = doc.split_text(start.leaf, start.offset)?;
        if start.leaf == end.leaf {
            last = first;
        }
    }

    let ancestor = if first == last {
        doc.parent(first).ok_or(DomError::Detached(first))?
    } else {
        common_ancestor(doc, first, last).ok_or(DomError::Detached(last))?
    };

    let mut lead = first;
    loop {
        let parent = doc.parent(lead).ok_or(DomError::Detached(lead))?;
        if parent == ancestor {
            break;
        }
        let index = doc.index_in_parent(lead).ok_or(DomError::Detached(lead))?;
        lead = if index > 0 {
            doc.split_element(parent, index)?
        } else {
            parent
        };
    }

    let mut tail = last;
    loop {
        let parent = doc.parent(tail).ok_or(DomError::Detached(tail))?;
        if parent == ancestor {
            break;
        }
        let index = doc.index_in_parent(tail).ok_or(DomError::Detached(tail))?;
        if index + 1 < doc.children(parent).len() {
            doc.split_element(parent, index + 1)?;
        }
        tail = parent;
    }

    let from = doc.index_in_parent(lead).ok_or(DomError::Detached(lead))?;
    let to = doc.index_in_parent(tail).ok_or(DomError::Detached(tail))?;
    let moved: Vec<NodeId> = doc.children(ancestor)[from..=to].to_vec();
    for node in &moved {
        doc.detach(*node)?;
    }
    let wrapper = doc.create_element(&spec.tag, spec.attributes.clone());
    for node in moved {
        doc.append_child(wrapper, node)?;
    }
    doc.insert_child(ancestor, from, wrapper)?;
    prune_empty_text_around(doc, wrapper)?;
    log::debug!(
        target: "html.range",
        "wrapped {}..{} under {ancestor} as {wrapper}",
        start.leaf,
        end.leaf
    );
    Ok(wrapper)
}

fn checked_leaf(doc: &Document, position: LeafPosition) -> Result<usize, DomError> {
    let text = match doc.kind(position.leaf) {
        Some(NodeKind::Text { text }) => text,
        Some(_) => return Err(DomError::NotAText(position.leaf)),
        None => return Err(DomError::MissingNode(position.leaf)),
    };
    if !doc.is_attached(position.leaf) {
        return Err(DomError::Detached(position.leaf));
    }
    if position.offset > text.len() {
        return Err(DomError::OffsetOutOfBounds {
            offset: position.offset,
            len: text.len(),
        });
    }
    if !text.is_char_boundary(position.offset) {
        return Err(DomError::NotCharBoundary {
            node: position.leaf,
            offset: position.offset,
        });
    }
    Ok(text.len())
}

fn prune_empty_text_around(doc: &mut Document, wrapper: NodeId) -> Result<(), DomError> {
    let candidates = [
        doc.previous_sibling(wrapper),
        doc.next_sibling(wrapper),
        doc.children(wrapper).first().copied(),
        doc.children(wrapper).last().copied(),
    ];
    for node in candidates.into_iter().flatten() {
        if doc.text(node) == Some("") && doc.parent(node).is_some() {
            doc.detach(node)?;
        }
    }
    Ok(())
}

/// Result of [`unwrap_span`].
#[derive(Debug, Default, PartialEq, Eq)]
pub struct UnwrapOutcome {
    /// Nodes now occupying the wrapper's old slot, after joins.
    pub nodes: Vec<NodeId>,
    /// Joins that were abandoned; the nodes involved are left as they were.
    pub conflicts: Vec<DomError>,
}

/// Remove `wrapper`, put its children in its place and join the exposed
/// edges with their new neighbours where both are pieces of one split node.
pub fn unwrap_span(doc: &mut Document, wrapper: NodeId) -> Result<UnwrapOutcome, DomError> {
    if !doc.is_element(wrapper) {
        return Err(DomError::NotAContainer(wrapper));
    }
    let parent = doc.parent(wrapper).ok_or(DomError::Detached(wrapper))?;
    let index = doc.detach(wrapper)?;
    let children = doc.take_children(wrapper);
    for (i, child) in children.iter().enumerate() {
        doc.insert_child(parent, index + i, *child)?;
    }

    let mut outcome = UnwrapOutcome::default();
    let (Some(&first), Some(&last)) = (children.first(), children.last()) else {
        // Nothing was inside; the old neighbours may now touch.
        let siblings = doc.children(parent);
        if index > 0 && index < siblings.len() {
            let (left, right) = (siblings[index - 1], siblings[index]);
            join_fragments(doc, left, right, &mut outcome.conflicts)?;
        }
        return Ok(outcome);
    };

    if let Some(next) = doc.next_sibling(last) {
        join_fragments(doc, last, next, &mut outcome.conflicts)?;
    }
    let mut left_joined = None;
    if let Some(prev) = doc.previous_sibling(first) {
        if join_fragments(doc, prev, first, &mut outcome.conflicts)? {
            left_joined = Some(prev);
        }
    }
    outcome.nodes = left_joined
        .into_iter()
        .chain(children.into_iter().filter(|c| doc.parent(*c) == Some(parent)))
        .collect();
    log::debug!(
        target: "html.range",
        "unwrapped {wrapper}: {} nodes, {} conflicts",
        outcome.nodes.len(),
        outcome.conflicts.len()
    );
    Ok(outcome)
}

/// Join `right` into `left` if both were split from the same node.
///
/// Returns `true` when `right` was absorbed. Pieces of different nodes are
/// left alone; pieces of one node that no longer agree on kind, tag or
/// attributes are recorded as a conflict and also left alone.
fn join_fragments(
    doc: &mut Document,
    left: NodeId,
    right: NodeId,
    conflicts: &mut Vec<DomError>,
) -> Result<bool, DomError> {
    if doc.origin_root(left) != doc.origin_root(right) {
        return Ok(false);
    }
    match (doc.kind(left), doc.kind(right)) {
        (Some(NodeKind::Text { .. }), Some(NodeKind::Text { text })) => {
            let tail = text.clone();
            doc.append_text(left, &tail)?;
            doc.detach(right)?;
            log::trace!(target: "html.range", "joined text {right} into {left}");
            Ok(true)
        }
        (
            Some(NodeKind::Element {
                name: left_name,
                attributes: left_attributes,
            }),
            Some(NodeKind::Element {
                name: right_name,
                attributes: right_attributes,
            }),
        ) if left_name == right_name && left_attributes == right_attributes => {
            let junction_left = doc.children(left).last().copied();
            let moved = doc.take_children(right);
            let junction_right = moved.first().copied();
            for child in moved {
                doc.append_child(left, child)?;
            }
            doc.detach(right)?;
            log::trace!(target: "html.range", "joined element {right} into {left}");
            if let (Some(a), Some(b)) = (junction_left, junction_right) {
                join_fragments(doc, a, b, conflicts)?;
            }
            Ok(true)
        }
        _ => {
            log::warn!(
                target: "html.range",
                "cannot join fragments {left} and {right}; leaving them apart"
            );
            conflicts.push(DomError::MergeConflict { left, right });
            Ok(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom_snapshot::to_html;
    use crate::parse_document;
    use crate::traverse::flattened_text;

    const MARK: &str = "data-mark";

    fn spec() -> WrapperSpec {
        WrapperSpec::new("mark").with_attribute(MARK, "1")
    }

    fn wrap_offsets(doc: &mut Document, container: NodeId, start: usize, end: usize) -> NodeId {
        let s = leaf_position_at(doc, container, start, Bias::Forward).unwrap();
        let e = leaf_position_at(doc, container, end, Bias::Backward).unwrap();
        wrap_span(doc, s, e, &spec()).unwrap()
    }

    #[test]
    fn positions_respect_bias_at_leaf_edges() {
        let doc = parse_document("<p>ab<b>cd</b>ef</p>");
        let p = doc.children(doc.root())[0];
        let b_text = doc.children(doc.children(p)[1])[0];
        let forward = leaf_position_at(&doc, p, 2, Bias::Forward).unwrap();
        assert_eq!(forward, LeafPosition { leaf: b_text, offset: 0 });
        let backward = leaf_position_at(&doc, p, 2, Bias::Backward).unwrap();
        assert_eq!(backward.offset, 2);
        assert_eq!(offset_of(&doc, p, forward), Ok(2));
        assert_eq!(offset_of(&doc, p, backward), Ok(2));
        let end = leaf_position_at(&doc, p, 6, Bias::Forward).unwrap();
        assert_eq!(end.offset, 2);
        assert_eq!(
            leaf_position_at(&doc, p, 7, Bias::Forward),
            Err(DomError::OffsetOutOfBounds { offset: 7, len: 6 })
        );
    }

    #[test]
    fn positions_reject_mid_char_offsets() {
        let doc = parse_document("<p>caf\u{e9}</p>");
        let p = doc.children(doc.root())[0];
        assert!(matches!(
            leaf_position_at(&doc, p, 4, Bias::Forward),
            Err(DomError::NotCharBoundary { offset: 4, .. })
        ));
    }

    #[test]
    fn wrap_inside_single_leaf() {
        let mut doc = parse_document("<p>An element receives a click event</p>");
        let p = doc.children(doc.root())[0];
        let wrapper = wrap_offsets(&mut doc, p, 22, 27);
        assert_eq!(flattened_text(&doc, wrapper), "click");
        assert_eq!(
            to_html(&doc),
            "<p>An element receives a <mark data-mark=\"1\">click</mark> event</p>"
        );
    }

    #[test]
    fn wrap_across_inline_boundaries_splits_elements() {
        let mut doc = parse_document("<p>ab<b>cd<i>ef</i></b>gh</p>");
        let p = doc.children(doc.root())[0];
        let wrapper = wrap_offsets(&mut doc, p, 3, 7);
        assert_eq!(flattened_text(&doc, wrapper), "defg");
        assert_eq!(flattened_text(&doc, p), "abcdefgh");
        assert_eq!(
            to_html(&doc),
            "<p>ab<b>c</b><mark data-mark=\"1\"><b>d<i>ef</i></b>g</mark>h</p>"
        );
    }

    #[test]
    fn unwrap_restores_exact_shape() {
        let source = "<p>ab<b>cd<i>ef</i></b>gh</p>";
        let mut doc = parse_document(source);
        let p = doc.children(doc.root())[0];
        let before = doc.children(p).to_vec();
        let wrapper = wrap_offsets(&mut doc, p, 3, 7);
        let outcome = unwrap_span(&mut doc, wrapper).unwrap();
        assert!(outcome.conflicts.is_empty());
        assert_eq!(to_html(&doc), source);
        assert_eq!(doc.children(p), before.as_slice());
        let b = before[1];
        assert_eq!(doc.children(b).len(), 2);
        assert_eq!(doc.text(doc.children(b)[0]), Some("cd"));
    }

    #[test]
    fn nested_wraps_unwrap_in_any_order() {
        let source = "<p>one two three four</p>";
        let mut doc = parse_document(source);
        let p = doc.children(doc.root())[0];
        let first = wrap_offsets(&mut doc, p, 0, 3);
        let second = wrap_offsets(&mut doc, p, 8, 13);
        unwrap_span(&mut doc, first).unwrap();
        assert_eq!(
            to_html(&doc),
            "<p>one two <mark data-mark=\"1\">three</mark> four</p>"
        );
        unwrap_span(&mut doc, second).unwrap();
        assert_eq!(to_html(&doc), source);
        assert_eq!(doc.children(p).len(), 1);
    }

    #[test]
    fn empty_and_reversed_spans_are_rejected() {
        let mut doc = parse_document("<p>abc</p>");
        let p = doc.children(doc.root())[0];
        let leaf = doc.children(p)[0];
        let at = |offset| LeafPosition { leaf, offset };
        assert_eq!(wrap_span(&mut doc, at(1), at(1), &spec()), Err(DomError::EmptySpan));
        assert_eq!(wrap_span(&mut doc, at(2), at(1), &spec()), Err(DomError::EmptySpan));
        assert_eq!(wrap_span(&mut doc, at(3), at(3), &spec()), Err(DomError::EmptySpan));
        assert_eq!(to_html(&doc), "<p>abc</p>");
    }

    #[test]
    fn incompatible_fragments_are_reported() {
        let mut doc = parse_document("<p><b>abcd</b>ef</p>");
        let p = doc.children(doc.root())[0];
        let wrapper = wrap_offsets(&mut doc, p, 2, 5);
        let b = doc.children(p)[0];
        let fragment = doc.children(wrapper)[0];
        assert_eq!(doc.split_origin(fragment), Some(b));
        doc.set_attribute(b, "class", "changed").unwrap();
        let outcome = unwrap_span(&mut doc, wrapper).unwrap();
        assert_eq!(
            outcome.conflicts,
            vec![DomError::MergeConflict { left: b, right: fragment }]
        );
        assert_eq!(flattened_text(&doc, p), "abcdef");
        assert_eq!(doc.children(p).len(), 3);
    }
}
