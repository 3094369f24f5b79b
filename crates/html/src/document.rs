//! Mutable arena DOM.
//!
//! Nodes live in a flat arena and refer to each other by [`NodeId`]. Removing
//! a node only detaches it: the record and its id stay valid, so callers can
//! hold ids across mutations and check liveness with
//! [`Document::is_attached`].
//!
//! Splitting a node records the original it was cut from (`split_origin`).
//! That provenance is what lets a later join restore the exact pre-split
//! shape instead of guessing from tag names.

use crate::types::{DomError, NodeId, NodeKind};

#[derive(Clone, Debug)]
struct NodeRecord {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    split_origin: Option<NodeId>,
}

#[derive(Clone, Debug)]
pub struct Document {
    nodes: Vec<NodeRecord>,
    root: NodeId,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        let mut doc = Document {
            nodes: Vec::new(),
            root: NodeId(0),
        };
        doc.root = doc.push(NodeKind::Document { doctype: None });
        doc
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn contains(&self, id: NodeId) -> bool {
        id.index() < self.nodes.len()
    }

    pub fn kind(&self, id: NodeId) -> Option<&NodeKind> {
        self.nodes.get(id.index()).map(|r| &r.kind)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id.index()).and_then(|r| r.parent)
    }

    /// Children in order; empty for leaves and unknown ids.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(id.index())
            .map(|r| r.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn is_text(&self, id: NodeId) -> bool {
        matches!(self.kind(id), Some(NodeKind::Text { .. }))
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        matches!(self.kind(id), Some(NodeKind::Element { .. }))
    }

    pub fn text(&self, id: NodeId) -> Option<&str> {
        match self.kind(id) {
            Some(NodeKind::Text { text }) => Some(text),
            _ => None,
        }
    }

    pub fn element_name(&self, id: NodeId) -> Option<&str> {
        match self.kind(id) {
            Some(NodeKind::Element { name, .. }) => Some(name),
            _ => None,
        }
    }

    /// Value of attribute `name`; valueless attributes read as `""`.
    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        match self.kind(id) {
            Some(NodeKind::Element { attributes, .. }) => attributes
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.as_deref().unwrap_or("")),
            _ => None,
        }
    }

    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) -> Result<(), DomError> {
        match &mut self.record_mut(id)?.kind {
            NodeKind::Element { attributes, .. } => {
                match attributes
                    .iter_mut()
                    .find(|(k, _)| k.eq_ignore_ascii_case(name))
                {
                    Some((_, v)) => *v = Some(value.to_string()),
                    None => attributes.push((name.to_ascii_lowercase(), Some(value.to_string()))),
                }
                Ok(())
            }
            _ => Err(DomError::NotAContainer(id)),
        }
    }

    pub fn set_doctype(&mut self, doctype: Option<String>) {
        let root = self.root;
        if let NodeKind::Document { doctype: dt } = &mut self.nodes[root.index()].kind {
            *dt = doctype;
        }
    }

    /// The node this one was split off from, following chains of splits back
    /// to the first original. `None` for nodes that were never split off.
    pub fn split_origin(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id.index()).and_then(|r| r.split_origin)
    }

    /// `id` itself for originals, its origin for fragments.
    pub fn origin_root(&self, id: NodeId) -> NodeId {
        self.split_origin(id).unwrap_or(id)
    }

    pub fn create_element(&mut self, name: &str, attributes: Vec<(String, Option<String>)>) -> NodeId {
        self.push(NodeKind::Element {
            name: name.to_ascii_lowercase(),
            attributes,
        })
    }

    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.push(NodeKind::Text {
            text: text.to_string(),
        })
    }

    pub fn create_comment(&mut self, text: &str) -> NodeId {
        self.push(NodeKind::Comment {
            text: text.to_string(),
        })
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        let len = self.children(parent).len();
        self.insert_child(parent, len, child)
    }

    /// Insert a detached `child` at position `index` among `parent`'s children.
    pub fn insert_child(&mut self, parent: NodeId, index: usize, child: NodeId) -> Result<(), DomError> {
        self.check_insert(parent, child)?;
        let siblings = &mut self.nodes[parent.index()].children;
        let index = index.min(siblings.len());
        siblings.insert(index, child);
        self.nodes[child.index()].parent = Some(parent);
        Ok(())
    }

    pub fn insert_after(&mut self, reference: NodeId, child: NodeId) -> Result<(), DomError> {
        let parent = self.parent(reference).ok_or(DomError::Detached(reference))?;
        let index = self.index_in_parent(reference).ok_or(DomError::Detached(reference))?;
        self.insert_child(parent, index + 1, child)
    }

    /// Remove `id` from its parent, returning the position it occupied.
    ///
    /// The subtree below `id` stays intact and can be re-inserted elsewhere.
    pub fn detach(&mut self, id: NodeId) -> Result<usize, DomError> {
        let parent = self.record(id)?.parent.ok_or(DomError::Detached(id))?;
        let siblings = &mut self.nodes[parent.index()].children;
        let index = siblings
            .iter()
            .position(|c| *c == id)
            .ok_or(DomError::Detached(id))?;
        siblings.remove(index);
        self.nodes[id.index()].parent = None;
        Ok(index)
    }

    pub fn index_in_parent(&self, id: NodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.children(parent).iter().position(|c| *c == id)
    }

    pub fn previous_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let index = self.index_in_parent(id)?;
        index
            .checked_sub(1)
            .map(|i| self.children(parent)[i])
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let index = self.index_in_parent(id)?;
        self.children(parent).get(index + 1).copied()
    }

    /// Ancestors of `id`, nearest first, excluding `id` itself.
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            doc: self,
            next: self.parent(id),
        }
    }

    pub fn is_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        self.ancestors(node).any(|a| a == ancestor)
    }

    /// `true` when `id` is connected to the document root.
    pub fn is_attached(&self, id: NodeId) -> bool {
        id == self.root || self.is_ancestor(self.root, id)
    }

    pub fn body(&self) -> Option<NodeId> {
        self.find_element(self.root, |doc, id| doc.element_name(id) == Some("body"))
    }

    /// First element under `scope` (depth-first, document order) matching `pred`.
    pub fn find_element(
        &self,
        scope: NodeId,
        pred: impl Fn(&Document, NodeId) -> bool,
    ) -> Option<NodeId> {
        let mut stack: Vec<NodeId> = self.children(scope).iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            if self.is_element(id) {
                if pred(self, id) {
                    return Some(id);
                }
                stack.extend(self.children(id).iter().rev().copied());
            }
        }
        None
    }

    /// Split text leaf `id` at byte `at`.
    ///
    /// `id` keeps `[0, at)`; a new fragment holding `[at, len)` is inserted
    /// right after it and returned. Both halves must be non-empty.
    pub fn split_text(&mut self, id: NodeId, at: usize) -> Result<NodeId, DomError> {
        let text = self.text(id).ok_or(DomError::NotAText(id))?;
        let len = text.len();
        if at == 0 || at >= len {
            return Err(DomError::OffsetOutOfBounds { offset: at, len });
        }
        if !text.is_char_boundary(at) {
            return Err(DomError::NotCharBoundary { node: id, offset: at });
        }
        if self.parent(id).is_none() {
            return Err(DomError::Detached(id));
        }
        let tail = text[at..].to_string();
        if let NodeKind::Text { text } = &mut self.nodes[id.index()].kind {
            text.truncate(at);
        }
        let origin = self.origin_root(id);
        let fragment = self.push(NodeKind::Text { text: tail });
        self.nodes[fragment.index()].split_origin = Some(origin);
        self.insert_after(id, fragment)?;
        log::trace!(target: "html.document", "split text {id} at {at} -> {fragment}");
        Ok(fragment)
    }

    /// Split element `id` before child position `at`.
    ///
    /// Children `[at, len)` move into a shallow copy of `id` (same tag and
    /// attributes) inserted right after it; the copy is returned.
    pub fn split_element(&mut self, id: NodeId, at: usize) -> Result<NodeId, DomError> {
        let (name, attributes) = match self.kind(id) {
            Some(NodeKind::Element { name, attributes }) => (name.clone(), attributes.clone()),
            Some(_) => return Err(DomError::NotAContainer(id)),
            None => return Err(DomError::MissingNode(id)),
        };
        let len = self.children(id).len();
        if at == 0 || at >= len {
            return Err(DomError::OffsetOutOfBounds { offset: at, len });
        }
        if self.parent(id).is_none() {
            return Err(DomError::Detached(id));
        }
        let origin = self.origin_root(id);
        let fragment = self.push(NodeKind::Element { name, attributes });
        self.nodes[fragment.index()].split_origin = Some(origin);
        let moved = self.nodes[id.index()].children.split_off(at);
        for child in &moved {
            self.nodes[child.index()].parent = Some(fragment);
        }
        self.nodes[fragment.index()].children = moved;
        self.insert_after(id, fragment)?;
        log::trace!(target: "html.document", "split element {id} at child {at} -> {fragment}");
        Ok(fragment)
    }

    pub(crate) fn take_children(&mut self, id: NodeId) -> Vec<NodeId> {
        let children = std::mem::take(&mut self.nodes[id.index()].children);
        for child in &children {
            self.nodes[child.index()].parent = None;
        }
        children
    }

    pub(crate) fn append_text(&mut self, id: NodeId, tail: &str) -> Result<(), DomError> {
        match &mut self.record_mut(id)?.kind {
            NodeKind::Text { text } => {
                text.push_str(tail);
                Ok(())
            }
            _ => Err(DomError::NotAText(id)),
        }
    }

    fn push(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(NodeRecord {
            kind,
            parent: None,
            children: Vec::new(),
            split_origin: None,
        });
        id
    }

    fn record(&self, id: NodeId) -> Result<&NodeRecord, DomError> {
        self.nodes.get(id.index()).ok_or(DomError::MissingNode(id))
    }

    fn record_mut(&mut self, id: NodeId) -> Result<&mut NodeRecord, DomError> {
        self.nodes.get_mut(id.index()).ok_or(DomError::MissingNode(id))
    }

    fn check_insert(&self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        let parent_record = self.record(parent)?;
        let child_record = self.record(child)?;
        if !parent_record.kind.allows_children() {
            return Err(DomError::NotAContainer(parent));
        }
        if parent == child || self.is_ancestor(child, parent) {
            return Err(DomError::CycleDetected { parent, child });
        }
        if child_record.parent.is_some() {
            debug_assert!(false, "child already has a parent");
            return Err(DomError::CycleDetected { parent, child });
        }
        Ok(())
    }
}

pub struct Ancestors<'a> {
    doc: &'a Document,
    next: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.doc.parent(current);
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (Document, NodeId, NodeId, NodeId) {
        let mut doc = Document::new();
        let p = doc.create_element("P", Vec::new());
        let b = doc.create_element("b", vec![("class".into(), Some("x".into()))]);
        let t1 = doc.create_text("hello ");
        let t2 = doc.create_text("world");
        doc.append_child(doc.root(), p).unwrap();
        doc.append_child(p, t1).unwrap();
        doc.append_child(p, b).unwrap();
        doc.append_child(b, t2).unwrap();
        (doc, p, b, t2)
    }

    #[test]
    fn element_names_are_lowercased() {
        let (doc, p, _, _) = sample();
        assert_eq!(doc.element_name(p), Some("p"));
    }

    #[test]
    fn detach_keeps_id_valid() {
        let (mut doc, p, b, t2) = sample();
        assert_eq!(doc.detach(b), Ok(1));
        assert!(!doc.is_attached(b));
        assert!(!doc.is_attached(t2));
        assert_eq!(doc.parent(t2), Some(b));
        assert_eq!(doc.children(p).len(), 1);
        doc.append_child(p, b).unwrap();
        assert!(doc.is_attached(t2));
    }

    #[test]
    fn cycles_are_rejected() {
        let (mut doc, p, b, _) = sample();
        doc.detach(p).unwrap();
        assert_eq!(
            doc.append_child(b, p),
            Err(DomError::CycleDetected { parent: b, child: p })
        );
    }

    #[test]
    fn split_text_records_origin() {
        let (mut doc, _, b, t2) = sample();
        let tail = doc.split_text(t2, 2).unwrap();
        assert_eq!(doc.text(t2), Some("wo"));
        assert_eq!(doc.text(tail), Some("rld"));
        assert_eq!(doc.children(b), &[t2, tail]);
        assert_eq!(doc.split_origin(tail), Some(t2));
        let tail2 = doc.split_text(tail, 1).unwrap();
        assert_eq!(doc.split_origin(tail2), Some(t2));
    }

    #[test]
    fn split_text_rejects_edges_and_mid_char() {
        let mut doc = Document::new();
        let t = doc.create_text("caf\u{e9}");
        doc.append_child(doc.root(), t).unwrap();
        assert!(matches!(doc.split_text(t, 0), Err(DomError::OffsetOutOfBounds { .. })));
        assert!(matches!(doc.split_text(t, 5), Err(DomError::OffsetOutOfBounds { .. })));
        assert_eq!(
            doc.split_text(t, 4),
            Err(DomError::NotCharBoundary { node: t, offset: 4 })
        );
    }

    #[test]
    fn split_element_moves_tail_children() {
        let (mut doc, p, b, t2) = sample();
        let extra = doc.create_text("!");
        doc.append_child(b, extra).unwrap();
        let copy = doc.split_element(b, 1).unwrap();
        assert_eq!(doc.children(b), &[t2]);
        assert_eq!(doc.children(copy), &[extra]);
        assert_eq!(doc.attribute(copy, "class"), Some("x"));
        assert_eq!(doc.next_sibling(b), Some(copy));
        assert_eq!(doc.parent(copy), Some(p));
    }

    #[test]
    fn siblings_and_ancestors() {
        let (doc, p, b, t2) = sample();
        let t1 = doc.children(p)[0];
        assert_eq!(doc.next_sibling(t1), Some(b));
        assert_eq!(doc.previous_sibling(b), Some(t1));
        assert_eq!(doc.previous_sibling(t1), None);
        let chain: Vec<_> = doc.ancestors(t2).collect();
        assert_eq!(chain, vec![b, p, doc.root()]);
    }
}
