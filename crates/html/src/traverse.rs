use crate::document::Document;
use crate::types::NodeId;
use std::cmp::Ordering;
use std::ops::ControlFlow;

/// Depth-first, document-order walk over the nodes below `root`
/// (`root` itself excluded).
pub struct Descendants<'a> {
    doc: &'a Document,
    stack: Vec<NodeId>,
}

impl<'a> Descendants<'a> {
    pub fn new(doc: &'a Document, root: NodeId) -> Self {
        Self {
            doc,
            stack: doc.children(root).iter().rev().copied().collect(),
        }
    }
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.stack.pop()?;
        self.stack.extend(self.doc.children(id).iter().rev().copied());
        Some(id)
    }
}

/// Text leaves below `root` in document order.
///
/// The walk holds no state outside the iterator, so a fresh call restarts it.
pub struct TextLeaves<'a> {
    inner: Descendants<'a>,
}

impl Iterator for TextLeaves<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let doc = self.inner.doc;
        self.inner.find(|id| doc.is_text(*id))
    }
}

pub fn descendants(doc: &Document, root: NodeId) -> Descendants<'_> {
    Descendants::new(doc, root)
}

pub fn text_leaves(doc: &Document, root: NodeId) -> TextLeaves<'_> {
    TextLeaves {
        inner: Descendants::new(doc, root),
    }
}

/// Visit every text leaf below `root` until the visitor breaks.
///
/// Returns `ControlFlow::Break(())` if the visitor stopped the walk early.
pub fn for_each_text_leaf(
    doc: &Document,
    root: NodeId,
    mut visit: impl FnMut(NodeId, &str) -> ControlFlow<()>,
) -> ControlFlow<()> {
    for leaf in text_leaves(doc, root) {
        let text = doc.text(leaf).unwrap_or_default();
        visit(leaf, text)?;
    }
    ControlFlow::Continue(())
}

/// Concatenation of all text leaves below `root`.
pub fn flattened_text(doc: &Document, root: NodeId) -> String {
    let mut out = String::new();
    let _ = for_each_text_leaf(doc, root, |_, text| {
        out.push_str(text);
        ControlFlow::Continue(())
    });
    out
}

/// Nodes after `node` in document order, skipping `node`'s own subtree.
pub fn following(doc: &Document, node: NodeId) -> Following<'_> {
    Following {
        doc,
        current: next_outside(doc, node),
    }
}

pub struct Following<'a> {
    doc: &'a Document,
    current: Option<NodeId>,
}

impl Iterator for Following<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.current?;
        self.current = match self.doc.children(id).first() {
            Some(first) => Some(*first),
            None => next_outside(self.doc, id),
        };
        Some(id)
    }
}

/// The next node in document order that is not inside `node`.
fn next_outside(doc: &Document, node: NodeId) -> Option<NodeId> {
    let mut current = node;
    loop {
        if let Some(next) = doc.next_sibling(current) {
            return Some(next);
        }
        current = doc.parent(current)?;
    }
}

/// Order two attached nodes by document position (pre-order).
///
/// An ancestor sorts before its descendants. Nodes in different trees
/// compare by their detached roots' ids so the order stays total.
pub fn compare_document_position(doc: &Document, a: NodeId, b: NodeId) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }
    let path_a = path_from_root(doc, a);
    let path_b = path_from_root(doc, b);
    if path_a[0] != path_b[0] {
        return path_a[0].cmp(&path_b[0]);
    }
    let shared = path_a
        .iter()
        .zip(path_b.iter())
        .take_while(|(x, y)| x == y)
        .count();
    match (path_a.get(shared), path_b.get(shared)) {
        (None, _) => Ordering::Less,
        (_, None) => Ordering::Greater,
        (Some(x), Some(y)) => {
            let parent = path_a[shared - 1];
            let siblings = doc.children(parent);
            let ix = siblings.iter().position(|c| c == x);
            let iy = siblings.iter().position(|c| c == y);
            ix.cmp(&iy)
        }
    }
}

fn path_from_root(doc: &Document, node: NodeId) -> Vec<NodeId> {
    let mut path: Vec<NodeId> = doc.ancestors(node).collect();
    path.reverse();
    path.push(node);
    path
}

/// Lowest node that contains both `a` and `b` (a node contains itself).
pub fn common_ancestor(doc: &Document, a: NodeId, b: NodeId) -> Option<NodeId> {
    let chain_a = path_from_root(doc, a);
    let chain_b = path_from_root(doc, b);
    chain_a
        .iter()
        .zip(chain_b.iter())
        .take_while(|(x, y)| x == y)
        .last()
        .map(|(x, _)| *x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse_document;

    const SAMPLE: &str = "<p>An element receives a <code>click</code> event when a pointing device \
button (such as a <a href='#'>mouse's primary <i>mouse button</i></a>) is both pressed and \
released while the pointer is <strong>located inside</strong> the element.</p>";

    #[test]
    fn text_leaves_in_document_order() {
        let doc = parse_document(SAMPLE);
        let p = doc.children(doc.root())[0];
        let texts: Vec<&str> = text_leaves(&doc, p).filter_map(|id| doc.text(id)).collect();
        assert_eq!(texts.len(), 8);
        assert_eq!(texts[0], "An element receives a ");
        assert_eq!(texts[1], "click");
        assert_eq!(texts[4], "mouse button");
        assert_eq!(
            flattened_text(&doc, p),
            "An element receives a click event when a pointing device button (such as a \
mouse's primary mouse button) is both pressed and released while the pointer is located \
inside the element."
        );
    }

    #[test]
    fn visitor_can_stop_early() {
        let doc = parse_document(SAMPLE);
        let p = doc.children(doc.root())[0];
        let mut seen = 0;
        let flow = for_each_text_leaf(&doc, p, |_, text| {
            seen += 1;
            if text == "click" {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        });
        assert_eq!(flow, ControlFlow::Break(()));
        assert_eq!(seen, 2);
    }

    #[test]
    fn document_position_ordering() {
        let doc = parse_document("<div><p>a<b>b</b></p><p>c</p></div>");
        let div = doc.children(doc.root())[0];
        let p1 = doc.children(div)[0];
        let p2 = doc.children(div)[1];
        let b = doc.children(p1)[1];
        assert_eq!(compare_document_position(&doc, div, b), Ordering::Less);
        assert_eq!(compare_document_position(&doc, b, p2), Ordering::Less);
        assert_eq!(compare_document_position(&doc, p2, p1), Ordering::Greater);
        assert_eq!(common_ancestor(&doc, b, p2), Some(div));
        assert_eq!(common_ancestor(&doc, b, b), Some(b));
    }

    #[test]
    fn following_skips_own_subtree() {
        let doc = parse_document("<div><p>a<b>b</b></p><p>c</p></div>");
        let div = doc.children(doc.root())[0];
        let p1 = doc.children(div)[0];
        let p2 = doc.children(div)[1];
        let after: Vec<NodeId> = following(&doc, p1).collect();
        assert_eq!(after, vec![p2, doc.children(p2)[0]]);
    }
}
