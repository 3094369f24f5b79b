//! Structural paths: durable addresses of container elements.
//!
//! A path is a `>`-joined list of `tag:nth-of-type(n)` segments walked down
//! from `<body>` (or from the document root when there is no body). The first
//! segment may instead be `#id` when exactly one element carries that id.
//! The path `body` addresses the body element itself.
//!
//! Paths are computed over the *logical* tree so that highlighting a page does
//! not change the address of anything on it:
//! - elements carrying [`PathOptions::ignore_attribute`] are transparent and
//!   their children count as children of the wrapper's parent;
//! - fragments produced by splitting an element count once, as the element
//!   they were split from.

use crate::document::Document;
use crate::traverse::descendants;
use crate::types::{DomError, NodeId};
use std::fmt;

const BODY: &str = "body";
const NTH_OF_TYPE: &str = ":nth-of-type(";

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PathOptions {
    /// Attribute marking transparent wrapper elements.
    pub ignore_attribute: Option<String>,
}

impl PathOptions {
    pub fn ignoring(attribute: &str) -> Self {
        Self {
            ignore_attribute: Some(attribute.to_string()),
        }
    }

    fn is_transparent(&self, doc: &Document, id: NodeId) -> bool {
        match &self.ignore_attribute {
            Some(attr) => doc.is_element(id) && doc.attribute(id, attr).is_some(),
            None => false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct StructuralPath(String);

#[derive(Clone, Debug, PartialEq, Eq)]
enum Segment<'a> {
    Id(&'a str),
    Nth { tag: &'a str, n: usize },
}

impl StructuralPath {
    /// Validate `raw` against the path grammar.
    pub fn parse(raw: &str) -> Result<Self, DomError> {
        let path = StructuralPath(raw.trim().to_string());
        path.segments()?;
        Ok(path)
    }

    pub fn body() -> Self {
        StructuralPath(BODY.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    fn segments(&self) -> Result<Vec<Segment<'_>>, DomError> {
        let invalid = || DomError::UnresolvedPath(self.0.clone());
        if self.0 == BODY {
            return Ok(Vec::new());
        }
        let mut out = Vec::new();
        for (i, raw) in self.0.split('>').enumerate() {
            let raw = raw.trim();
            if let Some(id) = raw.strip_prefix('#') {
                if i != 0 || id.is_empty() {
                    return Err(invalid());
                }
                out.push(Segment::Id(id));
                continue;
            }
            let (tag, rest) = raw.split_once(NTH_OF_TYPE).ok_or_else(invalid)?;
            let n = rest
                .strip_suffix(')')
                .and_then(|n| n.parse::<usize>().ok())
                .filter(|n| *n >= 1)
                .ok_or_else(invalid)?;
            if tag.is_empty()
                || !tag
                    .bytes()
                    .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b':'))
            {
                return Err(invalid());
            }
            out.push(Segment::Nth { tag, n });
        }
        Ok(out)
    }
}

impl fmt::Display for StructuralPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Compute the structural path of element `node`.
///
/// Fragments resolve to the path of the element they were split from.
pub fn structural_path(
    doc: &Document,
    node: NodeId,
    opts: &PathOptions,
) -> Result<StructuralPath, DomError> {
    if !doc.is_element(node) {
        return Err(DomError::NotAContainer(node));
    }
    if !doc.is_attached(node) {
        return Err(DomError::Detached(node));
    }
    let top = path_root(doc);
    let mut current = doc.origin_root(node);
    if current == top && doc.body() == Some(top) {
        return Ok(StructuralPath::body());
    }

    let mut segments: Vec<String> = Vec::new();
    loop {
        if let Some(id) = unique_id(doc, current) {
            segments.push(format!("#{id}"));
            break;
        }
        let parent = logical_parent(doc, current, opts).ok_or(DomError::NotADescendant {
            ancestor: top,
            node,
        })?;
        let tag = doc.element_name(current).unwrap_or_default();
        let n = logical_children(doc, parent, opts)
            .into_iter()
            .filter(|c| doc.element_name(*c) == Some(tag))
            .position(|c| c == current)
            .map(|i| i + 1)
            .ok_or(DomError::MissingNode(current))?;
        segments.push(format!("{tag}{NTH_OF_TYPE}{n})"));
        if parent == top {
            break;
        }
        current = parent;
    }
    segments.reverse();
    let path = StructuralPath(segments.join(">"));
    log::trace!(target: "html.selector", "path of {node} is {path}");
    Ok(path)
}

/// Resolve `path` back to the element it addresses.
pub fn resolve_structural_path(
    doc: &Document,
    path: &StructuralPath,
    opts: &PathOptions,
) -> Result<NodeId, DomError> {
    let unresolved = || DomError::UnresolvedPath(path.0.clone());
    let segments = path.segments()?;
    let mut current = path_root(doc);
    if segments.is_empty() {
        return doc.body().ok_or_else(unresolved);
    }
    for segment in segments {
        current = match segment {
            Segment::Id(id) => {
                let found = elements_with_id(doc, id);
                match found.as_slice() {
                    [only] => *only,
                    _ => return Err(unresolved()),
                }
            }
            Segment::Nth { tag, n } => logical_children(doc, current, opts)
                .into_iter()
                .filter(|c| doc.element_name(*c) == Some(tag))
                .nth(n - 1)
                .ok_or_else(unresolved)?,
        };
    }
    Ok(current)
}

fn path_root(doc: &Document) -> NodeId {
    doc.body().unwrap_or_else(|| doc.root())
}

fn unique_id(doc: &Document, node: NodeId) -> Option<&str> {
    let id = doc.attribute(node, "id").filter(|id| !id.is_empty())?;
    (elements_with_id(doc, id).len() == 1).then_some(id)
}

/// Attached original (non-fragment) elements whose `id` is `id`.
fn elements_with_id(doc: &Document, id: &str) -> Vec<NodeId> {
    descendants(doc, doc.root())
        .filter(|n| doc.split_origin(*n).is_none() && doc.attribute(*n, "id") == Some(id))
        .collect()
}

/// Nearest non-transparent ancestor, as the original element.
fn logical_parent(doc: &Document, node: NodeId, opts: &PathOptions) -> Option<NodeId> {
    doc.ancestors(node)
        .find(|a| !opts.is_transparent(doc, *a))
        .map(|a| doc.origin_root(a))
}

/// Child elements of `parent` in the logical tree, each as its original.
///
/// Children of every fragment of `parent` are concatenated, wrappers are
/// flattened, and consecutive fragments of one element collapse into it.
fn logical_children(doc: &Document, parent: NodeId, opts: &PathOptions) -> Vec<NodeId> {
    let mut physical = Vec::new();
    for fragment in fragments_of(doc, parent) {
        flatten_into(doc, fragment, opts, &mut physical);
    }
    let mut out: Vec<NodeId> = Vec::new();
    for child in physical {
        if !doc.is_element(child) {
            continue;
        }
        let origin = doc.origin_root(child);
        if out.last() != Some(&origin) {
            out.push(origin);
        }
    }
    out
}

fn flatten_into(doc: &Document, node: NodeId, opts: &PathOptions, out: &mut Vec<NodeId>) {
    for &child in doc.children(node) {
        if opts.is_transparent(doc, child) {
            flatten_into(doc, child, opts, out);
        } else {
            out.push(child);
        }
    }
}

/// `origin` followed by every attached fragment split off from it, in
/// document order.
fn fragments_of(doc: &Document, origin: NodeId) -> Vec<NodeId> {
    let mut out = vec![origin];
    if origin == doc.root() {
        return out;
    }
    out.extend(descendants(doc, doc.root()).filter(|n| doc.split_origin(*n) == Some(origin)));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse_document;

    const PAGE: &str = "<html><body><div id=main><p>one</p><p>two <b>bold</b></p></div>\
<section><p>three</p></section></body></html>";

    fn first_element(doc: &Document, name: &str, nth: usize) -> NodeId {
        descendants(doc, doc.root())
            .filter(|n| doc.element_name(*n) == Some(name))
            .nth(nth)
            .unwrap()
    }

    #[test]
    fn id_shortcut_and_nth_of_type() {
        let doc = parse_document(PAGE);
        let opts = PathOptions::default();
        let p2 = first_element(&doc, "p", 1);
        let p3 = first_element(&doc, "p", 2);
        let path = structural_path(&doc, p2, &opts).unwrap();
        assert_eq!(path.as_str(), "#main>p:nth-of-type(2)");
        assert_eq!(resolve_structural_path(&doc, &path, &opts), Ok(p2));
        let path = structural_path(&doc, p3, &opts).unwrap();
        assert_eq!(path.as_str(), "section:nth-of-type(1)>p:nth-of-type(1)");
        assert_eq!(resolve_structural_path(&doc, &path, &opts), Ok(p3));
    }

    #[test]
    fn body_addresses_itself() {
        let doc = parse_document(PAGE);
        let body = doc.body().unwrap();
        let path = structural_path(&doc, body, &PathOptions::default()).unwrap();
        assert_eq!(path, StructuralPath::body());
        assert_eq!(
            resolve_structural_path(&doc, &path, &PathOptions::default()),
            Ok(body)
        );
    }

    #[test]
    fn duplicate_ids_fall_back_to_ordinals() {
        let doc = parse_document("<p id=x>a</p><p id=x>b</p>");
        let second = doc.children(doc.root())[1];
        let path = structural_path(&doc, second, &PathOptions::default()).unwrap();
        assert_eq!(path.as_str(), "p:nth-of-type(2)");
    }

    #[test]
    fn wrappers_are_transparent() {
        let mut doc = parse_document("<div><p>a</p><p>b</p></div>");
        let div = doc.children(doc.root())[0];
        let p2 = doc.children(div)[1];
        let opts = PathOptions::ignoring("data-mark");
        let before = structural_path(&doc, p2, &opts).unwrap();

        let p1 = doc.children(div)[0];
        doc.detach(p1).unwrap();
        let wrapper = doc.create_element("span", vec![("data-mark".into(), Some("1".into()))]);
        doc.append_child(wrapper, p1).unwrap();
        doc.insert_child(div, 0, wrapper).unwrap();

        assert_eq!(structural_path(&doc, p2, &opts).unwrap(), before);
        assert_eq!(resolve_structural_path(&doc, &before, &opts), Ok(p2));
        assert_ne!(
            structural_path(&doc, p2, &PathOptions::default()).unwrap(),
            before
        );
    }

    #[test]
    fn split_fragments_count_once() {
        let mut doc = parse_document("<div><b>x<i>y</i></b><b>z</b></div>");
        let div = doc.children(doc.root())[0];
        let b2 = doc.children(div)[1];
        let opts = PathOptions::default();
        let before = structural_path(&doc, b2, &opts).unwrap();
        let b1 = doc.children(div)[0];
        let fragment = doc.split_element(b1, 1).unwrap();
        assert_eq!(structural_path(&doc, b2, &opts).unwrap(), before);
        assert_eq!(
            structural_path(&doc, fragment, &opts).unwrap().as_str(),
            "div:nth-of-type(1)>b:nth-of-type(1)"
        );
        let i = doc.children(fragment)[0];
        assert_eq!(
            structural_path(&doc, i, &opts).unwrap().as_str(),
            "div:nth-of-type(1)>b:nth-of-type(1)>i:nth-of-type(1)"
        );
    }

    #[test]
    fn malformed_paths_are_rejected() {
        for raw in ["", "p", "p:nth-of-type(0)", "p>#x", "p:nth-of-type(a)", "#"] {
            assert!(StructuralPath::parse(raw).is_err(), "{raw}");
        }
        assert!(StructuralPath::parse("#a>p:nth-of-type(3)").is_ok());
    }

    #[test]
    fn missing_target_is_unresolved() {
        let doc = parse_document("<p>a</p>");
        let path = StructuralPath::parse("p:nth-of-type(2)").unwrap();
        assert_eq!(
            resolve_structural_path(&doc, &path, &PathOptions::default()),
            Err(DomError::UnresolvedPath("p:nth-of-type(2)".into()))
        );
    }
}
