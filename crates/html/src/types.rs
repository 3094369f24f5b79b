use std::fmt;

/// Stable handle of a node inside one [`Document`](crate::Document) arena.
///
/// Handles stay valid for the lifetime of the document, including after the
/// node has been detached from the tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeKind {
    Document {
        doctype: Option<String>,
    },
    Element {
        name: String,
        attributes: Vec<(String, Option<String>)>,
    },
    Text {
        text: String,
    },
    Comment {
        text: String,
    },
}

impl NodeKind {
    pub fn allows_children(&self) -> bool {
        matches!(self, NodeKind::Document { .. } | NodeKind::Element { .. })
    }

    pub(crate) fn label(&self) -> &str {
        match self {
            NodeKind::Document { .. } => "#document",
            NodeKind::Element { name, .. } => name,
            NodeKind::Text { .. } => "#text",
            NodeKind::Comment { .. } => "#comment",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Doctype(String),
    StartTag {
        name: String,
        attributes: Vec<(String, Option<String>)>,
        self_closing: bool,
    },
    EndTag(String),
    Comment(String),
    Text(String),
}

#[non_exhaustive]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DomError {
    MissingNode(NodeId),
    /// The node exists but is not a text leaf.
    NotAText(NodeId),
    /// The node cannot hold children.
    NotAContainer(NodeId),
    /// The node has no parent where one is required.
    Detached(NodeId),
    NotADescendant {
        ancestor: NodeId,
        node: NodeId,
    },
    CycleDetected {
        parent: NodeId,
        child: NodeId,
    },
    OffsetOutOfBounds {
        offset: usize,
        len: usize,
    },
    NotCharBoundary {
        node: NodeId,
        offset: usize,
    },
    EmptySpan,
    /// Two fragments of the same original node no longer agree on their
    /// kind, tag or attributes and cannot be joined back.
    MergeConflict {
        left: NodeId,
        right: NodeId,
    },
    UnresolvedPath(String),
}

impl fmt::Display for DomError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DomError::MissingNode(id) => write!(f, "no node {id} in this document"),
            DomError::NotAText(id) => write!(f, "node {id} is not a text node"),
            DomError::NotAContainer(id) => write!(f, "node {id} cannot have children"),
            DomError::Detached(id) => write!(f, "node {id} has no parent"),
            DomError::NotADescendant { ancestor, node } => {
                write!(f, "node {node} is not inside {ancestor}")
            }
            DomError::CycleDetected { parent, child } => {
                write!(f, "inserting {child} under {parent} would create a cycle")
            }
            DomError::OffsetOutOfBounds { offset, len } => {
                write!(f, "offset {offset} is out of bounds for text of length {len}")
            }
            DomError::NotCharBoundary { node, offset } => {
                write!(f, "offset {offset} in {node} is not on a character boundary")
            }
            DomError::EmptySpan => f.write_str("span is empty"),
            DomError::MergeConflict { left, right } => {
                write!(f, "fragments {left} and {right} are structurally incompatible")
            }
            DomError::UnresolvedPath(path) => write!(f, "no element matches path `{path}`"),
        }
    }
}

impl std::error::Error for DomError {}
