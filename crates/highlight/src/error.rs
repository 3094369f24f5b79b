use core_types::HighlightId;
use html::{DomError, NodeId};
use std::fmt;

#[non_exhaustive]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HighlightError {
    /// Anchors are not text leaves, or the span is empty.
    InvalidSelection(String),
    /// Stored fields violate the offset/length invariant.
    MalformedDescriptor { id: HighlightId, reason: String },
    /// The stored container or offsets no longer match the document.
    UnresolvableAnchor { selector: String, reason: String },
    /// Two pieces of one split node could not be joined back.
    MergeConflict { left: NodeId, right: NodeId },
    UnknownHighlight(HighlightId),
    InvalidConfig(String),
    Dom(DomError),
}

impl From<DomError> for HighlightError {
    fn from(err: DomError) -> Self {
        match err {
            DomError::MergeConflict { left, right } => HighlightError::MergeConflict { left, right },
            other => HighlightError::Dom(other),
        }
    }
}

impl fmt::Display for HighlightError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HighlightError::InvalidSelection(reason) => write!(f, "invalid selection: {reason}"),
            HighlightError::MalformedDescriptor { id, reason } => {
                write!(f, "malformed highlight {id}: {reason}")
            }
            HighlightError::UnresolvableAnchor { selector, reason } => {
                write!(f, "cannot place highlight under `{selector}`: {reason}")
            }
            HighlightError::MergeConflict { left, right } => {
                write!(f, "could not rejoin {left} and {right}")
            }
            HighlightError::UnknownHighlight(id) => write!(f, "no highlight with id {id}"),
            HighlightError::InvalidConfig(reason) => write!(f, "invalid engine config: {reason}"),
            HighlightError::Dom(err) => write!(f, "document error: {err}"),
        }
    }
}

impl std::error::Error for HighlightError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            HighlightError::Dom(err) => Some(err),
            _ => None,
        }
    }
}
