//! Arena DOM for highlighting: markup parsing, document-order traversal,
//! structural paths, and span wrapping that can be undone exactly.

pub mod dom_snapshot;
pub mod range;
pub mod selector;
pub mod traverse;

mod document;
mod dom_builder;
mod entities;
mod tokenizer;
mod types;

pub use crate::document::{Ancestors, Document};
pub use crate::dom_builder::{build_dom, parse_document};
pub use crate::range::{
    Bias, LeafPosition, UnwrapOutcome, WrapperSpec, leaf_position_at, offset_of, unwrap_span,
    wrap_span,
};
pub use crate::selector::{PathOptions, StructuralPath, resolve_structural_path, structural_path};
pub use crate::tokenizer::tokenize;
pub use crate::types::{DomError, NodeId, NodeKind, Token};
