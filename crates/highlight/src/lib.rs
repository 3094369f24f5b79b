//! Highlight records and the engine that keeps them materialized in a
//! document without overlap and in document order.

pub mod config;
pub mod engine;
pub mod error;
pub mod info;
pub mod selection;

pub use crate::config::{EngineConfig, HighlightConfig};
pub use crate::engine::{
    Completion, DeleteOutcome, DeleteTarget, HighlightOrderedMap, HighlightSeq, InsertOutcome,
    InvariantViolation, RestoreReport,
};
pub use crate::error::HighlightError;
pub use crate::info::HighlightInfo;
pub use crate::selection::{
    Anchor, Selection, SpanCandidate, nearest_block_ancestor, split_across_containers,
};
pub use core_types::HighlightDescriptor;
