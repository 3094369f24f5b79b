//! Small collection helpers shared by the highlighter crates.

pub mod ordered_map;

pub use ordered_map::OrderedMap;
