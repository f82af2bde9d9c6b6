//! Segmentation without alignment
//!
//! - `apply`: segmented display text from a span list, and its inverse
//! - `chunk`: naive initial split for uploaded documents

pub mod apply;
pub mod chunk;

pub use apply::{apply_segmentation, relocate_lines, segment_lines};
pub use chunk::naive_split;
