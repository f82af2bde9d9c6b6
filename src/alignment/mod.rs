//! Cross-text alignment
//!
//! - `reconstruct`: aligned source/target display lines from annotations
//! - `prepare`: choose between alignment and per-side segmentation

pub mod prepare;
pub mod reconstruct;

pub use prepare::{prepare_view, AlignedDisplay, PreparedAlignment};
pub use reconstruct::{reconstruct, AlignedLines, AlignmentPair};
