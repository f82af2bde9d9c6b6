//! JavaScript-facing API
//!
//! # Module Structure
//!
//! - `helpers`: serialization and error conversion shared by all bindings
//! - `alignment`: stateless segmentation, reconciliation and alignment views
//! - `editor`: `SegmentEditor`, optimistic editing of one document
//!
//! No state lives at module level; every document is owned by its
//! `SegmentEditor` handle.

pub mod alignment;
pub mod editor;
pub mod helpers;

pub use alignment::{
    apply_segmentation_js, naive_split_js, prepare_alignment_view, reconcile_annotations, reconstruct_alignment,
    sanitize_upload_js,
};
pub use editor::SegmentEditor;
