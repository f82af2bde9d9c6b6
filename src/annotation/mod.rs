//! Upstream annotations and their reconciliation into dense span lists
//!
//! - `types`: sparse annotation slots, segment references, alignment payloads
//! - `reconcile`: placeholder/filler synthesis over a slot list

pub mod reconcile;
pub mod types;

pub use reconcile::{reconcile, verify_coverage, ReconciledSpan, Reconciliation, SpanOrigin};
pub use types::{order_slots, AlignmentData, Annotation, AnnotationSlot, SegmentRef};
