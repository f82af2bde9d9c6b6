//! Error types for the segmentation and alignment engine
//!
//! Validation errors are raised before any state changes. `ReconciliationGap`
//! signals an internal bug. `Transport` wraps a failed round trip to the
//! authoritative store, after which the optimistic state has been rolled back.

use thiserror::Error;

use crate::backend::TransportError;
use crate::segments::SegmentId;
use crate::text::Span;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// Split offset at or beyond a segment boundary
    #[error("Invalid split position {position} for segment {segment_id} of length {length}")]
    InvalidSplitPosition {
        segment_id: SegmentId,
        position: usize,
        length: usize,
    },

    /// Merge requested on fewer than two, unknown, repeated or non-adjacent segments
    #[error("Cannot merge segments: {0}")]
    NonContiguousMerge(String),

    /// Offsets left uncovered after reconciliation (indicates a bug)
    #[error("Reconciliation left {gap} uncovered")]
    ReconciliationGap { gap: Span },

    /// Round trip to the authoritative store failed
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Segment not found: {0}")]
    SegmentNotFound(SegmentId),

    #[error("Segment {0} appears more than once")]
    DuplicateSegment(SegmentId),

    #[error("Span {span} exceeds buffer of {length} codepoints")]
    SpanOutOfBounds { span: Span, length: usize },

    #[error("Spans {first} and {second} overlap")]
    OverlappingSpans { first: Span, second: Span },

    #[error("Invalid span: end {end} precedes start {start}")]
    InvalidSpan { start: usize, end: usize },

    #[error("Invalid parent for segment {segment_id}: {reason}")]
    InvalidParent { segment_id: SegmentId, reason: String },

    #[error("Document not loaded: {0}")]
    DocumentNotLoaded(String),

    #[error("Document has no content to split")]
    EmptyDocument,

    /// The round trip ended without a result for this edit
    #[error("Edit {ticket} was not settled")]
    Unsettled { ticket: u64 },
}

impl EngineError {
    /// Validation failures: the edit is rejected and nothing changed
    pub fn is_validation(&self) -> bool {
        !matches!(
            self,
            EngineError::Transport(_)
                | EngineError::ReconciliationGap { .. }
                | EngineError::DocumentNotLoaded(_)
                | EngineError::Unsettled { .. }
        )
    }

    /// Failures the caller may retry
    pub fn is_transient(&self) -> bool {
        matches!(self, EngineError::Transport(_))
    }
}
