//! Ordered, non-overlapping segments over one document buffer
//!
//! Invariants held after every public operation:
//!
//! 1. spans are sorted by start and pairwise non-overlapping
//! 2. `index` equals the segment's position (0-based, contiguous)
//! 3. `text == buffer.slice(span)`

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use super::model::{DocumentId, Segment, SegmentId};
use crate::config::ResidualPolicy;
use crate::error::{EngineError, Result};
use crate::segmentation::apply_segmentation;
use crate::text::{find_disorder, Span, TextBuffer};

/// Annotation progress of a document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    pub total: usize,
    pub annotated: usize,
    pub checked: usize,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SegmentStore {
    document_id: DocumentId,
    buffer: TextBuffer,
    segments: Vec<Segment>,
}

impl SegmentStore {
    /// An empty store over `buffer`
    pub fn new(document_id: DocumentId, buffer: TextBuffer) -> Self {
        Self {
            document_id,
            buffer,
            segments: Vec::new(),
        }
    }

    /// Load persisted segments
    ///
    /// Segments are ordered by their stored index, text is re-sliced from the
    /// buffer, and indices are renumbered. Fails if spans fall outside the
    /// buffer or overlap.
    pub fn from_segments(document_id: DocumentId, buffer: TextBuffer, mut segments: Vec<Segment>) -> Result<Self> {
        segments.sort_by_key(|segment| (segment.index, segment.span.start));
        check_bounds(&buffer, segments.iter().map(|s| s.span))?;
        check_order(&segments)?;
        check_unique(&segments)?;

        for segment in &mut segments {
            segment.text = buffer.slice(segment.span).to_string();
            segment.refresh_annotation();
        }

        let mut store = Self {
            document_id,
            buffer,
            segments,
        };
        store.reindex();
        Ok(store)
    }

    pub fn document_id(&self) -> &DocumentId {
        &self.document_id
    }

    pub fn buffer(&self) -> &TextBuffer {
        &self.buffer
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn get(&self, id: &SegmentId) -> Option<&Segment> {
        self.segments.iter().find(|segment| &segment.id == id)
    }

    /// Position (and therefore index) of a segment
    pub fn position(&self, id: &SegmentId) -> Option<usize> {
        self.segments.iter().position(|segment| &segment.id == id)
    }

    pub fn ids(&self) -> Vec<SegmentId> {
        self.segments.iter().map(|segment| segment.id.clone()).collect()
    }

    /// Text covered by `span`
    ///
    /// # Panics
    ///
    /// Panics if `span` runs past the buffer; see `TextBuffer::slice`.
    pub fn slice_text(&self, span: Span) -> &str {
        self.buffer.slice(span)
    }

    /// Insert a segment at `at_index`, renumbering everything after it
    ///
    /// The segment's text is re-sliced from the buffer. Fails without
    /// changes if its span is out of bounds, overlaps a neighbour, or would
    /// break span order at that position.
    pub fn insert(&mut self, mut segment: Segment, at_index: usize) -> Result<()> {
        let at = at_index.min(self.segments.len());
        check_bounds(&self.buffer, std::iter::once(segment.span))?;
        if self.get(&segment.id).is_some() {
            return Err(EngineError::DuplicateSegment(segment.id));
        }
        if let Some(prev) = at.checked_sub(1).and_then(|i| self.segments.get(i)) {
            if segment.span.start < prev.span.end || segment.span.start < prev.span.start {
                return Err(EngineError::OverlappingSpans {
                    first: prev.span,
                    second: segment.span,
                });
            }
        }
        if let Some(next) = self.segments.get(at) {
            if next.span.start < segment.span.end || next.span.start < segment.span.start {
                return Err(EngineError::OverlappingSpans {
                    first: segment.span,
                    second: next.span,
                });
            }
        }

        segment.text = self.buffer.slice(segment.span).to_string();
        self.segments.insert(at, segment);
        self.reindex();
        Ok(())
    }

    /// Remove the given segments, renumbering the rest
    ///
    /// All ids must be present and distinct; otherwise nothing is removed.
    /// Returns the removed segments in store order.
    pub fn remove_range(&mut self, ids: &[SegmentId]) -> Result<Vec<Segment>> {
        let mut wanted = HashSet::with_capacity(ids.len());
        for id in ids {
            if !wanted.insert(id) {
                return Err(EngineError::DuplicateSegment(id.clone()));
            }
            if self.get(id).is_none() {
                return Err(EngineError::SegmentNotFound(id.clone()));
            }
        }

        let (removed, kept): (Vec<Segment>, Vec<Segment>) = std::mem::take(&mut self.segments)
            .into_iter()
            .partition(|segment| wanted.contains(&segment.id));
        self.segments = kept;
        self.reindex();
        Ok(removed)
    }

    /// Assign `index = position` in one pass
    pub fn reindex(&mut self) {
        for (position, segment) in self.segments.iter_mut().enumerate() {
            segment.index = position;
        }
    }

    /// Remove every segment
    pub fn clear(&mut self) {
        self.segments.clear();
    }

    /// Swap in a new buffer from the content owner
    ///
    /// Every cached text is re-sliced. Fails without changes if a span no
    /// longer fits.
    pub fn rebind_buffer(&mut self, buffer: TextBuffer) -> Result<()> {
        check_bounds(&buffer, self.segments.iter().map(|s| s.span))?;
        for segment in &mut self.segments {
            segment.text = buffer.slice(segment.span).to_string();
        }
        self.buffer = buffer;
        Ok(())
    }

    /// Rename segments (and parent references) per `renames`
    pub fn remap_ids(&mut self, renames: &HashMap<SegmentId, SegmentId>) {
        remap_segment_ids(&mut self.segments, renames);
    }

    /// Verify invariants 1-3 plus id uniqueness
    pub fn check_invariants(&self) -> Result<()> {
        check_bounds(&self.buffer, self.segments.iter().map(|s| s.span))?;
        check_order(&self.segments)?;
        check_unique(&self.segments)?;
        for (position, segment) in self.segments.iter().enumerate() {
            debug_assert_eq!(segment.index, position, "index out of step for {}", segment.id);
            debug_assert_eq!(segment.text, self.buffer.slice(segment.span), "stale text for {}", segment.id);
        }
        Ok(())
    }

    /// Segment text joined by newlines
    pub fn display_text(&self, policy: ResidualPolicy) -> Result<String> {
        let spans: Vec<Span> = self.segments.iter().map(|s| s.span).collect();
        apply_segmentation(&self.buffer, &spans, policy)
    }

    pub fn progress(&self) -> Progress {
        let total = self.segments.len();
        let annotated = self.segments.iter().filter(|s| s.is_annotated).count();
        let checked = self
            .segments
            .iter()
            .filter(|s| s.status == super::model::SegmentStatus::Checked)
            .count();
        let percentage = if total == 0 {
            0.0
        } else {
            annotated as f64 / total as f64 * 100.0
        };
        Progress {
            total,
            annotated,
            checked,
            percentage,
        }
    }

    /// Install a fully validated segment list
    pub(crate) fn replace_segments(&mut self, segments: Vec<Segment>) {
        self.segments = segments;
    }
}

pub(crate) fn remap_segment_ids(segments: &mut [Segment], renames: &HashMap<SegmentId, SegmentId>) {
    if renames.is_empty() {
        return;
    }
    for segment in segments {
        if let Some(new_id) = renames.get(&segment.id) {
            segment.id = new_id.clone();
        }
        if let Some(parent) = segment.parent_id.as_ref().and_then(|p| renames.get(p)) {
            segment.parent_id = Some(parent.clone());
        }
    }
}

pub(crate) fn check_bounds(buffer: &TextBuffer, spans: impl IntoIterator<Item = Span>) -> Result<()> {
    match spans.into_iter().find(|span| !buffer.contains_span(span)) {
        Some(span) => Err(EngineError::SpanOutOfBounds {
            span,
            length: buffer.len(),
        }),
        None => Ok(()),
    }
}

pub(crate) fn check_order(segments: &[Segment]) -> Result<()> {
    let spans: Vec<Span> = segments.iter().map(|s| s.span).collect();
    match find_disorder(&spans) {
        Some((first, second)) => Err(EngineError::OverlappingSpans { first, second }),
        None => Ok(()),
    }
}

pub(crate) fn check_unique(segments: &[Segment]) -> Result<()> {
    let mut seen = HashSet::with_capacity(segments.len());
    for segment in segments {
        if !seen.insert(&segment.id) {
            return Err(EngineError::DuplicateSegment(segment.id.clone()));
        }
    }
    Ok(())
}
