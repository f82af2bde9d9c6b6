//! Annotation records as produced upstream
//!
//! Annotation lists arrive sparse: a `null` entry means "no annotation was
//! recorded at this ordinal". That is kept as `AnnotationSlot::Missing` and is
//! never confused with a recorded zero-length span.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::text::Span;

/// Reference from an alignment entry to a target segment
///
/// JSON numbers are ordinals into the target segmentation, strings are ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SegmentRef {
    Ordinal(usize),
    Id(String),
}

/// One upstream annotation entry
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Annotation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span: Option<Span>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aligned_segments: Option<Vec<SegmentRef>>,
}

impl Annotation {
    pub fn with_span(start: usize, end: usize) -> Self {
        Self {
            span: Some(Span::new(start, end)),
            ..Default::default()
        }
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn index(mut self, index: usize) -> Self {
        self.index = Some(index);
        self
    }

    pub fn aligned(mut self, refs: Vec<SegmentRef>) -> Self {
        self.aligned_segments = Some(refs);
        self
    }
}

/// An ordinal position in a sparse annotation list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Option<Annotation>", into = "Option<Annotation>")]
pub enum AnnotationSlot {
    Present(Annotation),
    Missing,
}

impl From<Option<Annotation>> for AnnotationSlot {
    fn from(entry: Option<Annotation>) -> Self {
        match entry {
            Some(annotation) => AnnotationSlot::Present(annotation),
            None => AnnotationSlot::Missing,
        }
    }
}

impl From<AnnotationSlot> for Option<Annotation> {
    fn from(slot: AnnotationSlot) -> Self {
        match slot {
            AnnotationSlot::Present(annotation) => Some(annotation),
            AnnotationSlot::Missing => None,
        }
    }
}

impl AnnotationSlot {
    pub fn annotation(&self) -> Option<&Annotation> {
        match self {
            AnnotationSlot::Present(annotation) => Some(annotation),
            AnnotationSlot::Missing => None,
        }
    }

    /// The recorded span, if this slot has one
    pub fn span(&self) -> Option<Span> {
        self.annotation().and_then(|a| a.span)
    }

    pub fn id(&self) -> Option<&str> {
        self.annotation().and_then(|a| a.id.as_deref())
    }

    pub fn aligned_segments(&self) -> &[SegmentRef] {
        self.annotation()
            .and_then(|a| a.aligned_segments.as_deref())
            .unwrap_or(&[])
    }
}

/// The alignment payload: target segmentation plus source-side correspondences
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AlignmentData {
    pub target_annotation: Vec<AnnotationSlot>,
    pub alignment_annotation: Vec<AnnotationSlot>,
}

impl AlignmentData {
    /// Both sides carry at least one entry
    pub fn is_usable(&self) -> bool {
        !self.target_annotation.is_empty() && !self.alignment_annotation.is_empty()
    }
}

/// How far past the list length an explicit `index` may point
const MAX_ORDINAL_SPREAD: usize = 4;

/// Arrange entries by ordinal
///
/// An entry's explicit `index` wins over its list position, unless it points
/// beyond `MAX_ORDINAL_SPREAD` times the list length. Ordinals nothing claims
/// become `Missing`. When two entries claim the same ordinal the first one is
/// kept.
pub fn order_slots(entries: Vec<AnnotationSlot>) -> Vec<AnnotationSlot> {
    let len = entries.len();
    let limit = len.saturating_mul(MAX_ORDINAL_SPREAD);
    let mut by_ordinal: BTreeMap<usize, Annotation> = BTreeMap::new();

    for (position, slot) in entries.into_iter().enumerate() {
        let AnnotationSlot::Present(annotation) = slot else {
            continue;
        };
        let ordinal = match annotation.index {
            Some(index) if index < limit => index,
            Some(index) => {
                log::warn!("annotation index {} out of range, using list position {}", index, position);
                position
            }
            None => position,
        };
        if by_ordinal.contains_key(&ordinal) {
            log::warn!("duplicate annotation ordinal {}, keeping the first entry", ordinal);
            continue;
        }
        by_ordinal.insert(ordinal, annotation);
    }

    let slot_count = by_ordinal
        .keys()
        .next_back()
        .and_then(|last| last.checked_add(1))
        .map_or(len, |count| len.max(count));

    (0..slot_count)
        .map(|ordinal| match by_ordinal.remove(&ordinal) {
            Some(annotation) => AnnotationSlot::Present(annotation),
            None => AnnotationSlot::Missing,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_entries_deserialize_as_missing() {
        let slots: Vec<AnnotationSlot> = serde_json::from_str(
            r#"[null, {"span": {"start": 4, "end": 10}, "index": 1}, null]"#,
        )
        .unwrap();

        assert_eq!(slots.len(), 3);
        assert_eq!(slots[0], AnnotationSlot::Missing);
        assert_eq!(slots[1].span(), Some(Span::new(4, 10)));
        assert_eq!(slots[2], AnnotationSlot::Missing);
    }

    #[test]
    fn test_segment_refs_untagged() {
        let annotation: Annotation =
            serde_json::from_str(r#"{"aligned_segments": [3, "seg-7"]}"#).unwrap();
        assert_eq!(
            annotation.aligned_segments,
            Some(vec![SegmentRef::Ordinal(3), SegmentRef::Id("seg-7".into())])
        );
    }

    #[test]
    fn test_missing_serializes_as_null() {
        let json = serde_json::to_string(&vec![
            AnnotationSlot::Missing,
            AnnotationSlot::Present(Annotation::with_span(0, 2)),
        ])
        .unwrap();
        assert_eq!(json, r#"[null,{"span":{"start":0,"end":2}}]"#);
    }

    #[test]
    fn test_order_slots_uses_explicit_index() {
        let ordered = order_slots(vec![
            AnnotationSlot::Present(Annotation::with_span(5, 8).index(2)),
            AnnotationSlot::Present(Annotation::with_span(0, 5).index(0)),
        ]);

        assert_eq!(ordered.len(), 3);
        assert_eq!(ordered[0].span(), Some(Span::new(0, 5)));
        assert_eq!(ordered[1], AnnotationSlot::Missing);
        assert_eq!(ordered[2].span(), Some(Span::new(5, 8)));
    }

    #[test]
    fn test_order_slots_keeps_positional_nulls() {
        let ordered = order_slots(vec![
            AnnotationSlot::Missing,
            AnnotationSlot::Present(Annotation::with_span(4, 10)),
            AnnotationSlot::Missing,
        ]);
        assert_eq!(ordered.len(), 3);
        assert_eq!(ordered[1].span(), Some(Span::new(4, 10)));
    }

    #[test]
    fn test_order_slots_ignores_runaway_index() {
        let ordered = order_slots(vec![
            AnnotationSlot::Present(Annotation::with_span(0, 2)),
            AnnotationSlot::Present(Annotation::with_span(2, 4).index(usize::MAX)),
            AnnotationSlot::Present(Annotation::with_span(4, 6).index(10_000_000)),
        ]);
        assert_eq!(ordered.len(), 3);
        assert_eq!(ordered[1].span(), Some(Span::new(2, 4)));
        assert_eq!(ordered[2].span(), Some(Span::new(4, 6)));
    }

    #[test]
    fn test_order_slots_duplicate_keeps_first() {
        let ordered = order_slots(vec![
            AnnotationSlot::Present(Annotation::with_span(0, 2).index(0)),
            AnnotationSlot::Present(Annotation::with_span(2, 4).index(0)),
        ]);
        assert_eq!(ordered[0].span(), Some(Span::new(0, 2)));
        assert_eq!(ordered[1], AnnotationSlot::Missing);
    }
}
