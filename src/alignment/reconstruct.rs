//! Bilingual line reconstruction
//!
//! The alignment annotation is a list of source-side spans, each naming the
//! target segments it corresponds to. Every entry becomes one display line on
//! each side: its own source slice, and the slices of its target segments
//! joined by the configured separator.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::annotation::{reconcile, AnnotationSlot, Reconciliation, SegmentRef};
use crate::config::EngineConfig;
use crate::text::TextBuffer;

/// One alignment group: source ordinals mapped to target ordinals
///
/// Derived for display only; rebuilt on every reconstruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlignmentPair {
    pub source: Vec<usize>,
    pub target: Vec<usize>,
}

/// Parallel display lines, one entry per alignment group
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AlignedLines {
    pub source_lines: Vec<String>,
    pub target_lines: Vec<String>,
    pub pairs: Vec<AlignmentPair>,
    /// References that matched no target segment and were left out
    pub unresolved: Vec<SegmentRef>,
}

impl AlignedLines {
    pub fn source_text(&self) -> String {
        self.source_lines.join("\n")
    }

    pub fn target_text(&self) -> String {
        self.target_lines.join("\n")
    }
}

/// Resolves `SegmentRef`s against a reconciled target segmentation
struct TargetIndex<'a> {
    reconciled: &'a Reconciliation,
    by_id: HashMap<&'a str, usize>,
}

impl<'a> TargetIndex<'a> {
    fn new(reconciled: &'a Reconciliation) -> Self {
        let mut by_id = HashMap::new();
        for slot in reconciled.by_ordinal() {
            if let (Some(id), Some(ordinal)) = (slot.id.as_deref(), slot.ordinal) {
                by_id.entry(id).or_insert(ordinal);
            }
        }
        Self { reconciled, by_id }
    }

    fn resolve(&self, reference: &SegmentRef) -> Option<usize> {
        match reference {
            SegmentRef::Ordinal(ordinal) => (*ordinal < self.reconciled.len()).then_some(*ordinal),
            SegmentRef::Id(id) => self.by_id.get(id.as_str()).copied(),
        }
    }
}

/// Rebuild aligned source/target lines from reconciled annotations
///
/// `target` is the target segmentation, `alignment` the source-side entries
/// carrying `aligned_segments`. Both are taken in ordinal order. Entries with
/// no aligned segments pair their source line with an empty target line.
/// Unresolvable references are skipped and reported in `unresolved`.
pub fn reconstruct(
    target: &[AnnotationSlot],
    alignment: &[AnnotationSlot],
    source_text: &TextBuffer,
    target_text: &TextBuffer,
    config: &EngineConfig,
) -> AlignedLines {
    let target_spans = reconcile(target, Some(target_text.len()));
    let source_spans = reconcile(alignment, Some(source_text.len()));
    let index = TargetIndex::new(&target_spans);

    let mut out = AlignedLines::default();

    for (entry, reconciled) in alignment.iter().zip(source_spans.by_ordinal()) {
        let mut targets: Vec<usize> = Vec::new();
        for reference in entry.aligned_segments() {
            match index.resolve(reference) {
                Some(ordinal) if !targets.contains(&ordinal) => targets.push(ordinal),
                Some(_) => {}
                None => {
                    log::warn!(
                        "alignment entry {:?} references unknown target segment {:?}",
                        reconciled.ordinal,
                        reference
                    );
                    out.unresolved.push(reference.clone());
                }
            }
        }

        let target_line = targets
            .iter()
            .map(|ordinal| target_text.slice(target_spans.by_ordinal()[*ordinal].span))
            .filter(|piece| !piece.is_empty())
            .collect::<Vec<_>>()
            .join(&config.target_join);

        out.source_lines.push(source_text.slice(reconciled.span).to_string());
        out.target_lines.push(target_line);
        out.pairs.push(AlignmentPair {
            source: reconciled.ordinal.into_iter().collect(),
            target: targets,
        });
    }

    log::debug!(
        "reconstructed {} aligned lines ({} unresolved references)",
        out.source_lines.len(),
        out.unresolved.len()
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::Annotation;

    fn target_seg(start: usize, end: usize, id: &str) -> AnnotationSlot {
        AnnotationSlot::Present(Annotation::with_span(start, end).id(id))
    }

    fn align(start: usize, end: usize, refs: Vec<SegmentRef>) -> AnnotationSlot {
        AnnotationSlot::Present(Annotation::with_span(start, end).aligned(refs))
    }

    #[test]
    fn test_one_to_many_alignment() {
        let source = TextBuffer::new("AB");
        let target = TextBuffer::new("aabb");
        let lines = reconstruct(
            &[target_seg(0, 2, "t0"), target_seg(2, 4, "t1")],
            &[align(0, 2, vec![SegmentRef::Id("t0".into()), SegmentRef::Ordinal(1)])],
            &source,
            &target,
            &EngineConfig::default(),
        );

        assert_eq!(lines.source_lines, vec!["AB"]);
        assert_eq!(lines.target_lines, vec!["aa bb"]);
        assert_eq!(lines.pairs[0].target, vec![0, 1]);
    }

    #[test]
    fn test_empty_alignment_gives_empty_target_line() {
        let source = TextBuffer::new("AB");
        let target = TextBuffer::new("aa");
        let lines = reconstruct(
            &[target_seg(0, 2, "t0")],
            &[align(0, 1, vec![SegmentRef::Ordinal(0)]), align(1, 2, vec![])],
            &source,
            &target,
            &EngineConfig::default(),
        );

        assert_eq!(lines.source_lines, vec!["A", "B"]);
        assert_eq!(lines.target_lines, vec!["aa", ""]);
    }

    #[test]
    fn test_unknown_reference_is_skipped() {
        let source = TextBuffer::new("AB");
        let target = TextBuffer::new("aa");
        let lines = reconstruct(
            &[target_seg(0, 2, "t0")],
            &[align(0, 2, vec![SegmentRef::Id("nope".into()), SegmentRef::Ordinal(0), SegmentRef::Ordinal(9)])],
            &source,
            &target,
            &EngineConfig::default(),
        );

        assert_eq!(lines.target_lines, vec!["aa"]);
        assert_eq!(
            lines.unresolved,
            vec![SegmentRef::Id("nope".into()), SegmentRef::Ordinal(9)]
        );
    }

    #[test]
    fn test_missing_source_entry_keeps_ordinal_position() {
        let source = TextBuffer::new("AABB");
        let target = TextBuffer::new("aabb");
        let lines = reconstruct(
            &[target_seg(0, 2, "t0"), target_seg(2, 4, "t1")],
            &[
                align(0, 2, vec![SegmentRef::Ordinal(0)]),
                AnnotationSlot::Missing,
                align(2, 4, vec![SegmentRef::Ordinal(1)]),
            ],
            &source,
            &target,
            &EngineConfig::default(),
        );

        assert_eq!(lines.source_lines, vec!["AA", "", "BB"]);
        assert_eq!(lines.target_lines, vec!["aa", "", "bb"]);
        assert_eq!(lines.source_text(), "AA\n\nBB");
    }

    #[test]
    fn test_custom_join() {
        let source = TextBuffer::new("A");
        let target = TextBuffer::new("ab");
        let config = EngineConfig {
            target_join: " | ".to_string(),
            ..EngineConfig::default()
        };
        let lines = reconstruct(
            &[target_seg(0, 1, "x"), target_seg(1, 2, "y")],
            &[align(0, 1, vec![SegmentRef::Ordinal(0), SegmentRef::Ordinal(1)])],
            &source,
            &target,
            &config,
        );
        assert_eq!(lines.target_lines, vec!["a | b"]);
    }
}
