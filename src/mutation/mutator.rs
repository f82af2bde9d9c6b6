//! Structural edits on a segment store
//!
//! Every operation works on a draft copy of the segment list. The draft is
//! validated as a whole (bounds, order, uniqueness, parents) and only then
//! installed, so a rejected edit leaves the store exactly as it was.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::error::{EngineError, Result};
use crate::segments::store::{check_bounds, check_order, check_unique};
use crate::segments::{
    BulkOperations, NewSegment, Segment, SegmentId, SegmentPatch, SegmentStore, SegmentUpdate,
};
use crate::text::{Span, TextBuffer};

/// A requested edit, in the form it is sent to the authoritative store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum SegmentOp {
    /// `position` is a codepoint offset into the segment's own text
    Split { segment_id: SegmentId, position: usize },
    Merge { segment_ids: Vec<SegmentId> },
    CreateBulk { segments: Vec<NewSegment> },
    BulkOperations { operations: BulkOperations },
    Update { segment_id: SegmentId, patch: SegmentPatch },
    UpdateBulk { updates: Vec<SegmentUpdate> },
    Delete { segment_id: SegmentId },
    Reset,
}

impl SegmentOp {
    pub fn name(&self) -> &'static str {
        match self {
            SegmentOp::Split { .. } => "split",
            SegmentOp::Merge { .. } => "merge",
            SegmentOp::CreateBulk { .. } => "create_bulk",
            SegmentOp::BulkOperations { .. } => "bulk_operations",
            SegmentOp::Update { .. } => "update",
            SegmentOp::UpdateBulk { .. } => "update_bulk",
            SegmentOp::Delete { .. } => "delete",
            SegmentOp::Reset => "reset",
        }
    }

    /// Replace provisional ids with the ones the server assigned
    pub(crate) fn remap_ids(&mut self, renames: &HashMap<SegmentId, SegmentId>) {
        let rename = |id: &mut SegmentId| {
            if let Some(new_id) = renames.get(id) {
                *id = new_id.clone();
            }
        };
        let rename_patch = |patch: &mut SegmentPatch| {
            if let Some(Some(parent)) = patch.parent_id.as_mut() {
                if let Some(new_id) = renames.get(parent) {
                    *parent = new_id.clone();
                }
            }
        };

        match self {
            SegmentOp::Split { segment_id, .. } | SegmentOp::Delete { segment_id } => rename(segment_id),
            SegmentOp::Merge { segment_ids } => segment_ids.iter_mut().for_each(rename),
            SegmentOp::CreateBulk { segments } => {
                for segment in segments {
                    if let Some(parent) = segment.parent_id.as_mut() {
                        rename(parent);
                    }
                }
            }
            SegmentOp::BulkOperations { operations } => {
                operations.delete.iter_mut().for_each(rename);
                for update in &mut operations.update {
                    rename(&mut update.id);
                    rename_patch(&mut update.patch);
                }
                for segment in &mut operations.create {
                    if let Some(parent) = segment.parent_id.as_mut() {
                        rename(parent);
                    }
                }
            }
            SegmentOp::Update { segment_id, patch } => {
                rename(segment_id);
                rename_patch(patch);
            }
            SegmentOp::UpdateBulk { updates } => {
                for update in updates {
                    rename(&mut update.id);
                    rename_patch(&mut update.patch);
                }
            }
            SegmentOp::Reset => {}
        }
    }
}

/// What an applied edit did, by segment id
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Outcome {
    /// New segments, carrying provisional ids until confirmed
    pub created: Vec<SegmentId>,
    pub updated: Vec<SegmentId>,
    pub removed: Vec<SegmentId>,
}

/// Apply `op` to `store`, or fail leaving it untouched
pub fn apply(store: &mut SegmentStore, op: &SegmentOp) -> Result<Outcome> {
    let mut draft = Draft::of(store);
    let outcome = match op {
        SegmentOp::Split { segment_id, position } => draft.split(segment_id, *position)?,
        SegmentOp::Merge { segment_ids } => draft.merge(segment_ids)?,
        SegmentOp::CreateBulk { segments } => Outcome {
            created: draft.create(segments)?,
            ..Outcome::default()
        },
        SegmentOp::BulkOperations { operations } => draft.bulk(operations)?,
        SegmentOp::Update { segment_id, patch } => {
            draft.update(segment_id, patch)?;
            Outcome {
                updated: vec![segment_id.clone()],
                ..Outcome::default()
            }
        }
        SegmentOp::UpdateBulk { updates } => {
            for update in updates {
                draft.update(&update.id, &update.patch)?;
            }
            Outcome {
                updated: updates.iter().map(|u| u.id.clone()).collect(),
                ..Outcome::default()
            }
        }
        SegmentOp::Delete { segment_id } => {
            draft.delete(std::slice::from_ref(segment_id))?;
            Outcome {
                removed: vec![segment_id.clone()],
                ..Outcome::default()
            }
        }
        SegmentOp::Reset => Outcome {
            removed: draft.segments.drain(..).map(|s| s.id).collect(),
            ..Outcome::default()
        },
    };

    draft.commit(store)?;
    log::debug!(
        "{} on {}: {} created, {} updated, {} removed",
        op.name(),
        store.document_id(),
        outcome.created.len(),
        outcome.updated.len(),
        outcome.removed.len()
    );
    Ok(outcome)
}

/// Split a segment at a codepoint offset within its text
pub fn split(store: &mut SegmentStore, segment_id: &SegmentId, position: usize) -> Result<(SegmentId, SegmentId)> {
    let outcome = apply(
        store,
        &SegmentOp::Split {
            segment_id: segment_id.clone(),
            position,
        },
    )?;
    // Two created ids means the store was empty and the first half is new too
    let first = match outcome.created.as_slice() {
        [initial, _] => initial.clone(),
        _ => segment_id.clone(),
    };
    Ok((first, outcome.created[outcome.created.len() - 1].clone()))
}

/// Merge index-contiguous segments into the lowest-index one
pub fn merge(store: &mut SegmentStore, segment_ids: &[SegmentId]) -> Result<SegmentId> {
    let outcome = apply(
        store,
        &SegmentOp::Merge {
            segment_ids: segment_ids.to_vec(),
        },
    )?;
    Ok(outcome.updated[0].clone())
}

pub fn create_bulk(store: &mut SegmentStore, segments: Vec<NewSegment>) -> Result<Vec<SegmentId>> {
    apply(store, &SegmentOp::CreateBulk { segments }).map(|outcome| outcome.created)
}

pub fn bulk_operations(store: &mut SegmentStore, operations: BulkOperations) -> Result<Outcome> {
    apply(store, &SegmentOp::BulkOperations { operations })
}

pub fn update(store: &mut SegmentStore, segment_id: &SegmentId, patch: SegmentPatch) -> Result<()> {
    apply(
        store,
        &SegmentOp::Update {
            segment_id: segment_id.clone(),
            patch,
        },
    )
    .map(|_| ())
}

pub fn update_bulk(store: &mut SegmentStore, updates: Vec<SegmentUpdate>) -> Result<()> {
    apply(store, &SegmentOp::UpdateBulk { updates }).map(|_| ())
}

pub fn delete(store: &mut SegmentStore, segment_id: &SegmentId) -> Result<()> {
    apply(
        store,
        &SegmentOp::Delete {
            segment_id: segment_id.clone(),
        },
    )
    .map(|_| ())
}

/// Clear every segment; never fails
pub fn reset(store: &mut SegmentStore) -> usize {
    let removed = store.len();
    store.clear();
    log::debug!("reset {}: {} segments removed", store.document_id(), removed);
    removed
}

/// Working copy of a store's segments
struct Draft {
    buffer: TextBuffer,
    segments: Vec<Segment>,
    /// Segments whose parent was set and needs checking
    reparented: Vec<SegmentId>,
}

impl Draft {
    fn of(store: &SegmentStore) -> Self {
        Self {
            buffer: store.buffer().clone(),
            segments: store.segments().to_vec(),
            reparented: Vec::new(),
        }
    }

    fn position(&self, id: &SegmentId) -> Result<usize> {
        self.segments
            .iter()
            .position(|segment| &segment.id == id)
            .ok_or_else(|| EngineError::SegmentNotFound(id.clone()))
    }

    fn check_span(&self, span: Span) -> Result<()> {
        check_bounds(&self.buffer, std::iter::once(span))
    }

    /// On an empty store the whole content first becomes one segment, which
    /// is then split; `segment_id` is not looked up in that case.
    fn split(&mut self, segment_id: &SegmentId, position: usize) -> Result<Outcome> {
        if self.segments.is_empty() {
            let initial = self.bootstrap()?;
            let mut outcome = self.split(&initial, position)?;
            outcome.created.insert(0, initial);
            outcome.updated.clear();
            return Ok(outcome);
        }

        let at = self.position(segment_id)?;
        let original = &self.segments[at];
        let length = original.char_len();
        if position == 0 || position >= length {
            return Err(EngineError::InvalidSplitPosition {
                segment_id: segment_id.clone(),
                position,
                length,
            });
        }

        let (left, right) = original.span.split_at(position);
        let mut second = Segment::new(SegmentId::generate(), at + 1, right, &self.buffer);
        second.parent_id = original.parent_id.clone();
        second.status = original.status;

        let first = &mut self.segments[at];
        first.set_span(left, &self.buffer);
        first.refresh_annotation();
        first.touch();

        let created = second.id.clone();
        self.segments.insert(at + 1, second);
        Ok(Outcome {
            created: vec![created],
            updated: vec![segment_id.clone()],
            removed: Vec::new(),
        })
    }

    fn bootstrap(&mut self) -> Result<SegmentId> {
        if self.buffer.as_str().trim().is_empty() {
            return Err(EngineError::EmptyDocument);
        }
        let mut initial = Segment::new(SegmentId::generate(), 0, Span::new(0, self.buffer.len()), &self.buffer);
        initial.refresh_annotation();
        log::debug!("no segments yet, splitting the full content ({} codepoints)", self.buffer.len());

        let id = initial.id.clone();
        self.segments.push(initial);
        Ok(id)
    }

    fn merge(&mut self, segment_ids: &[SegmentId]) -> Result<Outcome> {
        if segment_ids.len() < 2 {
            return Err(EngineError::NonContiguousMerge(
                "at least two segments are required".to_string(),
            ));
        }

        let mut positions = Vec::with_capacity(segment_ids.len());
        let mut seen = HashSet::with_capacity(segment_ids.len());
        for id in segment_ids {
            if !seen.insert(id) {
                return Err(EngineError::NonContiguousMerge(format!("segment {} listed twice", id)));
            }
            let position = self
                .position(id)
                .map_err(|_| EngineError::NonContiguousMerge(format!("unknown segment {}", id)))?;
            positions.push(position);
        }
        positions.sort_unstable();
        if let Some(gap) = positions.windows(2).find(|w| w[1] != w[0] + 1) {
            return Err(EngineError::NonContiguousMerge(format!(
                "indices {} and {} are not adjacent",
                gap[0], gap[1]
            )));
        }

        let first = positions[0];
        let last = positions[positions.len() - 1];
        let removed: Vec<Segment> = self.segments.drain(first + 1..=last).collect();
        let kept = &mut self.segments[first];

        let span = removed.iter().fold(kept.span, |acc, s| acc.cover(&s.span));
        kept.set_span(span, &self.buffer);
        for other in &removed {
            fill(&mut kept.title, &other.title);
            fill(&mut kept.author, &other.author);
            if kept.parent_id.is_none() {
                kept.parent_id = other.parent_id.clone();
            }
        }
        let kept_id = kept.id.clone();
        let removed_ids: Vec<SegmentId> = removed.into_iter().map(|s| s.id).collect();
        if kept.parent_id.as_ref().is_some_and(|p| p == &kept_id || removed_ids.contains(p)) {
            kept.parent_id = None;
        }
        kept.refresh_annotation();
        kept.touch();

        for segment in &mut self.segments {
            if segment.parent_id.as_ref().is_some_and(|p| removed_ids.contains(p)) {
                segment.parent_id = Some(kept_id.clone());
            }
        }

        Ok(Outcome {
            created: Vec::new(),
            updated: vec![kept_id],
            removed: removed_ids,
        })
    }

    fn create(&mut self, new_segments: &[NewSegment]) -> Result<Vec<SegmentId>> {
        let mut created = Vec::with_capacity(new_segments.len());
        for new in new_segments {
            self.check_span(new.span)?;
            let mut segment = Segment::new(SegmentId::generate(), self.segments.len(), new.span, &self.buffer);
            segment.title = new.title.clone();
            segment.author = new.author.clone();
            segment.is_attached = new.is_attached;
            segment.status = new.status;
            if let Some(parent) = &new.parent_id {
                segment.parent_id = Some(parent.clone());
                self.reparented.push(segment.id.clone());
            }
            segment.refresh_annotation();
            created.push(segment.id.clone());
            self.segments.push(segment);
        }
        Ok(created)
    }

    fn update(&mut self, segment_id: &SegmentId, patch: &SegmentPatch) -> Result<()> {
        let at = self.position(segment_id)?;
        if let Some(span) = patch.span {
            self.check_span(span)?;
            self.segments[at].set_span(span, &self.buffer);
        }
        if matches!(patch.parent_id, Some(Some(_))) {
            self.reparented.push(segment_id.clone());
        }
        let segment = &mut self.segments[at];
        patch.apply_metadata(segment);
        segment.touch();
        Ok(())
    }

    fn delete(&mut self, segment_ids: &[SegmentId]) -> Result<()> {
        let mut doomed = HashSet::with_capacity(segment_ids.len());
        for id in segment_ids {
            self.position(id)?;
            if !doomed.insert(id.clone()) {
                return Err(EngineError::DuplicateSegment(id.clone()));
            }
        }
        self.segments.retain(|segment| !doomed.contains(&segment.id));
        for segment in &mut self.segments {
            if segment.parent_id.as_ref().is_some_and(|p| doomed.contains(p)) {
                segment.parent_id = None;
            }
        }
        Ok(())
    }

    fn bulk(&mut self, operations: &BulkOperations) -> Result<Outcome> {
        self.delete(&operations.delete)?;
        for update in &operations.update {
            self.update(&update.id, &update.patch)?;
        }
        let created = self.create(&operations.create)?;
        Ok(Outcome {
            created,
            updated: operations.update.iter().map(|u| u.id.clone()).collect(),
            removed: operations.delete.clone(),
        })
    }

    fn check_parents(&self) -> Result<()> {
        let parents: HashMap<&SegmentId, &SegmentId> = self
            .segments
            .iter()
            .filter_map(|s| s.parent_id.as_ref().map(|p| (&s.id, p)))
            .collect();
        let known: HashSet<&SegmentId> = self.segments.iter().map(|s| &s.id).collect();

        for id in &self.reparented {
            let Some(parent) = parents.get(id) else { continue };
            let invalid = |reason: &str| EngineError::InvalidParent {
                segment_id: id.clone(),
                reason: reason.to_string(),
            };
            if *parent == id {
                return Err(invalid("a segment cannot be its own parent"));
            }
            if !known.contains(parent) {
                return Err(invalid("parent segment does not exist"));
            }

            let mut seen = HashSet::new();
            let mut ancestor = Some(*parent);
            while let Some(current) = ancestor {
                if current == id {
                    return Err(invalid("parent is a descendant of the segment"));
                }
                if !seen.insert(current) {
                    break;
                }
                ancestor = parents.get(current).copied();
            }
        }
        Ok(())
    }

    fn commit(mut self, store: &mut SegmentStore) -> Result<()> {
        self.segments.sort_by_key(|segment| (segment.span.start, segment.span.end));
        check_bounds(&self.buffer, self.segments.iter().map(|s| s.span))?;
        check_order(&self.segments)?;
        check_unique(&self.segments)?;
        self.check_parents()?;

        for (position, segment) in self.segments.iter_mut().enumerate() {
            segment.index = position;
        }
        store.replace_segments(self.segments);
        Ok(())
    }
}

fn fill(target: &mut Option<String>, source: &Option<String>) {
    let empty = target.as_deref().map_or(true, str::is_empty);
    if empty && source.as_deref().is_some_and(|s| !s.is_empty()) {
        *target = source.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segments::{DocumentId, SegmentStatus};

    fn store(text: &str, spans: &[(usize, usize)]) -> SegmentStore {
        let buffer = TextBuffer::new(text);
        let segments = spans
            .iter()
            .enumerate()
            .map(|(i, (s, e))| Segment::new(SegmentId::new(format!("s{}", i)), i, Span::new(*s, *e), &buffer))
            .collect();
        SegmentStore::from_segments(DocumentId::new("doc"), buffer, segments).unwrap()
    }

    fn id(s: &str) -> SegmentId {
        SegmentId::new(s)
    }

    #[test]
    fn test_split_helloworld() {
        let mut store = store("helloworld", &[(0, 10)]);
        let (first, second) = split(&mut store, &id("s0"), 5).unwrap();

        assert_eq!(first, id("s0"));
        let segments = store.segments();
        assert_eq!(segments[0].span(), Span::new(0, 5));
        assert_eq!(segments[0].text(), "hello");
        assert_eq!(segments[1].id, second);
        assert_eq!(segments[1].span(), Span::new(5, 10));
        assert_eq!(segments[1].text(), "world");
    }

    #[test]
    fn test_split_rejects_boundaries() {
        let mut store = store("helloworld", &[(0, 10)]);
        let before = store.clone();
        for position in [0, 10, 11] {
            assert!(matches!(
                split(&mut store, &id("s0"), position),
                Err(EngineError::InvalidSplitPosition { .. })
            ));
        }
        assert_eq!(store, before);
    }

    #[test]
    fn test_split_shifts_following_indices() {
        let mut store = store("aaaabbbbcccc", &[(0, 4), (4, 8), (8, 12)]);
        split(&mut store, &id("s1"), 2).unwrap();
        let indices: Vec<(String, usize)> = store
            .segments()
            .iter()
            .map(|s| (s.text().to_string(), s.index()))
            .collect();
        assert_eq!(indices[1], ("bb".to_string(), 1));
        assert_eq!(indices[2], ("bb".to_string(), 2));
        assert_eq!(indices[3], ("cccc".to_string(), 3));
        assert_eq!(store.segments()[1].span(), Span::new(4, 6));
        assert_eq!(store.segments()[2].span(), Span::new(6, 8));
        store.check_invariants().unwrap();
    }

    #[test]
    fn test_split_empty_store_starts_from_full_content() {
        let mut store = store("helloworld", &[]);
        let (first, second) = split(&mut store, &id("anything"), 5).unwrap();

        assert_ne!(first, id("anything"));
        let texts: Vec<(&str, usize)> = store.segments().iter().map(|s| (s.text(), s.index())).collect();
        assert_eq!(texts, vec![("hello", 0), ("world", 1)]);
        assert_eq!(store.segments()[0].id, first);
        assert_eq!(store.segments()[1].id, second);

        let outcome = apply(
            &mut store.clone(),
            &SegmentOp::Split {
                segment_id: first.clone(),
                position: 2,
            },
        )
        .unwrap();
        assert_eq!(outcome.updated, vec![first]);
    }

    #[test]
    fn test_split_empty_store_rejects_blank_content() {
        let mut blank = store(" \n\t", &[]);
        assert_eq!(split(&mut blank, &id("s0"), 1), Err(EngineError::EmptyDocument));
        assert!(blank.is_empty());

        let mut short = store("abc", &[]);
        assert!(matches!(
            split(&mut short, &id("s0"), 3),
            Err(EngineError::InvalidSplitPosition { length: 3, .. })
        ));
        assert!(short.is_empty());
    }

    #[test]
    fn test_split_second_inherits_parent_and_status() {
        let mut store = store("aaaabbbb", &[(0, 4), (4, 8)]);
        update(
            &mut store,
            &id("s1"),
            SegmentPatch {
                parent_id: Some(Some(id("s0"))),
                status: Some(SegmentStatus::Checked),
                title: Some(Some("T".into())),
                ..Default::default()
            },
        )
        .unwrap();
        let (_, second) = split(&mut store, &id("s1"), 1).unwrap();
        let second = store.get(&second).unwrap();
        assert_eq!(second.parent_id, Some(id("s0")));
        assert_eq!(second.status, SegmentStatus::Checked);
        assert_eq!(second.title, None);
    }

    #[test]
    fn test_merge_scenario_c() {
        let text: String = std::iter::repeat('x').take(60).collect();
        let mut store = store(
            &text,
            &[(0, 10), (10, 20), (20, 30), (30, 45), (45, 50), (50, 55), (55, 60)],
        );
        let kept = merge(&mut store, &[id("s3"), id("s2"), id("s4")]).unwrap();

        assert_eq!(kept, id("s2"));
        assert_eq!(store.get(&kept).unwrap().span(), Span::new(20, 50));
        assert_eq!(store.get(&id("s5")).unwrap().index(), 3);
        assert_eq!(store.get(&id("s6")).unwrap().index(), 4);
        store.check_invariants().unwrap();
    }

    #[test]
    fn test_merge_validation() {
        let mut store = store("aabbcc", &[(0, 2), (2, 4), (4, 6)]);
        let before = store.clone();
        for ids in [vec![id("s0")], vec![id("s0"), id("s2")], vec![id("s0"), id("s0")], vec![id("s0"), id("zz")]] {
            assert!(matches!(merge(&mut store, &ids), Err(EngineError::NonContiguousMerge(_))));
        }
        assert_eq!(store, before);
    }

    #[test]
    fn test_merge_fills_missing_metadata() {
        let mut store = store("aabbcc", &[(0, 2), (2, 4), (4, 6)]);
        update_bulk(
            &mut store,
            vec![
                SegmentUpdate::new(
                    "s0",
                    SegmentPatch {
                        title: Some(Some("First".into())),
                        ..Default::default()
                    },
                ),
                SegmentUpdate::new(
                    "s1",
                    SegmentPatch {
                        title: Some(Some("Second".into())),
                        author: Some(Some("Author".into())),
                        ..Default::default()
                    },
                ),
            ],
        )
        .unwrap();

        merge(&mut store, &[id("s0"), id("s1")]).unwrap();
        let merged = store.get(&id("s0")).unwrap();
        assert_eq!(merged.title.as_deref(), Some("First"));
        assert_eq!(merged.author.as_deref(), Some("Author"));
        assert!(merged.is_annotated());
    }

    #[test]
    fn test_merge_repoints_children() {
        let mut store = store("aabbcc", &[(0, 2), (2, 4), (4, 6)]);
        update(
            &mut store,
            &id("s2"),
            SegmentPatch {
                parent_id: Some(Some(id("s1"))),
                ..Default::default()
            },
        )
        .unwrap();
        merge(&mut store, &[id("s0"), id("s1")]).unwrap();
        assert_eq!(store.get(&id("s2")).unwrap().parent_id, Some(id("s0")));
    }

    #[test]
    fn test_create_bulk_rejects_overlap_atomically() {
        let mut store = store("abcdefghij", &[(0, 2)]);
        let before = store.clone();
        let result = create_bulk(&mut store, vec![NewSegment::at(2, 5), NewSegment::at(4, 8)]);
        assert!(matches!(result, Err(EngineError::OverlappingSpans { .. })));
        assert_eq!(store, before);

        assert!(matches!(
            create_bulk(&mut store, vec![NewSegment::at(2, 11)]),
            Err(EngineError::SpanOutOfBounds { .. })
        ));
        assert_eq!(store, before);
    }

    #[test]
    fn test_create_bulk_orders_by_span() {
        let mut store = store("abcdefghij", &[(5, 7)]);
        let created = create_bulk(&mut store, vec![NewSegment::at(7, 10), NewSegment::at(0, 5)]).unwrap();
        let texts: Vec<&str> = store.segments().iter().map(|s| s.text()).collect();
        assert_eq!(texts, vec!["abcde", "fg", "hij"]);
        assert_eq!(store.get(&created[0]).unwrap().index(), 2);
        store.check_invariants().unwrap();
    }

    #[test]
    fn test_bulk_operations_order() {
        let mut store = store("aabbccdd", &[(0, 2), (2, 4), (4, 6)]);
        let outcome = bulk_operations(
            &mut store,
            BulkOperations {
                delete: vec![id("s1")],
                update: vec![SegmentUpdate::new(
                    "s2",
                    SegmentPatch {
                        span: Some(Span::new(2, 6)),
                        ..Default::default()
                    },
                )],
                create: vec![NewSegment::at(6, 8)],
            },
        )
        .unwrap();

        let texts: Vec<&str> = store.segments().iter().map(|s| s.text()).collect();
        assert_eq!(texts, vec!["aa", "bbcc", "dd"]);
        assert_eq!(outcome.removed, vec![id("s1")]);
        assert_eq!(outcome.created.len(), 1);
        store.check_invariants().unwrap();
    }

    #[test]
    fn test_bulk_operations_all_or_nothing() {
        let mut store = store("aabbcc", &[(0, 2), (2, 4), (4, 6)]);
        let before = store.clone();
        let result = bulk_operations(
            &mut store,
            BulkOperations {
                delete: vec![id("s1")],
                update: vec![SegmentUpdate::new(
                    "s1",
                    SegmentPatch {
                        title: Some(Some("gone".into())),
                        ..Default::default()
                    },
                )],
                create: vec![],
            },
        );
        assert!(matches!(result, Err(EngineError::SegmentNotFound(_))));
        assert_eq!(store, before);
    }

    #[test]
    fn test_update_detaches_parent() {
        let mut store = store("aabb", &[(0, 2), (2, 4)]);
        update(
            &mut store,
            &id("s1"),
            SegmentPatch {
                parent_id: Some(Some(id("s0"))),
                ..Default::default()
            },
        )
        .unwrap();
        update(
            &mut store,
            &id("s1"),
            SegmentPatch {
                parent_id: Some(None),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(store.get(&id("s1")).unwrap().parent_id, None);
    }

    #[test]
    fn test_update_rejects_parent_cycle() {
        let mut store = store("aabbcc", &[(0, 2), (2, 4), (4, 6)]);
        update(
            &mut store,
            &id("s1"),
            SegmentPatch {
                parent_id: Some(Some(id("s0"))),
                ..Default::default()
            },
        )
        .unwrap();

        let cyclic = update(
            &mut store,
            &id("s0"),
            SegmentPatch {
                parent_id: Some(Some(id("s1"))),
                ..Default::default()
            },
        );
        assert!(matches!(cyclic, Err(EngineError::InvalidParent { .. })));

        let own = update(
            &mut store,
            &id("s2"),
            SegmentPatch {
                parent_id: Some(Some(id("s2"))),
                ..Default::default()
            },
        );
        assert!(matches!(own, Err(EngineError::InvalidParent { .. })));
    }

    #[test]
    fn test_delete_and_reset() {
        let mut store = store("aabbcc", &[(0, 2), (2, 4), (4, 6)]);
        delete(&mut store, &id("s0")).unwrap();
        assert_eq!(store.segments()[0].id, id("s1"));
        assert_eq!(store.segments()[0].index(), 0);

        assert_eq!(reset(&mut store), 2);
        assert!(store.is_empty());
    }

    #[test]
    fn test_op_remap_ids() {
        let mut op = SegmentOp::Merge {
            segment_ids: vec![id("tmp"), id("s1")],
        };
        let renames = HashMap::from([(id("tmp"), id("srv"))]);
        op.remap_ids(&renames);
        assert_eq!(
            op,
            SegmentOp::Merge {
                segment_ids: vec![id("srv"), id("s1")]
            }
        );
    }
}
