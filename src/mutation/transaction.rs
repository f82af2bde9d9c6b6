//! Snapshots and reversible application of segment operations

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::mutator::{self, Outcome, SegmentOp};
use crate::error::Result;
use crate::segments::store::{check_bounds, remap_segment_ids};
use crate::segments::{Segment, SegmentId, SegmentStore};
use crate::text::TextBuffer;

/// Exact copy of a store's segments at one point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    segments: Vec<Segment>,
}

impl Snapshot {
    pub fn capture(store: &SegmentStore) -> Self {
        Self {
            segments: store.segments().to_vec(),
        }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Put the store back exactly as captured
    pub fn restore(&self, store: &mut SegmentStore) {
        store.replace_segments(self.segments.clone());
    }

    pub(crate) fn remap_ids(&mut self, renames: &HashMap<SegmentId, SegmentId>) {
        remap_segment_ids(&mut self.segments, renames);
    }

    /// Check the snapshot still fits `buffer`
    pub(crate) fn check_rebind(&self, buffer: &TextBuffer) -> Result<()> {
        check_bounds(buffer, self.segments.iter().map(|s| s.span()))
    }

    /// Re-slice cached text against a new buffer
    pub(crate) fn rebind(&mut self, buffer: &TextBuffer) {
        for segment in &mut self.segments {
            let span = segment.span();
            segment.set_span(span, buffer);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionState {
    Applied,
    Committed,
    RolledBack,
}

/// An operation applied to a store, with the snapshot needed to undo it
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    op: SegmentOp,
    snapshot: Snapshot,
    outcome: Outcome,
    state: TransactionState,
}

impl Transaction {
    /// Capture a snapshot and apply `op`
    ///
    /// Validation failures return the error with `store` unchanged and no
    /// transaction to undo.
    pub fn apply(store: &mut SegmentStore, op: SegmentOp) -> Result<Self> {
        let snapshot = Snapshot::capture(store);
        let outcome = mutator::apply(store, &op)?;
        Ok(Self {
            op,
            snapshot,
            outcome,
            state: TransactionState::Applied,
        })
    }

    pub fn op(&self) -> &SegmentOp {
        &self.op
    }

    pub fn outcome(&self) -> &Outcome {
        &self.outcome
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// The applied state is authoritative; the snapshot is no longer needed
    pub fn commit(mut self) -> Outcome {
        self.state = TransactionState::Committed;
        self.outcome
    }

    /// Restore the pre-operation state
    pub fn rollback(mut self, store: &mut SegmentStore) -> SegmentOp {
        self.snapshot.restore(store);
        self.state = TransactionState::RolledBack;
        log::info!("rolled back {} on {}", self.op.name(), store.document_id());
        self.op
    }

    pub(crate) fn remap_ids(&mut self, renames: &HashMap<SegmentId, SegmentId>) {
        self.op.remap_ids(renames);
        self.snapshot.remap_ids(renames);
        for id in self
            .outcome
            .created
            .iter_mut()
            .chain(self.outcome.updated.iter_mut())
            .chain(self.outcome.removed.iter_mut())
        {
            if let Some(new_id) = renames.get(id) {
                *id = new_id.clone();
            }
        }
    }

    pub(crate) fn snapshot_mut(&mut self) -> &mut Snapshot {
        &mut self.snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segments::{DocumentId, SegmentPatch};
    use crate::text::Span;

    fn store() -> SegmentStore {
        let buffer = TextBuffer::new("helloworld");
        let segment = Segment::new(SegmentId::new("s0"), 0, Span::new(0, 10), &buffer);
        SegmentStore::from_segments(DocumentId::new("doc"), buffer, vec![segment]).unwrap()
    }

    #[test]
    fn test_rollback_restores_exact_state() {
        let mut store = store();
        let before = serde_json::to_string(store.segments()).unwrap();

        let tx = Transaction::apply(
            &mut store,
            SegmentOp::Split {
                segment_id: SegmentId::new("s0"),
                position: 5,
            },
        )
        .unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(tx.state(), TransactionState::Applied);

        tx.rollback(&mut store);
        assert_eq!(serde_json::to_string(store.segments()).unwrap(), before);
    }

    #[test]
    fn test_failed_apply_leaves_store() {
        let mut store = store();
        let before = store.clone();
        let result = Transaction::apply(
            &mut store,
            SegmentOp::Update {
                segment_id: SegmentId::new("missing"),
                patch: SegmentPatch::default(),
            },
        );
        assert!(result.is_err());
        assert_eq!(store, before);
    }

    #[test]
    fn test_reset_records_removed_ids() {
        let mut store = store();
        let tx = Transaction::apply(&mut store, SegmentOp::Reset).unwrap();
        assert!(store.is_empty());
        assert_eq!(tx.commit().removed, vec![SegmentId::new("s0")]);
    }
}
