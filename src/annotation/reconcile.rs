//! Dense span reconstruction from sparse annotation lists
//!
//! Walks the slots in ordinal order with a cursor at the end of the last
//! recorded span:
//!
//! - a recorded span is kept verbatim and moves the cursor to its end
//! - a missing slot becomes a zero-length placeholder at the cursor
//! - a gap between the cursor and the next recorded span is covered by a
//!   filler span in `covering()`
//!
//! Trailing placeholders sit at the final cursor, not at the end of the text:
//! they mean "nothing further recorded", not "the rest of the text".

use serde::{Deserialize, Serialize};

use super::types::AnnotationSlot;
use crate::error::{EngineError, Result};
use crate::text::Span;

/// Where a reconciled span came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpanOrigin {
    /// Recorded upstream
    Recorded,
    /// Synthesized for a missing slot
    Placeholder,
    /// Synthesized to cover offsets no slot accounts for
    Filler,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciledSpan {
    /// Ordinal of the originating slot; `None` for fillers
    pub ordinal: Option<usize>,
    pub span: Span,
    pub origin: SpanOrigin,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

/// Result of reconciling one annotation list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reconciliation {
    slots: Vec<ReconciledSpan>,
    implied_end: usize,
}

impl Reconciliation {
    /// One span per input slot, in ordinal order
    pub fn by_ordinal(&self) -> &[ReconciledSpan] {
        &self.slots
    }

    /// Plain spans, one per input slot
    pub fn spans(&self) -> Vec<Span> {
        self.slots.iter().map(|slot| slot.span).collect()
    }

    /// End of the last recorded span; the extent the list accounts for
    pub fn implied_end(&self) -> usize {
        self.implied_end
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Offset ranges before `implied_end` that no slot covers
    pub fn gaps(&self) -> Vec<Span> {
        let mut gaps = Vec::new();
        let mut covered = 0;
        for slot in &self.slots {
            if slot.span.start > covered {
                gaps.push(Span::new(covered, slot.span.start));
            }
            covered = covered.max(slot.span.end);
        }
        gaps
    }

    /// All slots plus filler spans, contiguously covering `[0, implied_end)`
    ///
    /// Fillers are placed immediately before the slot whose start exposed the
    /// gap, so ordinal order is preserved.
    pub fn covering(&self) -> Result<Vec<ReconciledSpan>> {
        let mut out = Vec::with_capacity(self.slots.len());
        let mut covered = 0;

        for slot in &self.slots {
            if slot.span.start > covered {
                out.push(ReconciledSpan {
                    ordinal: None,
                    span: Span::new(covered, slot.span.start),
                    origin: SpanOrigin::Filler,
                    id: None,
                });
            }
            covered = covered.max(slot.span.end);
            out.push(slot.clone());
        }

        verify_coverage(&out, self.implied_end)?;
        Ok(out)
    }
}

/// Check that `spans` tile `[0, end)` without gaps or overlaps
pub fn verify_coverage(spans: &[ReconciledSpan], end: usize) -> Result<()> {
    let mut covered = 0;
    for slot in spans {
        if slot.span.start != covered {
            let gap = if slot.span.start > covered {
                Span::new(covered, slot.span.start)
            } else {
                Span::new(slot.span.start, covered)
            };
            log::error!("reconciliation invariant violated at {} (ordinal {:?})", gap, slot.ordinal);
            return Err(EngineError::ReconciliationGap { gap });
        }
        covered = slot.span.end;
    }
    if covered != end {
        let gap = Span::new(covered.min(end), covered.max(end));
        log::error!("reconciliation stopped at {} but the list implies {}", covered, end);
        return Err(EngineError::ReconciliationGap { gap });
    }
    Ok(())
}

/// Reconcile a sparse slot list into one span per slot
///
/// When `text_len` is given, recorded spans running past it are demoted to
/// placeholders. Recorded spans starting before the cursor (overlapping an
/// earlier span) are demoted as well. Both cases are logged.
pub fn reconcile(slots: &[AnnotationSlot], text_len: Option<usize>) -> Reconciliation {
    let mut out = Vec::with_capacity(slots.len());
    let mut cursor = 0;

    for (ordinal, slot) in slots.iter().enumerate() {
        let id = slot.id().map(str::to_string);
        let recorded = slot.span().filter(|span| {
            if text_len.is_some_and(|len| span.end > len) {
                log::warn!(
                    "annotation {} span {} exceeds text length {:?}; treating as missing",
                    ordinal,
                    span,
                    text_len
                );
                return false;
            }
            if span.start < cursor {
                log::warn!(
                    "annotation {} span {} overlaps preceding span ending at {}; treating as missing",
                    ordinal,
                    span,
                    cursor
                );
                return false;
            }
            true
        });

        match recorded {
            Some(span) => {
                cursor = span.end;
                out.push(ReconciledSpan {
                    ordinal: Some(ordinal),
                    span,
                    origin: SpanOrigin::Recorded,
                    id,
                });
            }
            None => out.push(ReconciledSpan {
                ordinal: Some(ordinal),
                span: Span::empty_at(cursor),
                origin: SpanOrigin::Placeholder,
                id,
            }),
        }
    }

    Reconciliation {
        slots: out,
        implied_end: cursor,
    }
}
