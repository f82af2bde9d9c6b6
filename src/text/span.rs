//! Half-open offset ranges into a text buffer
//!
//! Offsets are codepoint positions (see `TextBuffer`).

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::EngineError;

/// A range of text from start (inclusive) to end (exclusive)
///
/// `end >= start` always holds; a zero-length span is a legitimate empty unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "RawSpan")]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

#[derive(Deserialize)]
struct RawSpan {
    start: usize,
    end: usize,
}

impl TryFrom<RawSpan> for Span {
    type Error = EngineError;

    fn try_from(raw: RawSpan) -> Result<Self, Self::Error> {
        Span::try_new(raw.start, raw.end)
    }
}

impl Span {
    /// Create a span, panicking if `end < start`
    ///
    /// Use `try_new` for spans coming from outside the crate.
    pub fn new(start: usize, end: usize) -> Self {
        assert!(end >= start, "span end {} precedes start {}", end, start);
        Self { start, end }
    }

    /// Create a span, rejecting `end < start`
    pub fn try_new(start: usize, end: usize) -> Result<Self, EngineError> {
        if end < start {
            return Err(EngineError::InvalidSpan { start, end });
        }
        Ok(Self { start, end })
    }

    /// A zero-length span at `offset`
    pub fn empty_at(offset: usize) -> Self {
        Self { start: offset, end: offset }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Smallest span covering both
    pub fn cover(&self, other: &Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// Split at an offset relative to `start`, returning `[start, start+at)` and `[start+at, end)`
    pub fn split_at(&self, at: usize) -> (Span, Span) {
        let mid = self.start + at;
        debug_assert!(mid <= self.end);
        (Span::new(self.start, mid), Span::new(mid, self.end))
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// Check that spans are sorted by start and pairwise non-overlapping
///
/// Returns the first offending pair.
pub fn find_disorder(spans: &[Span]) -> Option<(Span, Span)> {
    spans
        .windows(2)
        .find(|w| w[1].start < w[0].end)
        .map(|w| (w[0], w[1]))
}
