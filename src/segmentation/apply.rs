//! Segmented display text
//!
//! Turns a buffer plus a sorted, non-overlapping span list into one line per
//! span. `relocate_lines` goes the other way, finding each displayed line back
//! in the buffer.

use crate::config::ResidualPolicy;
use crate::error::{EngineError, Result};
use crate::text::{find_disorder, Span, TextBuffer};

/// Insert a line break at every span boundary
///
/// Each span contributes `buffer.slice(span)` as one line, zero-length spans
/// included (as empty lines). Text outside every span is dropped under
/// `ResidualPolicy::Drop` and shown as lines of its own under
/// `ResidualPolicy::Preserve`. An empty span list means no segmentation was
/// recorded and returns the text unchanged.
pub fn apply_segmentation(buffer: &TextBuffer, spans: &[Span], policy: ResidualPolicy) -> Result<String> {
    Ok(segment_lines(buffer, spans, policy)?.join("\n"))
}

/// Like `apply_segmentation`, returning the lines without joining them
pub fn segment_lines(buffer: &TextBuffer, spans: &[Span], policy: ResidualPolicy) -> Result<Vec<String>> {
    if spans.is_empty() {
        return Ok(vec![buffer.as_str().to_string()]);
    }
    if let Some((first, second)) = find_disorder(spans) {
        return Err(EngineError::OverlappingSpans { first, second });
    }
    if let Some(span) = spans.iter().find(|span| !buffer.contains_span(span)) {
        return Err(EngineError::SpanOutOfBounds {
            span: *span,
            length: buffer.len(),
        });
    }

    let mut lines = Vec::with_capacity(spans.len() + 2);
    let mut covered = 0;
    for span in spans {
        if policy == ResidualPolicy::Preserve && span.start > covered {
            lines.push(buffer.slice(Span::new(covered, span.start)).to_string());
        }
        lines.push(buffer.slice(*span).to_string());
        covered = covered.max(span.end);
    }
    if policy == ResidualPolicy::Preserve && covered < buffer.len() {
        lines.push(buffer.slice(Span::new(covered, buffer.len())).to_string());
    }

    Ok(lines)
}

/// Locate each line of a segmented display text in the buffer
///
/// Lines are searched for in order, each starting where the previous one
/// ended. Empty lines resolve to a zero-length span at the current position.
/// Returns `None` when a line cannot be found.
pub fn relocate_lines(buffer: &TextBuffer, display: &str) -> Option<Vec<Span>> {
    let text = buffer.as_str();
    let mut cursor_byte = 0;
    let mut spans = Vec::new();

    for line in display.split('\n') {
        let found = if line.is_empty() {
            cursor_byte
        } else {
            cursor_byte + text[cursor_byte..].find(line)?
        };
        let end_byte = found + line.len();
        let start = buffer.byte_to_char(found)?;
        let end = buffer.byte_to_char(end_byte)?;
        spans.push(Span::new(start, end));
        cursor_byte = end_byte;
    }

    Some(spans)
}
