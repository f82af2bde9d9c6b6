//! Initial segmentation for freshly uploaded documents
//!
//! Produces contiguous spans of at most `max_len` codepoints, preferring to
//! cut after a newline, then after a Tibetan shad, then after whitespace.

use crate::text::{Span, TextBuffer};

const SHAD: char = '།';

/// Split the whole buffer into contiguous spans no longer than `max_len`
pub fn naive_split(buffer: &TextBuffer, max_len: usize) -> Vec<Span> {
    let max_len = max_len.max(1);
    let total = buffer.len();
    let mut spans = Vec::with_capacity(total / max_len + 1);
    let mut start = 0;

    while start < total {
        if total - start <= max_len {
            spans.push(Span::new(start, total));
            break;
        }
        let window: Vec<char> = buffer.slice(Span::new(start, start + max_len)).chars().collect();
        let cut = break_after(&window).map_or(max_len, |offset| offset + 1);
        spans.push(Span::new(start, start + cut));
        start += cut;
    }

    spans
}

/// Offset within `window` of the best character to cut after
fn break_after(window: &[char]) -> Option<usize> {
    last_where(window, |c| c == '\n')
        .or_else(|| last_where(window, |c| c == SHAD))
        .or_else(|| last_where(window, char::is_whitespace))
}

fn last_where(window: &[char], pred: impl Fn(char) -> bool) -> Option<usize> {
    window.iter().rposition(|c| pred(*c))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(buffer: &TextBuffer, spans: &[Span]) -> Vec<String> {
        spans.iter().map(|s| buffer.slice(*s).to_string()).collect()
    }

    #[test]
    fn test_short_text_is_one_span() {
        let buffer = TextBuffer::new("short");
        assert_eq!(naive_split(&buffer, 10), vec![Span::new(0, 5)]);
    }

    #[test]
    fn test_prefers_newline() {
        let buffer = TextBuffer::new("ab\ncd ef gh");
        let spans = naive_split(&buffer, 8);
        assert_eq!(texts(&buffer, &spans), vec!["ab\n", "cd ef gh"]);
    }

    #[test]
    fn test_cuts_after_shad() {
        let buffer = TextBuffer::new("ཀཁ།གང།ཅཆ");
        let spans = naive_split(&buffer, 4);
        assert_eq!(texts(&buffer, &spans), vec!["ཀཁ།", "གང།", "ཅཆ"]);
    }

    #[test]
    fn test_hard_cut_without_breaks() {
        let buffer = TextBuffer::new("abcdefg");
        let spans = naive_split(&buffer, 3);
        assert_eq!(spans, vec![Span::new(0, 3), Span::new(3, 6), Span::new(6, 7)]);
    }

    #[test]
    fn test_empty_buffer() {
        assert!(naive_split(&TextBuffer::new(""), 5).is_empty());
    }
}
