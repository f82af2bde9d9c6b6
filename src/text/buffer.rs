//! Immutable text buffers addressed by codepoint offsets
//!
//! Segments and annotations never own text; they hold `Span`s into a
//! `TextBuffer`. The buffer is read-only to the engine. Replacing it is the
//! job of whoever owns the document content, which announces the new buffer
//! through a `BufferHub`.

use super::span::Span;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// ASCII control characters except `\n`
static CONTROL_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\x00-\x09\x0B-\x1F\x7F]").expect("static pattern"));

/// Shared, immutable text with O(1) codepoint slicing
///
/// Cloning is cheap: the text and its offset table are reference counted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextBuffer {
    text: Arc<str>,
    /// Byte offset of every codepoint boundary, `len() + 1` entries
    boundaries: Arc<[usize]>,
}

impl TextBuffer {
    pub fn new(text: impl Into<String>) -> Self {
        let text: String = text.into();
        let boundaries: Vec<usize> = text
            .char_indices()
            .map(|(byte, _)| byte)
            .chain(std::iter::once(text.len()))
            .collect();
        Self {
            text: Arc::from(text),
            boundaries: Arc::from(boundaries),
        }
    }

    /// Length in codepoints
    pub fn len(&self) -> usize {
        self.boundaries.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// The full-buffer span `[0, len)`
    pub fn full_span(&self) -> Span {
        Span::new(0, self.len())
    }

    pub fn contains_span(&self, span: &Span) -> bool {
        span.end <= self.len()
    }

    /// Slice the text covered by `span`
    ///
    /// # Panics
    ///
    /// Panics when `span.end` exceeds the buffer. Spans handed to this method
    /// have already been validated against the buffer; reaching the panic
    /// means a reconciliation or mutation bug.
    pub fn slice(&self, span: Span) -> &str {
        match self.try_slice(span) {
            Some(text) => text,
            None => panic!(
                "RangeError: span {} exceeds buffer of {} codepoints",
                span,
                self.len()
            ),
        }
    }

    /// Slice the text covered by `span`, or `None` if it runs past the end
    pub fn try_slice(&self, span: Span) -> Option<&str> {
        if span.end > self.len() {
            return None;
        }
        let from = self.boundaries[span.start];
        let to = self.boundaries[span.end];
        Some(&self.text[from..to])
    }

    /// Codepoint offset of a byte position, if it falls on a boundary
    pub fn byte_to_char(&self, byte: usize) -> Option<usize> {
        self.boundaries.binary_search(&byte).ok()
    }

    /// Convert a codepoint offset to UTF-16 code units (browser string offsets)
    pub fn char_to_utf16(&self, offset: usize) -> Option<usize> {
        let span = Span::try_new(0, offset).ok()?;
        self.try_slice(span)
            .map(|prefix| prefix.chars().map(char::len_utf16).sum())
    }

    /// Convert a UTF-16 code unit offset to a codepoint offset
    ///
    /// Offsets landing inside a surrogate pair are rejected.
    pub fn utf16_to_char(&self, offset: usize) -> Option<usize> {
        let mut units = 0;
        for (index, ch) in self.text.chars().enumerate() {
            if units == offset {
                return Some(index);
            }
            if units > offset {
                return None;
            }
            units += ch.len_utf16();
        }
        (units == offset).then(|| self.len())
    }
}

impl Default for TextBuffer {
    fn default() -> Self {
        Self::new(String::new())
    }
}

impl From<&str> for TextBuffer {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl From<String> for TextBuffer {
    fn from(text: String) -> Self {
        Self::new(text)
    }
}

impl Serialize for TextBuffer {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.text)
    }
}

impl<'de> Deserialize<'de> for TextBuffer {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(TextBuffer::new)
    }
}

/// Remove ASCII control characters other than newline from uploaded text
pub fn sanitize_upload(text: &str) -> String {
    CONTROL_CHARS.replace_all(text, "").into_owned()
}

/// Handle returned by `BufferHub::subscribe`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Box<dyn FnMut(&TextBuffer) + Send>;

/// Owner of a document's current buffer, notifying subscribers on replacement
///
/// Content-edit flows outside the engine call `replace`; the engine learns
/// about the new text through its subscription instead of polling.
pub struct BufferHub {
    current: TextBuffer,
    listeners: Vec<(SubscriptionId, Listener)>,
    next_id: u64,
}

impl BufferHub {
    pub fn new(buffer: TextBuffer) -> Self {
        Self {
            current: buffer,
            listeners: Vec::new(),
            next_id: 0,
        }
    }

    pub fn current(&self) -> &TextBuffer {
        &self.current
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&TextBuffer) + Send + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(listener_id, _)| *listener_id != id);
        self.listeners.len() != before
    }

    /// Install new content and notify every subscriber
    pub fn replace(&mut self, buffer: TextBuffer) {
        log::debug!(
            "buffer replaced: {} -> {} codepoints, {} subscriber(s)",
            self.current.len(),
            buffer.len(),
            self.listeners.len()
        );
        self.current = buffer;
        for (_, listener) in &mut self.listeners {
            listener(&self.current);
        }
    }
}

impl std::fmt::Debug for BufferHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferHub")
            .field("current_len", &self.current.len())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
