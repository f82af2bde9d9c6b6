//! Segment data model
//!
//! A segment is a persisted, ordered unit of a document: a span into the
//! document's buffer, the cached text of that span, and editorial metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use crate::text::{Span, TextBuffer};

/// Opaque segment identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SegmentId(String);

impl SegmentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh provisional id for a segment created locally
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SegmentId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Opaque document identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocumentId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Review status of a segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentStatus {
    #[default]
    Unchecked,
    Checked,
    Approved,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub id: SegmentId,

    /// Sequence position; always equals the position in span order
    pub(crate) index: usize,

    pub(crate) span: Span,

    /// Cached `buffer.slice(span)`
    pub(crate) text: String,

    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub author: Option<String>,

    /// Containing segment, for grouping
    #[serde(default)]
    pub parent_id: Option<SegmentId>,

    #[serde(default)]
    pub is_attached: bool,

    /// Title or author present
    #[serde(default)]
    pub(crate) is_annotated: bool,

    #[serde(default)]
    pub status: SegmentStatus,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Segment {
    /// A bare segment over `span`, text sliced from `buffer`
    pub fn new(id: SegmentId, index: usize, span: Span, buffer: &TextBuffer) -> Self {
        let now = Utc::now();
        Self {
            id,
            index,
            span,
            text: buffer.slice(span).to_string(),
            title: None,
            author: None,
            parent_id: None,
            is_attached: false,
            is_annotated: false,
            status: SegmentStatus::default(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn span(&self) -> Span {
        self.span
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_annotated(&self) -> bool {
        self.is_annotated
    }

    /// Length of the text in codepoints
    pub fn char_len(&self) -> usize {
        self.span.len()
    }

    /// Recompute `is_annotated` from title/author
    pub(crate) fn refresh_annotation(&mut self) {
        let filled = |field: &Option<String>| field.as_deref().is_some_and(|v| !v.is_empty());
        self.is_annotated = filled(&self.title) || filled(&self.author);
    }

    /// Move to a new span and refresh the cached text
    pub(crate) fn set_span(&mut self, span: Span, buffer: &TextBuffer) {
        self.span = span;
        self.text = buffer.slice(span).to_string();
    }

    pub(crate) fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Input for creating a segment
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NewSegment {
    pub span: Span,
    pub title: Option<String>,
    pub author: Option<String>,
    pub parent_id: Option<SegmentId>,
    pub is_attached: bool,
    pub status: SegmentStatus,
}

impl NewSegment {
    pub fn at(start: usize, end: usize) -> Self {
        Self {
            span: Span::new(start, end),
            ..Default::default()
        }
    }
}

/// Partial update of a segment; `None` leaves a field unchanged
///
/// `title`, `author` and `parent_id` can also be cleared: `Some(None)`, or
/// `null` on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentPatch {
    #[serde(deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub title: Option<Option<String>>,
    #[serde(deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub author: Option<Option<String>>,
    #[serde(deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<Option<SegmentId>>,
    pub is_attached: Option<bool>,
    pub status: Option<SegmentStatus>,
    pub span: Option<Span>,
}

impl SegmentPatch {
    pub fn is_empty(&self) -> bool {
        *self == SegmentPatch::default()
    }

    /// Apply metadata fields; span changes are handled by the mutator
    pub(crate) fn apply_metadata(&self, segment: &mut Segment) {
        if let Some(title) = &self.title {
            segment.title = title.clone();
        }
        if let Some(author) = &self.author {
            segment.author = author.clone();
        }
        if let Some(parent_id) = &self.parent_id {
            segment.parent_id = parent_id.clone();
        }
        if let Some(is_attached) = self.is_attached {
            segment.is_attached = is_attached;
        }
        if let Some(status) = self.status {
            segment.status = status;
        }
        segment.refresh_annotation();
    }
}

/// A field that is present maps to `Some`, even when it is `null`
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// A patch addressed to one segment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentUpdate {
    pub id: SegmentId,
    #[serde(flatten)]
    pub patch: SegmentPatch,
}

impl SegmentUpdate {
    pub fn new(id: impl Into<SegmentId>, patch: SegmentPatch) -> Self {
        Self { id: id.into(), patch }
    }
}

/// Create, update and delete in one all-or-nothing request
///
/// Applied as: delete, then update the survivors, then create.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BulkOperations {
    pub create: Vec<NewSegment>,
    pub update: Vec<SegmentUpdate>,
    pub delete: Vec<SegmentId>,
}

impl BulkOperations {
    pub fn is_empty(&self) -> bool {
        self.create.is_empty() && self.update.is_empty() && self.delete.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_segment_slices_text() {
        let buffer = TextBuffer::new("helloworld");
        let segment = Segment::new(SegmentId::new("s1"), 0, Span::new(5, 10), &buffer);
        assert_eq!(segment.text(), "world");
        assert_eq!(segment.char_len(), 5);
        assert!(!segment.is_annotated());
    }

    #[test]
    fn test_patch_updates_annotation_flag() {
        let buffer = TextBuffer::new("abc");
        let mut segment = Segment::new(SegmentId::new("s1"), 0, Span::new(0, 3), &buffer);

        SegmentPatch {
            title: Some(Some("Prajnaparamita".into())),
            ..Default::default()
        }
        .apply_metadata(&mut segment);
        assert!(segment.is_annotated());

        SegmentPatch {
            title: Some(Some(String::new())),
            ..Default::default()
        }
        .apply_metadata(&mut segment);
        assert!(!segment.is_annotated());
    }

    #[test]
    fn test_patch_null_clears_field() {
        let patch: SegmentPatch = serde_json::from_str(r#"{"title": null, "parent_id": "s0"}"#).unwrap();
        assert_eq!(patch.title, Some(None));
        assert_eq!(patch.author, None);
        assert_eq!(patch.parent_id, Some(Some(SegmentId::new("s0"))));

        let json = serde_json::to_value(&patch).unwrap();
        assert_eq!(json["title"], serde_json::Value::Null);
        assert!(json.get("author").is_none());

        let buffer = TextBuffer::new("abc");
        let mut segment = Segment::new(SegmentId::new("s1"), 0, Span::new(0, 3), &buffer);
        segment.title = Some("Old".into());
        segment.author = Some("Kept".into());
        patch.apply_metadata(&mut segment);
        assert_eq!(segment.title, None);
        assert_eq!(segment.author.as_deref(), Some("Kept"));
    }

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&SegmentStatus::Checked).unwrap(), r#""checked""#);
    }
}
