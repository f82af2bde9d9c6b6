//! Contract with the authoritative segment store
//!
//! The engine never talks to the network itself. A host supplies a
//! `SegmentBackend` (an HTTP client in the browser, an in-memory fake in
//! tests) and the coordinator drives one round trip per mutation through it.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::segments::{BulkOperations, DocumentId, Segment, SegmentId, SegmentPatch, SegmentUpdate};

/// A failed round trip. Every variant is handled the same way: roll back and
/// report.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum TransportError {
    #[error("Request failed with status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Malformed response: {0}")]
    Decode(String),

    /// The host abandoned the request
    #[error("Request aborted")]
    Aborted,
}

/// Document text and its persisted segments, as fetched
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadedDocument {
    pub content: String,
    #[serde(default)]
    pub segments: Vec<Segment>,
}

/// Both halves of a persisted split
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitResult {
    pub first: Segment,
    pub second: Segment,
}

/// Server response to a mutation, normalized to the segments it returned
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "segments", rename_all = "snake_case")]
pub enum Confirmation {
    Segments(Vec<Segment>),
    Reset,
}

impl Confirmation {
    pub fn segments(&self) -> &[Segment] {
        match self {
            Confirmation::Segments(segments) => segments,
            Confirmation::Reset => &[],
        }
    }
}

impl From<Segment> for Confirmation {
    fn from(segment: Segment) -> Self {
        Confirmation::Segments(vec![segment])
    }
}

impl From<Vec<Segment>> for Confirmation {
    fn from(segments: Vec<Segment>) -> Self {
        Confirmation::Segments(segments)
    }
}

impl From<SplitResult> for Confirmation {
    fn from(split: SplitResult) -> Self {
        Confirmation::Segments(vec![split.first, split.second])
    }
}

pub type TransportResult<T> = std::result::Result<T, TransportError>;

/// The external persistence collaborator
///
/// Implementations decide routing and encoding; the engine only relies on
/// each call either returning the persisted result or failing.
#[allow(async_fn_in_trait)]
pub trait SegmentBackend {
    async fn fetch_document(&self, document_id: &DocumentId) -> TransportResult<LoadedDocument>;

    async fn persist_segment_update(
        &self,
        document_id: &DocumentId,
        segment_id: &SegmentId,
        patch: &SegmentPatch,
    ) -> TransportResult<Segment>;

    async fn persist_bulk_segment_update(
        &self,
        document_id: &DocumentId,
        updates: &[SegmentUpdate],
    ) -> TransportResult<Vec<Segment>>;

    async fn persist_split(
        &self,
        document_id: &DocumentId,
        segment_id: &SegmentId,
        position: usize,
    ) -> TransportResult<SplitResult>;

    async fn persist_merge(&self, document_id: &DocumentId, segment_ids: &[SegmentId]) -> TransportResult<Segment>;

    async fn persist_bulk_operations(
        &self,
        document_id: &DocumentId,
        operations: &BulkOperations,
    ) -> TransportResult<Vec<Segment>>;

    async fn persist_reset(&self, document_id: &DocumentId) -> TransportResult<()>;
}
