//! Persisted segments of a document and the store that keeps them ordered

pub mod model;
pub mod store;

pub use model::{
    BulkOperations, DocumentId, NewSegment, Segment, SegmentId, SegmentPatch, SegmentStatus, SegmentUpdate,
};
pub use store::{Progress, SegmentStore};
