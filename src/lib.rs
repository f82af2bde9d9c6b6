//! Segmentation and alignment engine for the text annotation editor
//!
//! Reconciles sparse annotation lists into dense spans, rebuilds bilingual
//! aligned views, and applies segment edits optimistically against an
//! authoritative store. Compiled to WASM for the browser editor; the same
//! crate is usable natively through `Coordinator` and a `SegmentBackend`.

pub mod alignment;
pub mod annotation;
pub mod api;
pub mod backend;
pub mod config;
pub mod error;
pub mod mutation;
pub mod segmentation;
pub mod segments;
pub mod text;

// Re-export commonly used types
pub use alignment::{prepare_view, reconstruct, AlignedDisplay, AlignedLines, PreparedAlignment};
pub use annotation::{reconcile, AlignmentData, Annotation, AnnotationSlot, Reconciliation, SegmentRef};
pub use backend::{Confirmation, LoadedDocument, SegmentBackend, SplitResult, TransportError};
pub use config::{EngineConfig, ResidualPolicy};
pub use error::{EngineError, Result};
pub use mutation::{Coordinator, DocumentSession, Outcome, SegmentOp, Settlement, Snapshot, Ticket, Transaction};
pub use segmentation::{apply_segmentation, naive_split, relocate_lines};
pub use segments::{
    BulkOperations, DocumentId, NewSegment, Progress, Segment, SegmentId, SegmentPatch, SegmentStatus, SegmentStore,
    SegmentUpdate,
};
pub use text::{BufferHub, Span, TextBuffer};

use wasm_bindgen::prelude::*;

// This is like the `main` function, but for WASM modules.
#[wasm_bindgen(start)]
pub fn main() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();

    #[cfg(feature = "console_log")]
    if console_log::init_with_level(log::Level::Debug).is_err() {
        log::warn!("a logger was already installed");
    }

    log::info!("Aligner WASM module initialized");
}
