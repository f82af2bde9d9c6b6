//! `SegmentEditor`: optimistic segment editing for one document
//!
//! Each `begin*` call applies the edit locally and returns
//! `{ticket, outcome, request}`. JavaScript sends `request` to the server and
//! reports back with `settle(ticket, segments)` or `fail(ticket, message)`.
//! Both return the list of settlements the call produced (a response can
//! release earlier-buffered ones).

use wasm_bindgen::prelude::*;

use super::helpers::{deserialize, deserialize_or_default, engine_error, serialize, validation_error};
use crate::backend::{Confirmation, TransportError};
use crate::config::EngineConfig;
use crate::mutation::{DocumentSession, SegmentOp, Ticket};
use crate::segments::{
    BulkOperations, DocumentId, NewSegment, Segment, SegmentId, SegmentPatch, SegmentStore, SegmentUpdate,
};
use crate::text::TextBuffer;

#[wasm_bindgen]
pub struct SegmentEditor {
    session: DocumentSession,
    config: EngineConfig,
}

#[wasm_bindgen]
impl SegmentEditor {
    /// Load a document from its content and persisted segments
    #[wasm_bindgen(constructor)]
    pub fn new(document_id: &str, content: &str, segments: JsValue, config: JsValue) -> Result<SegmentEditor, JsValue> {
        let segments: Vec<Segment> = deserialize_or_default(segments, "Invalid segments")?;
        let config: EngineConfig = deserialize_or_default(config, "Invalid config")?;
        let store = SegmentStore::from_segments(DocumentId::new(document_id), TextBuffer::new(content), segments)
            .map_err(engine_error)?;

        log::info!("SegmentEditor ready for {} ({} segments)", document_id, store.len());
        Ok(SegmentEditor {
            session: DocumentSession::new(store),
            config,
        })
    }

    #[wasm_bindgen(js_name = beginSplit)]
    pub fn begin_split(&mut self, segment_id: &str, position: usize) -> Result<JsValue, JsValue> {
        self.begin(SegmentOp::Split {
            segment_id: SegmentId::new(segment_id),
            position,
        })
    }

    #[wasm_bindgen(js_name = beginMerge)]
    pub fn begin_merge(&mut self, segment_ids: JsValue) -> Result<JsValue, JsValue> {
        let segment_ids: Vec<SegmentId> = deserialize(segment_ids, "Invalid segment ids")?;
        self.begin(SegmentOp::Merge { segment_ids })
    }

    #[wasm_bindgen(js_name = beginCreateBulk)]
    pub fn begin_create_bulk(&mut self, segments: JsValue) -> Result<JsValue, JsValue> {
        let segments: Vec<NewSegment> = deserialize(segments, "Invalid new segments")?;
        self.begin(SegmentOp::CreateBulk { segments })
    }

    #[wasm_bindgen(js_name = beginBulkOperations)]
    pub fn begin_bulk_operations(&mut self, operations: JsValue) -> Result<JsValue, JsValue> {
        let operations: BulkOperations = deserialize(operations, "Invalid bulk operations")?;
        if operations.is_empty() {
            return Err(validation_error("Bulk operations request is empty"));
        }
        self.begin(SegmentOp::BulkOperations { operations })
    }

    #[wasm_bindgen(js_name = beginUpdate)]
    pub fn begin_update(&mut self, segment_id: &str, patch: JsValue) -> Result<JsValue, JsValue> {
        let patch: SegmentPatch = deserialize(patch, "Invalid segment patch")?;
        self.begin(SegmentOp::Update {
            segment_id: SegmentId::new(segment_id),
            patch,
        })
    }

    #[wasm_bindgen(js_name = beginUpdateBulk)]
    pub fn begin_update_bulk(&mut self, updates: JsValue) -> Result<JsValue, JsValue> {
        let updates: Vec<SegmentUpdate> = deserialize(updates, "Invalid segment updates")?;
        self.begin(SegmentOp::UpdateBulk { updates })
    }

    #[wasm_bindgen(js_name = beginDelete)]
    pub fn begin_delete(&mut self, segment_id: &str) -> Result<JsValue, JsValue> {
        self.begin(SegmentOp::Delete {
            segment_id: SegmentId::new(segment_id),
        })
    }

    #[wasm_bindgen(js_name = beginReset)]
    pub fn begin_reset(&mut self) -> Result<JsValue, JsValue> {
        self.begin(SegmentOp::Reset)
    }

    /// Report a successful round trip; `segments` is whatever the server
    /// returned (a segment, an array of segments, or nothing)
    pub fn settle(&mut self, ticket: u32, segments: JsValue) -> Result<JsValue, JsValue> {
        let confirmation = if segments.is_undefined() || segments.is_null() {
            Confirmation::Reset
        } else if js_sys::Array::is_array(&segments) {
            Confirmation::Segments(deserialize(segments, "Invalid server segments")?)
        } else {
            Confirmation::from(deserialize::<Segment>(segments, "Invalid server segment")?)
        };
        let settled = self.session.settle(Ticket::from(u64::from(ticket)), Ok(confirmation));
        serialize(&settled, "Failed to serialize settlements")
    }

    /// Report a failed round trip; the edit and every later one are undone
    pub fn fail(&mut self, ticket: u32, message: &str, status: Option<u16>) -> Result<JsValue, JsValue> {
        let error = match status {
            Some(status) => TransportError::Status {
                status,
                message: message.to_string(),
            },
            None => TransportError::Network(message.to_string()),
        };
        let settled = self.session.settle(Ticket::from(u64::from(ticket)), Err(error));
        serialize(&settled, "Failed to serialize settlements")
    }

    /// Current request for a pending edit, with confirmed ids substituted
    pub fn request(&self, ticket: u32) -> Result<JsValue, JsValue> {
        serialize(
            &self.session.request(Ticket::from(u64::from(ticket))),
            "Failed to serialize request",
        )
    }

    #[wasm_bindgen(js_name = pendingTickets)]
    pub fn pending_tickets(&self) -> Vec<u32> {
        self.session
            .pending_tickets()
            .into_iter()
            .filter_map(|ticket| u32::try_from(ticket.value()).ok())
            .collect()
    }

    pub fn segments(&self) -> Result<JsValue, JsValue> {
        serialize(&self.session.segments(), "Failed to serialize segments")
    }

    pub fn progress(&self) -> Result<JsValue, JsValue> {
        serialize(&self.session.progress(), "Failed to serialize progress")
    }

    /// Segment texts joined by newlines
    #[wasm_bindgen(js_name = displayText)]
    pub fn display_text(&self) -> Result<String, JsValue> {
        self.session
            .display_text(self.config.residual_policy)
            .map_err(engine_error)
    }

    /// Follow an upstream content edit
    #[wasm_bindgen(js_name = rebindBuffer)]
    pub fn rebind_buffer(&mut self, content: &str) -> Result<(), JsValue> {
        self.session
            .rebind_buffer(TextBuffer::new(content))
            .map_err(engine_error)
    }

    /// Convert a textarea (UTF-16) offset into a codepoint offset
    #[wasm_bindgen(js_name = utf16ToChar)]
    pub fn utf16_to_char(&self, offset: usize) -> Option<usize> {
        self.session.store().buffer().utf16_to_char(offset)
    }

    #[wasm_bindgen(js_name = charToUtf16)]
    pub fn char_to_utf16(&self, offset: usize) -> Option<usize> {
        self.session.store().buffer().char_to_utf16(offset)
    }
}

impl SegmentEditor {
    fn begin(&mut self, op: SegmentOp) -> Result<JsValue, JsValue> {
        let pending = self.session.begin(op).map_err(engine_error)?;
        serialize(&pending, "Failed to serialize pending edit")
    }
}
