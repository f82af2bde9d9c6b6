//! Stateless display functions: segmentation, reconciliation, alignment

use serde::Serialize;
use wasm_bindgen::prelude::*;

use super::helpers::{deserialize, deserialize_or_default, engine_error, serialize};
use crate::alignment::{prepare_view, reconstruct, PreparedAlignment};
use crate::annotation::{order_slots, reconcile, AnnotationSlot, ReconciledSpan};
use crate::config::EngineConfig;
use crate::segmentation::{apply_segmentation, naive_split};
use crate::text::{sanitize_upload, Span, TextBuffer};

#[derive(Serialize)]
struct ReconcileResult {
    by_ordinal: Vec<ReconciledSpan>,
    covering: Vec<ReconciledSpan>,
    implied_end: usize,
}

/// Insert newlines at every span boundary of `text`
///
/// `spans` is an array of `{start, end}` codepoint offsets; `config` is an
/// optional `EngineConfig` object.
#[wasm_bindgen(js_name = applySegmentation)]
pub fn apply_segmentation_js(text: &str, spans: JsValue, config: JsValue) -> Result<String, JsValue> {
    let spans: Vec<Span> = deserialize(spans, "Invalid spans")?;
    let config: EngineConfig = deserialize_or_default(config, "Invalid config")?;
    log::debug!("applySegmentation: {} spans", spans.len());

    apply_segmentation(&TextBuffer::new(text), &spans, config.residual_policy).map_err(engine_error)
}

/// Reconcile a sparse annotation list (entries may be `null`)
///
/// Returns `{by_ordinal, covering, implied_end}`.
#[wasm_bindgen(js_name = reconcileAnnotations)]
pub fn reconcile_annotations(entries: JsValue, text_length: Option<usize>) -> Result<JsValue, JsValue> {
    let entries: Vec<AnnotationSlot> = deserialize(entries, "Invalid annotation list")?;
    let reconciled = reconcile(&order_slots(entries), text_length);

    let result = ReconcileResult {
        covering: reconciled.covering().map_err(engine_error)?,
        by_ordinal: reconciled.by_ordinal().to_vec(),
        implied_end: reconciled.implied_end(),
    };
    serialize(&result, "Failed to serialize reconciliation")
}

/// Rebuild aligned source/target lines from a target segmentation and an
/// alignment annotation
#[wasm_bindgen(js_name = reconstructAlignment)]
pub fn reconstruct_alignment(
    target_segmentation: JsValue,
    alignment: JsValue,
    source_text: &str,
    target_text: &str,
    config: JsValue,
) -> Result<JsValue, JsValue> {
    let target: Vec<AnnotationSlot> = deserialize(target_segmentation, "Invalid target segmentation")?;
    let alignment: Vec<AnnotationSlot> = deserialize(alignment, "Invalid alignment annotation")?;
    let config: EngineConfig = deserialize_or_default(config, "Invalid config")?;

    let lines = reconstruct(
        &order_slots(target),
        &order_slots(alignment),
        &TextBuffer::new(source_text),
        &TextBuffer::new(target_text),
        &config,
    );
    serialize(&lines, "Failed to serialize aligned lines")
}

/// Build the editor's view of a source/target pair
///
/// Uses the alignment annotation when it is complete, otherwise each side's
/// segmentation, otherwise the raw text.
#[wasm_bindgen(js_name = prepareAlignmentView)]
pub fn prepare_alignment_view(input: JsValue, config: JsValue) -> Result<JsValue, JsValue> {
    let input: PreparedAlignment = deserialize(input, "Invalid alignment input")?;
    let config: EngineConfig = deserialize_or_default(config, "Invalid config")?;

    let view = prepare_view(&input, &config).map_err(engine_error)?;
    log::info!(
        "prepareAlignmentView: {} source / {} target lines (aligned: {})",
        view.source_lines.len(),
        view.target_lines.len(),
        view.has_alignment
    );
    serialize(&view, "Failed to serialize alignment view")
}

/// Initial segmentation of uploaded text into spans of at most `max_len`
/// codepoints
#[wasm_bindgen(js_name = naiveSplit)]
pub fn naive_split_js(text: &str, max_len: Option<usize>) -> Result<JsValue, JsValue> {
    let buffer = TextBuffer::new(text);
    let spans = naive_split(&buffer, max_len.unwrap_or(crate::config::DEFAULT_MAX_SEGMENT_LEN));
    serialize(&spans, "Failed to serialize spans")
}

/// Strip control characters other than newline from uploaded text
#[wasm_bindgen(js_name = sanitizeUpload)]
pub fn sanitize_upload_js(text: &str) -> String {
    sanitize_upload(text)
}
