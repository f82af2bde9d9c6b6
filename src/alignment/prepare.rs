//! Display preparation for a source/target text pair
//!
//! Uses the alignment annotation when both of its lists are non-empty;
//! otherwise falls back to each side's own segmentation, and to the raw text
//! when a side has none.

use serde::{Deserialize, Serialize};

use super::reconstruct::{reconstruct, AlignedLines, AlignmentPair};
use crate::annotation::{order_slots, reconcile, AlignmentData, AnnotationSlot};
use crate::config::EngineConfig;
use crate::error::Result;
use crate::segmentation::segment_lines;
use crate::text::TextBuffer;

/// Everything loaded for one source/target pair
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PreparedAlignment {
    pub source_text: String,
    pub target_text: String,
    #[serde(default)]
    pub annotation: Option<AlignmentData>,
    #[serde(default)]
    pub source_segmentation: Option<Vec<AnnotationSlot>>,
    #[serde(default)]
    pub target_segmentation: Option<Vec<AnnotationSlot>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlignedDisplay {
    pub has_alignment: bool,
    pub source_lines: Vec<String>,
    pub target_lines: Vec<String>,
    pub pairs: Vec<AlignmentPair>,
}

impl AlignedDisplay {
    pub fn source_text(&self) -> String {
        self.source_lines.join("\n")
    }

    pub fn target_text(&self) -> String {
        self.target_lines.join("\n")
    }
}

/// Build the editor's display text for a text pair
pub fn prepare_view(input: &PreparedAlignment, config: &EngineConfig) -> Result<AlignedDisplay> {
    let source = TextBuffer::new(input.source_text.as_str());
    let target = TextBuffer::new(input.target_text.as_str());

    if let Some(data) = input.annotation.as_ref().filter(|data| data.is_usable()) {
        let target_slots = order_slots(data.target_annotation.clone());
        let alignment_slots = order_slots(data.alignment_annotation.clone());
        let AlignedLines {
            source_lines,
            target_lines,
            pairs,
            ..
        } = reconstruct(&target_slots, &alignment_slots, &source, &target, config);

        return Ok(AlignedDisplay {
            has_alignment: true,
            source_lines,
            target_lines,
            pairs,
        });
    }

    Ok(AlignedDisplay {
        has_alignment: false,
        source_lines: segmented_side(&source, input.source_segmentation.as_deref(), config)?,
        target_lines: segmented_side(&target, input.target_segmentation.as_deref(), config)?,
        pairs: Vec::new(),
    })
}

fn segmented_side(
    buffer: &TextBuffer,
    segmentation: Option<&[AnnotationSlot]>,
    config: &EngineConfig,
) -> Result<Vec<String>> {
    let slots = match segmentation {
        Some(slots) if !slots.is_empty() => order_slots(slots.to_vec()),
        _ => return Ok(vec![buffer.as_str().to_string()]),
    };
    let spans = reconcile(&slots, Some(buffer.len())).spans();
    segment_lines(buffer, &spans, config.residual_policy)
}
