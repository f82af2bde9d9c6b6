//! Engine settings
//!
//! Passed explicitly to the functions that need them; the browser layer
//! deserializes them from a plain object with every field optional.

use serde::{Deserialize, Serialize};

/// Default segment size for the initial upload split, in codepoints
pub const DEFAULT_MAX_SEGMENT_LEN: usize = 1990;

/// Settings for display reconstruction and upload segmentation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// What to do with text outside every segmentation span
    pub residual_policy: ResidualPolicy,

    /// Separator between target segments aligned to one source line
    pub target_join: String,

    /// Upper bound for segments produced by `naive_split`
    pub max_segment_len: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            residual_policy: ResidualPolicy::Drop,
            target_join: " ".to_string(),
            max_segment_len: DEFAULT_MAX_SEGMENT_LEN,
        }
    }
}

/// Handling of text not covered by any segmentation span
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResidualPolicy {
    /// Segmentation spans are authoritative; uncovered text is not displayed
    #[default]
    Drop,
    /// Uncovered leading/trailing text becomes its own line
    Preserve,
}
