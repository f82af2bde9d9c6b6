//! Layer 0: text buffers and spans
//!
//! Pure offset arithmetic with no knowledge of segments or alignment.
//!
//! ## Modules
//!
//! - `buffer`: immutable codepoint-indexed text, upload sanitation, change notification
//! - `span`: half-open `[start, end)` ranges

pub mod buffer;
pub mod span;

pub use buffer::{sanitize_upload, BufferHub, SubscriptionId, TextBuffer};
pub use span::{find_disorder, Span};
