//! Segment mutation
//!
//! - `mutator`: validated structural edits on a `SegmentStore`
//! - `transaction`: snapshot + apply/commit/rollback around one edit
//! - `session`: optimistic editing with ordered confirmation (no I/O)
//! - `coordinator`: drives sessions against a `SegmentBackend`

pub mod coordinator;
pub mod mutator;
pub mod session;
pub mod transaction;

pub use coordinator::Coordinator;
pub use mutator::{
    apply, bulk_operations, create_bulk, delete, merge, reset, split, update, update_bulk, Outcome, SegmentOp,
};
pub use session::{DocumentSession, Pending, Rename, Settlement, Ticket};
pub use transaction::{Snapshot, Transaction, TransactionState};
