//! Optimistic editing of one document
//!
//! `DocumentSession` does no I/O. `begin` applies an edit locally and hands
//! back the request to persist; the host performs the round trip and reports
//! the result through `settle`. Results are processed strictly in the order
//! the edits were begun, whatever order they arrive in:
//!
//! - a confirmation commits the edit and swaps provisional ids for the ones
//!   the server assigned
//! - a failure restores the store to the state before that edit and cancels
//!   every edit begun after it
//! - results for cancelled or already settled tickets are ignored

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;

use super::mutator::{Outcome, SegmentOp};
use super::transaction::Transaction;
use crate::backend::{Confirmation, TransportError, TransportResult};
use crate::config::ResidualPolicy;
use crate::error::Result;
use crate::segments::{Progress, Segment, SegmentId, SegmentStore};
use crate::text::TextBuffer;

/// Handle for one in-flight edit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ticket(u64);

impl Ticket {
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl From<u64> for Ticket {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A locally applied edit awaiting its round trip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pending {
    pub ticket: Ticket,
    pub outcome: Outcome,
    /// What to send to the authoritative store
    pub request: SegmentOp,
}

/// Provisional id replaced by a server-assigned one
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rename {
    pub from: SegmentId,
    pub to: SegmentId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Settlement {
    Confirmed {
        ticket: Ticket,
        renamed: Vec<Rename>,
    },
    RolledBack {
        ticket: Ticket,
        error: TransportError,
        cancelled: Vec<Ticket>,
    },
    /// Arrived before an earlier edit settled; held until it does
    Buffered { ticket: Ticket },
    Ignored { ticket: Ticket },
}

#[derive(Debug)]
struct InFlight {
    ticket: Ticket,
    transaction: Transaction,
    result: Option<TransportResult<Confirmation>>,
}

#[derive(Debug)]
pub struct DocumentSession {
    store: SegmentStore,
    in_flight: VecDeque<InFlight>,
    next_ticket: u64,
}

impl DocumentSession {
    pub fn new(store: SegmentStore) -> Self {
        Self {
            store,
            in_flight: VecDeque::new(),
            next_ticket: 1,
        }
    }

    /// The locally visible state, including unconfirmed edits
    pub fn store(&self) -> &SegmentStore {
        &self.store
    }

    pub fn segments(&self) -> &[Segment] {
        self.store.segments()
    }

    pub fn has_pending(&self) -> bool {
        !self.in_flight.is_empty()
    }

    pub fn pending_tickets(&self) -> Vec<Ticket> {
        self.in_flight.iter().map(|f| f.ticket).collect()
    }

    /// Current request for a pending edit, with ids confirmed since `begin` substituted
    pub fn request(&self, ticket: Ticket) -> Option<&SegmentOp> {
        self.in_flight
            .iter()
            .find(|f| f.ticket == ticket)
            .map(|f| f.transaction.op())
    }

    pub fn progress(&self) -> Progress {
        self.store.progress()
    }

    pub fn display_text(&self, policy: ResidualPolicy) -> Result<String> {
        self.store.display_text(policy)
    }

    /// Apply `op` optimistically
    ///
    /// Validation errors are returned before anything changes.
    pub fn begin(&mut self, op: SegmentOp) -> Result<Pending> {
        let transaction = Transaction::apply(&mut self.store, op)?;
        let ticket = Ticket(self.next_ticket);
        self.next_ticket += 1;

        let pending = Pending {
            ticket,
            outcome: transaction.outcome().clone(),
            request: transaction.op().clone(),
        };
        log::debug!(
            "{} begun {} on {} ({} in flight)",
            ticket,
            pending.request.name(),
            self.store.document_id(),
            self.in_flight.len() + 1
        );
        self.in_flight.push_back(InFlight {
            ticket,
            transaction,
            result: None,
        });
        Ok(pending)
    }

    /// Report the result of a round trip
    pub fn settle(&mut self, ticket: Ticket, result: TransportResult<Confirmation>) -> Vec<Settlement> {
        let Some(entry) = self.in_flight.iter_mut().find(|f| f.ticket == ticket) else {
            log::debug!("ignoring result for {}: not in flight", ticket);
            return vec![Settlement::Ignored { ticket }];
        };
        if entry.result.is_some() {
            log::warn!("ignoring duplicate result for {}", ticket);
            return vec![Settlement::Ignored { ticket }];
        }
        entry.result = Some(result);

        let mut settled = Vec::new();
        while self.in_flight.front().is_some_and(|f| f.result.is_some()) {
            let Some(InFlight {
                ticket: current,
                transaction,
                result: Some(result),
            }) = self.in_flight.pop_front()
            else {
                break;
            };

            match result {
                Ok(confirmation) => {
                    let renamed = self.confirm(transaction, &confirmation);
                    settled.push(Settlement::Confirmed {
                        ticket: current,
                        renamed,
                    });
                }
                Err(error) => {
                    settled.push(self.roll_back(current, transaction, error));
                }
            }
        }

        if !settled.iter().any(|s| settlement_ticket(s) == ticket) {
            settled.push(Settlement::Buffered { ticket });
        }
        settled
    }

    /// Swap in a new text buffer, re-slicing every segment and snapshot
    ///
    /// Fails without changes if any span would fall outside the new buffer.
    pub fn rebind_buffer(&mut self, buffer: TextBuffer) -> Result<()> {
        for entry in &self.in_flight {
            entry.transaction.snapshot().check_rebind(&buffer)?;
        }
        self.store.rebind_buffer(buffer.clone())?;
        for entry in &mut self.in_flight {
            entry.transaction.snapshot_mut().rebind(&buffer);
        }
        Ok(())
    }

    fn confirm(&mut self, transaction: Transaction, confirmation: &Confirmation) -> Vec<Rename> {
        let renames = self.match_created(&transaction, confirmation.segments());
        if !renames.is_empty() {
            self.store.remap_ids(&renames);
            for entry in &mut self.in_flight {
                entry.transaction.remap_ids(&renames);
            }
        }

        // Server metadata is only authoritative when no later edit has
        // touched the local state.
        if self.in_flight.is_empty() {
            self.adopt(confirmation.segments());
        }

        log::debug!(
            "confirmed {} on {} ({} ids assigned)",
            transaction.op().name(),
            self.store.document_id(),
            renames.len()
        );
        transaction.commit();

        renames
            .into_iter()
            .map(|(from, to)| Rename { from, to })
            .collect()
    }

    /// Pair provisional ids with the returned segments the client has never seen
    fn match_created(&self, transaction: &Transaction, returned: &[Segment]) -> HashMap<SegmentId, SegmentId> {
        let created = &transaction.outcome().created;
        if created.is_empty() {
            return HashMap::new();
        }

        let known: HashSet<&SegmentId> = transaction
            .snapshot()
            .segments()
            .iter()
            .map(|s| &s.id)
            .chain(transaction.outcome().updated.iter())
            .collect();
        let fresh = returned
            .iter()
            .filter(|s| !known.contains(&s.id) && !created.contains(&s.id));

        if returned.iter().filter(|s| !known.contains(&s.id)).count() < created.len() {
            log::warn!(
                "server returned fewer new segments than the {} created locally",
                created.len()
            );
        }
        created
            .iter()
            .cloned()
            .zip(fresh.map(|s| s.id.clone()))
            .collect()
    }

    fn adopt(&mut self, returned: &[Segment]) {
        let mut segments = self.store.segments().to_vec();
        let mut changed = false;
        for server in returned {
            if let Some(local) = segments.iter_mut().find(|s| s.id == server.id) {
                local.title = server.title.clone();
                local.author = server.author.clone();
                local.parent_id = server.parent_id.clone();
                local.is_attached = server.is_attached;
                local.status = server.status;
                local.created_at = server.created_at;
                local.updated_at = server.updated_at;
                local.refresh_annotation();
                changed = true;
            }
        }
        if changed {
            self.store.replace_segments(segments);
        }
    }

    fn roll_back(&mut self, ticket: Ticket, transaction: Transaction, error: TransportError) -> Settlement {
        let cancelled: Vec<Ticket> = self.in_flight.drain(..).map(|f| f.ticket).collect();
        let op = transaction.rollback(&mut self.store);
        log::warn!(
            "{} {} failed on {}: {} ({} later edits cancelled)",
            ticket,
            op.name(),
            self.store.document_id(),
            error,
            cancelled.len()
        );
        Settlement::RolledBack {
            ticket,
            error,
            cancelled,
        }
    }
}

fn settlement_ticket(settlement: &Settlement) -> Ticket {
    match settlement {
        Settlement::Confirmed { ticket, .. }
        | Settlement::RolledBack { ticket, .. }
        | Settlement::Buffered { ticket }
        | Settlement::Ignored { ticket } => *ticket,
    }
}
