//! Owner of every loaded document
//!
//! Each document gets its own session and its own FIFO gate. A mutation holds
//! the gate for begin, round trip and settle, so edits to one document reach
//! the backend in the order they were requested while other documents proceed
//! independently.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::mutator::{Outcome, SegmentOp};
use super::session::{DocumentSession, Settlement, Ticket};
use crate::backend::{Confirmation, SegmentBackend, TransportError, TransportResult};
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::segments::{
    BulkOperations, DocumentId, NewSegment, Progress, Segment, SegmentId, SegmentPatch, SegmentStore, SegmentUpdate,
};
use crate::text::{BufferHub, SubscriptionId, TextBuffer};

struct DocumentHandle {
    session: Mutex<DocumentSession>,
    gate: tokio::sync::Mutex<()>,
}

type Documents = Arc<Mutex<HashMap<DocumentId, Arc<DocumentHandle>>>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct Coordinator<B> {
    backend: B,
    config: EngineConfig,
    documents: Documents,
}

impl<B: SegmentBackend> Coordinator<B> {
    pub fn new(backend: B) -> Self {
        Self::with_config(backend, EngineConfig::default())
    }

    pub fn with_config(backend: B, config: EngineConfig) -> Self {
        Self {
            backend,
            config,
            documents: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Fetch a document and its segments, replacing any loaded copy
    pub async fn load(&self, document_id: &DocumentId) -> Result<()> {
        let loaded = self.backend.fetch_document(document_id).await?;
        let buffer = TextBuffer::new(loaded.content);
        let store = SegmentStore::from_segments(document_id.clone(), buffer, loaded.segments)?;
        log::info!("loaded {} with {} segments", document_id, store.len());

        let handle = Arc::new(DocumentHandle {
            session: Mutex::new(DocumentSession::new(store)),
            gate: tokio::sync::Mutex::new(()),
        });
        lock(&self.documents).insert(document_id.clone(), handle);
        Ok(())
    }

    pub fn is_loaded(&self, document_id: &DocumentId) -> bool {
        lock(&self.documents).contains_key(document_id)
    }

    pub fn unload(&self, document_id: &DocumentId) -> bool {
        lock(&self.documents).remove(document_id).is_some()
    }

    /// Read the locally visible store
    pub fn with_store<R>(&self, document_id: &DocumentId, read: impl FnOnce(&SegmentStore) -> R) -> Result<R> {
        let handle = self.handle(document_id)?;
        let session = lock(&handle.session);
        Ok(read(session.store()))
    }

    pub fn segments(&self, document_id: &DocumentId) -> Result<Vec<Segment>> {
        self.with_store(document_id, |store| store.segments().to_vec())
    }

    pub fn progress(&self, document_id: &DocumentId) -> Result<Progress> {
        self.with_store(document_id, SegmentStore::progress)
    }

    pub fn display_text(&self, document_id: &DocumentId) -> Result<String> {
        let policy = self.config.residual_policy;
        self.with_store(document_id, |store| store.display_text(policy))?
    }

    pub async fn split(&self, document_id: &DocumentId, segment_id: &SegmentId, position: usize) -> Result<Outcome> {
        self.execute(
            document_id,
            SegmentOp::Split {
                segment_id: segment_id.clone(),
                position,
            },
        )
        .await
    }

    pub async fn merge(&self, document_id: &DocumentId, segment_ids: &[SegmentId]) -> Result<Outcome> {
        self.execute(
            document_id,
            SegmentOp::Merge {
                segment_ids: segment_ids.to_vec(),
            },
        )
        .await
    }

    pub async fn create_bulk(&self, document_id: &DocumentId, segments: Vec<NewSegment>) -> Result<Outcome> {
        self.execute(document_id, SegmentOp::CreateBulk { segments }).await
    }

    pub async fn bulk_operations(&self, document_id: &DocumentId, operations: BulkOperations) -> Result<Outcome> {
        self.execute(document_id, SegmentOp::BulkOperations { operations }).await
    }

    pub async fn update(&self, document_id: &DocumentId, segment_id: &SegmentId, patch: SegmentPatch) -> Result<Outcome> {
        self.execute(
            document_id,
            SegmentOp::Update {
                segment_id: segment_id.clone(),
                patch,
            },
        )
        .await
    }

    pub async fn update_bulk(&self, document_id: &DocumentId, updates: Vec<SegmentUpdate>) -> Result<Outcome> {
        self.execute(document_id, SegmentOp::UpdateBulk { updates }).await
    }

    pub async fn delete(&self, document_id: &DocumentId, segment_id: &SegmentId) -> Result<Outcome> {
        self.execute(
            document_id,
            SegmentOp::Delete {
                segment_id: segment_id.clone(),
            },
        )
        .await
    }

    pub async fn reset(&self, document_id: &DocumentId) -> Result<Outcome> {
        self.execute(document_id, SegmentOp::Reset).await
    }

    /// Apply `op` optimistically, persist it, and settle the result
    ///
    /// Returns the outcome with server-assigned ids. On a transport failure
    /// the local state is rolled back before the error is returned.
    pub async fn execute(&self, document_id: &DocumentId, op: SegmentOp) -> Result<Outcome> {
        let handle = self.handle(document_id)?;
        let _turn = handle.gate.lock().await;

        let pending = lock(&handle.session).begin(op)?;
        let mut guard = AbortOnDrop {
            session: &handle.session,
            ticket: Some(pending.ticket),
        };
        let result = self.persist(document_id, &pending.request).await;
        guard.ticket = None;
        let settled = lock(&handle.session).settle(pending.ticket, result);

        let mut outcome = pending.outcome;
        let mut confirmed = false;
        for settlement in settled {
            match settlement {
                Settlement::Confirmed { ticket, renamed } if ticket == pending.ticket => {
                    for rename in renamed {
                        for id in outcome.created.iter_mut().filter(|id| **id == rename.from) {
                            *id = rename.to.clone();
                        }
                    }
                    confirmed = true;
                }
                Settlement::RolledBack { ticket, error, .. } if ticket == pending.ticket => {
                    return Err(error.into());
                }
                other => log::warn!("unexpected settlement under gate: {:?}", other),
            }
        }
        if !confirmed {
            log::error!("edit {} on {} left unsettled", pending.ticket, document_id);
            return Err(EngineError::Unsettled {
                ticket: pending.ticket.value(),
            });
        }
        Ok(outcome)
    }

    async fn persist(&self, document_id: &DocumentId, op: &SegmentOp) -> TransportResult<Confirmation> {
        let backend = &self.backend;
        match op {
            SegmentOp::Split { segment_id, position } => backend
                .persist_split(document_id, segment_id, *position)
                .await
                .map(Confirmation::from),
            SegmentOp::Merge { segment_ids } => backend
                .persist_merge(document_id, segment_ids)
                .await
                .map(Confirmation::from),
            SegmentOp::CreateBulk { segments } => {
                let operations = BulkOperations {
                    create: segments.clone(),
                    ..BulkOperations::default()
                };
                backend
                    .persist_bulk_operations(document_id, &operations)
                    .await
                    .map(Confirmation::from)
            }
            SegmentOp::BulkOperations { operations } => backend
                .persist_bulk_operations(document_id, operations)
                .await
                .map(Confirmation::from),
            SegmentOp::Update { segment_id, patch } => backend
                .persist_segment_update(document_id, segment_id, patch)
                .await
                .map(Confirmation::from),
            SegmentOp::UpdateBulk { updates } => backend
                .persist_bulk_segment_update(document_id, updates)
                .await
                .map(Confirmation::from),
            SegmentOp::Delete { segment_id } => {
                let operations = BulkOperations {
                    delete: vec![segment_id.clone()],
                    ..BulkOperations::default()
                };
                backend
                    .persist_bulk_operations(document_id, &operations)
                    .await
                    .map(Confirmation::from)
            }
            SegmentOp::Reset => backend.persist_reset(document_id).await.map(|_| Confirmation::Reset),
        }
    }

    /// Re-slice a document's segments against a new buffer
    pub fn rebind_buffer(&self, document_id: &DocumentId, buffer: TextBuffer) -> Result<()> {
        rebind(&self.documents, document_id, buffer)
    }

    /// Follow buffer replacements published on `hub`
    pub fn watch_buffer(&self, hub: &mut BufferHub, document_id: &DocumentId) -> SubscriptionId {
        let documents = Arc::clone(&self.documents);
        let document_id = document_id.clone();
        hub.subscribe(move |buffer| {
            if let Err(err) = rebind(&documents, &document_id, buffer.clone()) {
                log::error!("could not follow buffer change for {}: {}", document_id, err);
            }
        })
    }

    fn handle(&self, document_id: &DocumentId) -> Result<Arc<DocumentHandle>> {
        lock(&self.documents)
            .get(document_id)
            .cloned()
            .ok_or_else(|| EngineError::DocumentNotLoaded(document_id.to_string()))
    }
}

/// Rolls back an edit whose round trip was dropped before it finished
struct AbortOnDrop<'a> {
    session: &'a Mutex<DocumentSession>,
    ticket: Option<Ticket>,
}

impl Drop for AbortOnDrop<'_> {
    fn drop(&mut self) {
        if let Some(ticket) = self.ticket.take() {
            log::warn!("edit {} dropped before its round trip finished, rolling back", ticket);
            lock(self.session).settle(ticket, Err(TransportError::Aborted));
        }
    }
}

fn rebind(documents: &Documents, document_id: &DocumentId, buffer: TextBuffer) -> Result<()> {
    let handle = lock(documents)
        .get(document_id)
        .cloned()
        .ok_or_else(|| EngineError::DocumentNotLoaded(document_id.to_string()))?;
    let mut session = lock(&handle.session);
    session.rebind_buffer(buffer)?;
    log::debug!("rebound {} to a buffer of {} codepoints", document_id, session.store().buffer().len());
    Ok(())
}
