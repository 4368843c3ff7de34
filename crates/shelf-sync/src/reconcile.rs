//! Replaying queued mutations against the remote.

use std::sync::Arc;

use tokio::sync::{Mutex, watch};
use tracing::{debug, info, instrument, warn};

use shelf_core::traits::Remote;
use shelf_core::error::StorageError;
use shelf_core::{AuthToken, Book, MutationEntry, MutationKind, Result};

use crate::queue::MutationQueue;
use crate::session::AuthSession;

/// What happened to a user-issued write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOutcome {
    /// The server accepted it.
    Saved,
    /// The server could not be reached or refused; it will be retried on the next flush.
    Queued,
}

/// Per-pass counts from one flush.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Queue length after the pass, including entries enqueued while it ran.
    pub remaining: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    Completed(FlushReport),
    /// Another flush was in flight; this call did nothing.
    AlreadyRunning,
}

/// Drains the [`MutationQueue`] and runs the direct write path.
pub struct ReconciliationEngine {
    remote: Arc<dyn Remote>,
    queue: Arc<MutationQueue>,
    auth: AuthSession,
    flushing: Mutex<()>,
    added: watch::Sender<Option<MutationOutcome>>,
    edited: watch::Sender<Option<MutationOutcome>>,
}

impl ReconciliationEngine {
    pub fn new(remote: Arc<dyn Remote>, queue: Arc<MutationQueue>, auth: AuthSession) -> Self {
        Self {
            remote,
            queue,
            auth,
            flushing: Mutex::new(()),
            added: watch::channel(None).0,
            edited: watch::channel(None).0,
        }
    }

    pub fn queue(&self) -> &Arc<MutationQueue> {
        &self.queue
    }

    /// The token for remote writes. An absent token is sent as empty and left
    /// to the server to reject.
    fn current_token(&self) -> AuthToken {
        self.auth.token().unwrap_or_else(|| AuthToken::new(""))
    }

    async fn apply(&self, entry: &MutationEntry, token: &AuthToken) -> Result<()> {
        match entry.kind {
            MutationKind::Create => self.remote.create_book(&entry.record, token).await,
            MutationKind::Update => self.remote.update_book(&entry.record, token).await,
        }
    }

    /// Run a queue operation on the blocking pool. Queue writes are fsynced
    /// and must not stall the runtime's worker threads.
    async fn with_queue<T, F>(&self, op: F) -> Result<T>
    where
        F: FnOnce(&MutationQueue) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let queue = self.queue.clone();
        match tokio::task::spawn_blocking(move || op(&queue)).await {
            Ok(result) => result,
            Err(e) => match e.try_into_panic() {
                Ok(panic) => std::panic::resume_unwind(panic),
                Err(e) => Err(StorageError::Aborted {
                    details: e.to_string(),
                }
                .into()),
            },
        }
    }

    /// One pass over the queue in enqueue order.
    ///
    /// Every entry is attempted once; successes are dropped and failures kept in
    /// their relative order. Returns [`FlushOutcome::AlreadyRunning`] without
    /// touching the queue if another pass is in progress, here or in another
    /// process sharing the queue file. The pass starts from what is stored, so
    /// entries other processes queued are replayed too.
    #[instrument(skip(self))]
    pub async fn flush(&self) -> Result<FlushOutcome> {
        let Ok(_guard) = self.flushing.try_lock() else {
            debug!("Flush already in progress");
            return Ok(FlushOutcome::AlreadyRunning);
        };

        let claimed = self
            .with_queue(|queue| {
                let Some(lock) = queue.try_lock_flush()? else {
                    return Ok(None);
                };
                Ok(Some((lock, queue.refresh()?)))
            })
            .await?;
        let Some((_lock, snapshot)) = claimed else {
            debug!("Queue is being flushed by another process");
            return Ok(FlushOutcome::AlreadyRunning);
        };

        if snapshot.is_empty() {
            return Ok(FlushOutcome::Completed(FlushReport::default()));
        }

        info!(pending = snapshot.len(), "Flushing pending mutations");
        let token = self.current_token();

        let mut failed = Vec::new();
        for entry in &snapshot {
            match self.apply(entry, &token).await {
                Ok(()) => {
                    debug!(kind = %entry.kind, id = entry.record.id, "Replayed mutation");
                }
                Err(e) => {
                    warn!(
                        kind = %entry.kind,
                        id = entry.record.id,
                        transient = e.is_transient(),
                        error = %e,
                        "Replay failed, keeping queued"
                    );
                    failed.push(entry.clone());
                }
            }
        }

        let report = FlushReport {
            attempted: snapshot.len(),
            succeeded: snapshot.len() - failed.len(),
            failed: failed.len(),
            remaining: 0,
        };

        self.with_queue(move |queue| queue.complete_flush(&snapshot, failed))
            .await?;

        let report = FlushReport {
            remaining: self.queue.len(),
            ..report
        };
        info!(
            succeeded = report.succeeded,
            failed = report.failed,
            remaining = report.remaining,
            "Flush finished"
        );
        Ok(FlushOutcome::Completed(report))
    }

    /// Create a book, queueing it if the server cannot take it now.
    pub async fn add(&self, book: Book) -> Result<MutationOutcome> {
        self.submit(MutationEntry::create(book)).await
    }

    /// Update a book, queueing it if the server cannot take it now.
    pub async fn edit(&self, book: Book) -> Result<MutationOutcome> {
        self.submit(MutationEntry::update(book)).await
    }

    #[instrument(skip(self, entry), fields(kind = %entry.kind, id = entry.record.id))]
    async fn submit(&self, entry: MutationEntry) -> Result<MutationOutcome> {
        let token = self.current_token();
        let kind = entry.kind;

        let outcome = match self.apply(&entry, &token).await {
            Ok(()) => {
                info!("Saved");
                MutationOutcome::Saved
            }
            Err(e) => {
                warn!(error = %e, "Write failed, storing offline");
                self.with_queue(move |queue| queue.enqueue(entry)).await?;
                MutationOutcome::Queued
            }
        };

        self.outcomes(kind).send_replace(Some(outcome));
        Ok(outcome)
    }

    fn outcomes(&self, kind: MutationKind) -> &watch::Sender<Option<MutationOutcome>> {
        match kind {
            MutationKind::Create => &self.added,
            MutationKind::Update => &self.edited,
        }
    }

    /// The outcome of the most recent direct write of `kind`, if any.
    pub fn last_outcome(&self, kind: MutationKind) -> watch::Receiver<Option<MutationOutcome>> {
        self.outcomes(kind).subscribe()
    }
}

impl std::fmt::Debug for ReconciliationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconciliationEngine")
            .field("queue", &self.queue)
            .finish()
    }
}
