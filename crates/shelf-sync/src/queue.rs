//! The durable, ordered queue of pending mutations.

use std::sync::{Mutex, MutexGuard};

use tracing::{debug, info, instrument};

use shelf_core::{MutationEntry, Result};

use crate::storage::{FlushLock, QueueStorage};

/// Ordered pending writes, persisted on every change.
///
/// The in-memory copy is only updated after the storage write succeeds, so
/// what callers observe through [`all`](Self::all) is always what is on disk.
/// Every change is a read-modify-write of the storage, so entries appended by
/// another process sharing the same file are kept.
///
/// Storage calls block (a file write is fsynced before it returns). Async
/// callers run them on the blocking pool, as [`ReconciliationEngine`] does.
///
/// [`ReconciliationEngine`]: crate::reconcile::ReconciliationEngine
pub struct MutationQueue {
    storage: Box<dyn QueueStorage>,
    entries: Mutex<Vec<MutationEntry>>,
}

impl MutationQueue {
    /// Open a queue, loading whatever the storage already holds.
    pub fn open(storage: impl QueueStorage + 'static) -> Result<Self> {
        let entries = storage.load()?;
        if !entries.is_empty() {
            info!(count = entries.len(), "Restored pending mutations");
        }

        Ok(Self {
            storage: Box::new(storage),
            entries: Mutex::new(entries),
        })
    }

    fn entries(&self) -> MutexGuard<'_, Vec<MutationEntry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Append an entry. Returns once it is persisted.
    #[instrument(skip(self, entry), fields(kind = %entry.kind, id = entry.record.id))]
    pub fn enqueue(&self, entry: MutationEntry) -> Result<()> {
        let mut entries = self.entries();
        let stored = self.storage.update(&mut |stored| stored.push(entry.clone()))?;
        *entries = stored;

        debug!(pending = entries.len(), "Mutation queued");
        Ok(())
    }

    /// Snapshot of the pending entries in replay order.
    pub fn all(&self) -> Vec<MutationEntry> {
        self.entries().clone()
    }

    /// Reload from storage, picking up entries other processes appended.
    pub fn refresh(&self) -> Result<Vec<MutationEntry>> {
        let mut entries = self.entries();
        *entries = self.storage.load()?;
        Ok(entries.clone())
    }

    /// Overwrite the queue with `remaining`.
    pub fn replace_all(&self, remaining: Vec<MutationEntry>) -> Result<()> {
        let mut entries = self.entries();
        self.storage.store(&remaining)?;
        *entries = remaining;
        Ok(())
    }

    /// Claim the right to replay this queue. `None` while another holder,
    /// possibly in another process, is flushing it.
    pub fn try_lock_flush(&self) -> Result<Option<FlushLock>> {
        self.storage.try_lock_flush()
    }

    /// Commit the result of a flush over `snapshot`.
    ///
    /// The snapshot's entries are removed from what is stored now and `failed`
    /// goes back in front; anything enqueued since the snapshot was taken, by
    /// this process or another, is kept behind them.
    pub fn complete_flush(
        &self,
        snapshot: &[MutationEntry],
        failed: Vec<MutationEntry>,
    ) -> Result<()> {
        let mut entries = self.entries();
        let stored = self.storage.update(&mut |stored| {
            let mut appended = std::mem::take(stored);
            for attempted in snapshot {
                if let Some(pos) = appended.iter().position(|e| e == attempted) {
                    appended.remove(pos);
                }
            }
            stored.extend(failed.iter().cloned());
            stored.extend(appended);
        })?;
        *entries = stored;

        debug!(pending = entries.len(), "Flush committed");
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}

impl std::fmt::Debug for MutationQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MutationQueue")
            .field("pending", &self.len())
            .finish()
    }
}
