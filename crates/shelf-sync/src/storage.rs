//! Durable storage backends for the mutation queue.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use fs2::FileExt;
use tracing::{debug, instrument};

use shelf_core::error::StorageError;
use shelf_core::{MutationEntry, Result};

/// Where the queue's entries live between process runs.
///
/// `store` must be atomic: after it returns `Ok`, a subsequent `load` (in this
/// or a later process) returns exactly the stored sequence. Storage that can be
/// shared between processes overrides [`update`](Self::update) and
/// [`try_lock_flush`](Self::try_lock_flush) so writers and flushers in other
/// processes are accounted for.
pub trait QueueStorage: Send + Sync {
    fn load(&self) -> Result<Vec<MutationEntry>>;

    fn store(&self, entries: &[MutationEntry]) -> Result<()>;

    /// Read the stored entries, apply `change` and store the result, with no
    /// other writer in between. Returns what was stored.
    fn update(
        &self,
        change: &mut dyn FnMut(&mut Vec<MutationEntry>),
    ) -> Result<Vec<MutationEntry>> {
        let mut entries = self.load()?;
        change(&mut entries);
        self.store(&entries)?;
        Ok(entries)
    }

    /// Claim the right to replay the stored entries. `None` means another
    /// holder is flushing them right now.
    fn try_lock_flush(&self) -> Result<Option<FlushLock>> {
        Ok(Some(FlushLock::default()))
    }
}

/// Exclusive right to flush a storage, released on drop.
#[derive(Debug, Default)]
pub struct FlushLock {
    _file: Option<File>,
}

/// A JSON file holding the whole queue as one array.
///
/// Writes go to a sibling temp file which is fsynced and renamed over the
/// target. A `.lock` file makes every read-modify-write exclusive across
/// processes, and a `.flush` lock file admits one flusher at a time.
#[derive(Debug, Clone)]
pub struct FileQueueStorage {
    path: PathBuf,
}

impl FileQueueStorage {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        self.path.with_extension("lock")
    }

    fn flush_lock_path(&self) -> PathBuf {
        self.path.with_extension("flush")
    }

    fn temp_path(&self) -> PathBuf {
        self.path.with_extension("tmp")
    }

    fn write_error(&self, path: &Path, source: io::Error) -> StorageError {
        StorageError::Write {
            path: path.to_path_buf(),
            source,
        }
    }

    fn open_lock_file(&self, lock_path: &Path) -> Result<File> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| self.write_error(parent, e))?;
        }

        let lock_file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(lock_path)
            .map_err(|source| StorageError::Lock {
                path: lock_path.to_path_buf(),
                source,
            })?;
        Ok(lock_file)
    }

    fn acquire_lock(&self) -> Result<File> {
        let lock_path = self.lock_path();
        let lock_file = self.open_lock_file(&lock_path)?;

        lock_file
            .lock_exclusive()
            .map_err(|source| StorageError::Lock {
                path: lock_path,
                source,
            })?;

        Ok(lock_file)
    }

    /// Replace the file contents. The caller holds the `.lock` file.
    fn write(&self, entries: &[MutationEntry]) -> Result<()> {
        let json = serde_json::to_vec_pretty(entries).map_err(|e| StorageError::Corrupt {
            path: self.path.clone(),
            details: e.to_string(),
        })?;

        let temp_path = self.temp_path();
        let mut file = File::create(&temp_path).map_err(|e| self.write_error(&temp_path, e))?;
        file.write_all(&json)
            .map_err(|e| self.write_error(&temp_path, e))?;
        file.sync_all()
            .map_err(|e| self.write_error(&temp_path, e))?;
        drop(file);

        fs::rename(&temp_path, &self.path).map_err(|e| self.write_error(&self.path, e))?;

        debug!(count = entries.len(), "Stored pending mutations");
        Ok(())
    }

    fn release_lock(&self, lock_file: &File) -> Result<()> {
        lock_file.unlock().map_err(|source| {
            StorageError::Lock {
                path: self.lock_path(),
                source,
            }
            .into()
        })
    }
}

impl QueueStorage for FileQueueStorage {
    #[instrument(skip(self), fields(path = %self.path.display()))]
    fn load(&self) -> Result<Vec<MutationEntry>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(StorageError::Read {
                    path: self.path.clone(),
                    source,
                }
                .into());
            }
        };

        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        let entries: Vec<MutationEntry> =
            serde_json::from_str(&content).map_err(|e| StorageError::Corrupt {
                path: self.path.clone(),
                details: e.to_string(),
            })?;

        debug!(count = entries.len(), "Loaded pending mutations");
        Ok(entries)
    }

    #[instrument(skip(self, entries), fields(path = %self.path.display(), count = entries.len()))]
    fn store(&self, entries: &[MutationEntry]) -> Result<()> {
        let lock_file = self.acquire_lock()?;
        self.write(entries)?;
        self.release_lock(&lock_file)
    }

    #[instrument(skip(self, change), fields(path = %self.path.display()))]
    fn update(
        &self,
        change: &mut dyn FnMut(&mut Vec<MutationEntry>),
    ) -> Result<Vec<MutationEntry>> {
        let lock_file = self.acquire_lock()?;

        // Another process may have written since this one last looked
        let mut entries = self.load()?;
        change(&mut entries);
        self.write(&entries)?;

        self.release_lock(&lock_file)?;
        Ok(entries)
    }

    fn try_lock_flush(&self) -> Result<Option<FlushLock>> {
        let lock_path = self.flush_lock_path();
        let lock_file = self.open_lock_file(&lock_path)?;

        match lock_file.try_lock_exclusive() {
            Ok(()) => Ok(Some(FlushLock {
                _file: Some(lock_file),
            })),
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => {
                debug!("Queue is being flushed by another holder");
                Ok(None)
            }
            Err(source) => Err(StorageError::Lock {
                path: lock_path,
                source,
            }
            .into()),
        }
    }
}

/// Volatile storage, for tests and for callers that opt out of durability.
#[derive(Debug, Default)]
pub struct MemoryQueueStorage {
    entries: Mutex<Vec<MutationEntry>>,
}

impl MemoryQueueStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl QueueStorage for MemoryQueueStorage {
    fn load(&self) -> Result<Vec<MutationEntry>> {
        Ok(self
            .entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone())
    }

    fn store(&self, entries: &[MutationEntry]) -> Result<()> {
        *self.entries.lock().unwrap_or_else(|e| e.into_inner()) = entries.to_vec();
        Ok(())
    }

    fn update(
        &self,
        change: &mut dyn FnMut(&mut Vec<MutationEntry>),
    ) -> Result<Vec<MutationEntry>> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        change(&mut *entries);
        Ok(entries.clone())
    }
}
