//! Sync configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;

use shelf_core::ServerUrl;
use shelf_core::error::{Error, InvalidInputError};

const QUEUE_FILE: &str = "pending_mutations.json";
const SESSION_FILE: &str = "session.json";

/// Settings for one sync client.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub server: ServerUrl,
    /// Directory holding the queue and token files.
    pub data_dir: PathBuf,
    /// Books per list page.
    pub page_limit: u32,
    /// When set, also flush on this interval while online and the queue is non-empty.
    pub retry_interval: Option<Duration>,
    /// Per-request HTTP timeout.
    pub request_timeout: Duration,
    /// How many pushed events a slow subscriber may fall behind before skipping.
    pub event_buffer: usize,
}

impl SyncConfig {
    /// Defaults, storing state under `data_dir`.
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            server: ServerUrl::default(),
            data_dir: data_dir.as_ref().to_path_buf(),
            page_limit: 10,
            retry_interval: None,
            request_timeout: Duration::from_secs(30),
            event_buffer: 64,
        }
    }

    /// Defaults, storing state in the platform data directory.
    pub fn with_default_dir() -> Result<Self, Error> {
        Ok(Self::new(default_data_dir()?))
    }

    pub fn with_server(mut self, server: ServerUrl) -> Self {
        self.server = server;
        self
    }

    pub fn with_retry_interval(mut self, interval: Option<Duration>) -> Self {
        self.retry_interval = interval;
        self
    }

    pub fn queue_path(&self) -> PathBuf {
        self.data_dir.join(QUEUE_FILE)
    }

    pub fn session_path(&self) -> PathBuf {
        self.data_dir.join(SESSION_FILE)
    }
}

/// The platform data directory for shelf.
pub fn default_data_dir() -> Result<PathBuf, Error> {
    let dirs = ProjectDirs::from("", "", "shelf").ok_or_else(|| InvalidInputError::Other {
        message: "could not determine data directory".to_string(),
    })?;
    Ok(dirs.data_dir().to_path_buf())
}
