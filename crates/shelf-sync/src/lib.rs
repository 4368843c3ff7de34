//! shelf-sync - Offline-resilient synchronization core.
//!
//! Mutations that cannot reach the server are kept in a durable
//! [`MutationQueue`] and replayed in order by the [`ReconciliationEngine`] when
//! the [`NetworkMonitor`] reports the device back online. A [`PushChannel`],
//! open only while online and authenticated, delivers server-side changes that
//! the list and detail views merge into their [`LocalCache`].
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use shelf_core::traits::{PushConnector, Remote};
//! use shelf_sync::{
//!     AuthSession, FileQueueStorage, ManualConnectivity, MutationQueue, NetworkMonitor,
//!     PushChannel, ReconciliationEngine, SyncConfig, SyncCoordinator, TokenStore,
//! };
//!
//! async fn run<C: PushConnector + 'static>(remote: Arc<dyn Remote>, connector: C) -> shelf_core::Result<()> {
//!     let config = SyncConfig::with_default_dir()?;
//!     let queue = Arc::new(MutationQueue::open(FileQueueStorage::new(config.queue_path()))?);
//!     let auth = AuthSession::new(remote.clone(), TokenStore::new(config.session_path()))?;
//!     let engine = Arc::new(ReconciliationEngine::new(remote, queue, auth.clone()));
//!     let channel = Arc::new(PushChannel::new(connector, config.server.clone(), config.event_buffer));
//!
//!     let connectivity = ManualConnectivity::new(true);
//!     let monitor = NetworkMonitor::start(Arc::new(connectivity.clone())).await;
//!
//!     let handle = SyncCoordinator::new(monitor, auth, engine, channel).start();
//!     connectivity.set(false);
//!     handle.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod channel;
pub mod config;
pub mod coordinator;
pub mod monitor;
pub mod queue;
pub mod reconcile;
pub mod session;
pub mod storage;

pub use cache::{BookDetailView, BookListView, LocalCache};
pub use channel::{CloseReason, ConnectionState, PushChannel, PushSubscription};
pub use config::SyncConfig;
pub use coordinator::{SyncCoordinator, SyncHandle};
pub use monitor::{ManualConnectivity, NetworkMonitor};
pub use queue::MutationQueue;
pub use reconcile::{FlushOutcome, FlushReport, MutationOutcome, ReconciliationEngine};
pub use session::{AuthSession, AuthState, TokenStore};
pub use storage::{FileQueueStorage, FlushLock, MemoryQueueStorage, QueueStorage};
