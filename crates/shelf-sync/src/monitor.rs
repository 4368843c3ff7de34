//! Connectivity monitoring.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use shelf_core::Result;
use shelf_core::traits::{ConnectivitySource, ConnectivityStream};

/// Capacity of the transition log; a listener further behind than this lags.
const TRANSITION_BUFFER: usize = 64;

/// Online/offline signal with change notification.
///
/// Queries the source once at start, then follows its change stream. Repeated
/// reports of the same state are collapsed, so every notification seen through
/// [`subscribe`](Self::subscribe) is a real transition.
///
/// A watch receiver only sees the latest state, so an offline and back online
/// blip between two polls is invisible to it. Listeners that must react to
/// every transition use [`transitions`](Self::transitions) instead.
#[derive(Debug)]
pub struct NetworkMonitor {
    state: watch::Receiver<bool>,
    transitions: broadcast::Sender<bool>,
    task: JoinHandle<()>,
}

impl NetworkMonitor {
    pub async fn start(source: Arc<dyn ConnectivitySource>) -> Self {
        // Subscribe before asking for the current state so no change slips between the two
        let mut changes = source.changes();

        let initial = match source.current().await {
            Ok(online) => online,
            Err(e) => {
                warn!(error = %e, "Connectivity query failed, assuming online");
                true
            }
        };
        info!(online = initial, "Network monitor started");

        let (tx, rx) = watch::channel(initial);
        let (transitions, _) = broadcast::channel(TRANSITION_BUFFER);
        let log = transitions.clone();

        let task = tokio::spawn(async move {
            while let Some(online) = changes.next().await {
                let changed = tx.send_if_modified(|current| {
                    if *current == online {
                        false
                    } else {
                        *current = online;
                        true
                    }
                });

                if changed {
                    info!(online, "Network status changed");
                    // No receivers just means nobody follows transitions yet
                    let _ = log.send(online);
                } else {
                    debug!(online, "Ignoring repeated network status");
                }
            }
            debug!("Connectivity source ended");
        });

        Self {
            state: rx,
            transitions,
            task,
        }
    }

    pub fn current(&self) -> bool {
        *self.state.borrow()
    }

    /// A receiver notified on each transition. Dropping it unsubscribes.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.state.clone()
    }

    /// Every transition from now on, in order, one value per change.
    pub fn transitions(&self) -> broadcast::Receiver<bool> {
        self.transitions.subscribe()
    }
}

impl Drop for NetworkMonitor {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// A connectivity source driven by explicit calls to [`set`](Self::set).
///
/// Reports every call, including repeats, the way a platform callback would.
#[derive(Debug, Clone)]
pub struct ManualConnectivity {
    online: Arc<AtomicBool>,
    tx: broadcast::Sender<bool>,
}

impl ManualConnectivity {
    pub fn new(online: bool) -> Self {
        let (tx, _) = broadcast::channel(16);
        Self {
            online: Arc::new(AtomicBool::new(online)),
            tx,
        }
    }

    pub fn set(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
        // No receivers just means nobody is monitoring yet
        let _ = self.tx.send(online);
    }
}

#[async_trait]
impl ConnectivitySource for ManualConnectivity {
    async fn current(&self) -> Result<bool> {
        Ok(self.online.load(Ordering::SeqCst))
    }

    fn changes(&self) -> ConnectivityStream {
        let rx = self.tx.subscribe();
        Box::pin(futures_util::stream::unfold(rx, |mut rx| async move {
            loop {
                match rx.recv().await {
                    Ok(online) => return Some((online, rx)),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Connectivity listener lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shelf_core::error::{Error, TransportError};
    use std::time::Duration;

    struct Unavailable;

    #[async_trait]
    impl ConnectivitySource for Unavailable {
        async fn current(&self) -> Result<bool> {
            Err(Error::Transport(TransportError::Connection {
                message: "no platform".to_string(),
            }))
        }

        fn changes(&self) -> ConnectivityStream {
            Box::pin(futures_util::stream::pending())
        }
    }

    #[tokio::test]
    async fn failed_query_defaults_online() {
        let monitor = NetworkMonitor::start(Arc::new(Unavailable)).await;
        assert!(monitor.current());
    }

    #[tokio::test]
    async fn repeated_states_notify_once() {
        let source = ManualConnectivity::new(true);
        let monitor = NetworkMonitor::start(Arc::new(source.clone())).await;
        let mut rx = monitor.subscribe();

        source.set(true);
        source.set(false);
        source.set(false);

        tokio::time::timeout(Duration::from_secs(1), rx.changed())
            .await
            .unwrap()
            .unwrap();
        assert!(!*rx.borrow_and_update());

        // Nothing further: the duplicate `false` and the initial `true` were collapsed
        let extra = tokio::time::timeout(Duration::from_millis(100), rx.changed()).await;
        assert!(extra.is_err());
        assert!(!monitor.current());
    }

    #[tokio::test]
    async fn transitions_keep_quick_blips() {
        let source = ManualConnectivity::new(true);
        let monitor = NetworkMonitor::start(Arc::new(source.clone())).await;
        let mut transitions = monitor.transitions();

        source.set(false);
        source.set(true);
        source.set(true);

        let timeout = Duration::from_secs(1);
        let first = tokio::time::timeout(timeout, transitions.recv()).await.unwrap();
        let second = tokio::time::timeout(timeout, transitions.recv()).await.unwrap();
        assert_eq!((first.unwrap(), second.unwrap()), (false, true));

        let extra = tokio::time::timeout(Duration::from_millis(100), transitions.recv()).await;
        assert!(extra.is_err());
    }

    #[tokio::test]
    async fn follows_transitions() {
        let source = ManualConnectivity::new(false);
        let monitor = NetworkMonitor::start(Arc::new(source.clone())).await;
        assert!(!monitor.current());

        let mut rx = monitor.subscribe();
        source.set(true);
        rx.changed().await.unwrap();
        assert!(monitor.current());
    }
}
