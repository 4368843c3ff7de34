//! Wires network, auth, reconciliation and the push channel together.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use shelf_core::AuthToken;
use shelf_core::traits::PushConnector;

use crate::channel::PushChannel;
use crate::monitor::NetworkMonitor;
use crate::reconcile::{FlushOutcome, FlushReport, ReconciliationEngine};
use crate::session::{AuthSession, AuthState};

/// Reacts to network and auth transitions.
///
/// - every change re-applies the push channel's gating condition
/// - every offline to online transition (and start-up while online) triggers a
///   flush, however briefly the device was offline
/// - with a retry interval, a flush is also tried on each tick while online;
///   it reloads the queue, so entries other processes queued are picked up
pub struct SyncCoordinator<C: PushConnector + 'static> {
    monitor: NetworkMonitor,
    auth: AuthSession,
    engine: Arc<ReconciliationEngine>,
    channel: Arc<PushChannel<C>>,
    retry_interval: Option<Duration>,
}

impl<C: PushConnector + 'static> SyncCoordinator<C> {
    pub fn new(
        monitor: NetworkMonitor,
        auth: AuthSession,
        engine: Arc<ReconciliationEngine>,
        channel: Arc<PushChannel<C>>,
    ) -> Self {
        Self {
            monitor,
            auth,
            engine,
            channel,
            retry_interval: None,
        }
    }

    pub fn with_retry_interval(mut self, interval: Option<Duration>) -> Self {
        self.retry_interval = interval;
        self
    }

    /// Run in the background until [`SyncHandle::shutdown`].
    pub fn start(self) -> SyncHandle {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let (reports_tx, reports_rx) = watch::channel(None);
        let network = self.monitor.subscribe();
        // Subscribed here so transitions before the task first runs are kept
        let transitions = self.monitor.transitions();

        let task = tokio::spawn(self.run(transitions, shutdown_rx, reports_tx));

        SyncHandle {
            shutdown: shutdown_tx,
            task,
            network,
            reports: reports_rx,
        }
    }

    async fn run(
        self,
        mut transitions: broadcast::Receiver<bool>,
        mut shutdown: oneshot::Receiver<()>,
        reports: watch::Sender<Option<FlushReport>>,
    ) {
        let reports = Arc::new(reports);
        let mut auth = self.auth.subscribe();

        let mut online = self.monitor.current();
        let auth_state = auth.borrow_and_update().clone();
        self.channel.update(online, gated_token(&auth_state)).await;

        let mut flush_task = None;
        if online {
            flush_task = Some(self.spawn_flush(&reports));
        }

        let mut retry = self.retry_interval.map(|period| {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });

        info!(online, retry = ?self.retry_interval, "Sync coordinator running");

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                transition = transitions.recv() => {
                    let now = match transition {
                        Ok(now) => now,
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!(skipped, "Missed network transitions, resyncing");
                            // Whatever was missed may have included a reconnect
                            let now = self.monitor.current();
                            if now {
                                online = false;
                            }
                            now
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    };
                    let came_online = now && !online;
                    online = now;

                    let auth_state = self.auth.state();
                    self.channel.update(online, gated_token(&auth_state)).await;

                    if came_online {
                        flush_task = Some(self.spawn_flush(&reports));
                    }
                }
                changed = auth.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let auth_state = auth.borrow_and_update().clone();
                    debug!(authenticated = auth_state.authenticated, "Auth state changed");
                    self.channel.update(online, gated_token(&auth_state)).await;
                }
                _ = tick(&mut retry) => {
                    if online {
                        flush_task = Some(self.spawn_flush(&reports));
                    }
                }
            }
        }

        info!("Sync coordinator stopping");
        self.channel.shutdown().await;
        // A running flush is allowed to finish so its outcome is committed
        if let Some(task) = flush_task {
            let _ = task.await;
        }
    }

    fn spawn_flush(&self, reports: &Arc<watch::Sender<Option<FlushReport>>>) -> JoinHandle<()> {
        let engine = self.engine.clone();
        let reports = reports.clone();
        tokio::spawn(async move {
            match engine.flush().await {
                Ok(FlushOutcome::Completed(report)) if report.attempted == 0 => {
                    debug!("Nothing to flush");
                }
                Ok(FlushOutcome::Completed(report)) => {
                    reports.send_replace(Some(report));
                }
                Ok(FlushOutcome::AlreadyRunning) => {
                    debug!("Skipped flush, one is already running");
                }
                Err(e) => {
                    error!(error = %e, "Flush could not persist its result");
                }
            }
        })
    }
}

/// The credential to open the push channel with, if the gate allows.
fn gated_token(state: &AuthState) -> Option<&AuthToken> {
    if state.authenticated {
        state.token.as_ref()
    } else {
        None
    }
}

async fn tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

/// Control over a running [`SyncCoordinator`].
#[derive(Debug)]
pub struct SyncHandle {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
    network: watch::Receiver<bool>,
    reports: watch::Receiver<Option<FlushReport>>,
}

impl SyncHandle {
    /// Online/offline as the coordinator sees it.
    pub fn network(&self) -> watch::Receiver<bool> {
        self.network.clone()
    }

    /// The report of the most recent completed flush.
    pub fn flush_reports(&self) -> watch::Receiver<Option<FlushReport>> {
        self.reports.clone()
    }

    /// Stop reacting, close the push channel and wait for an in-flight flush.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(());
        if let Err(e) = self.task.await {
            error!(error = %e, "Sync coordinator task failed");
        }
    }
}
