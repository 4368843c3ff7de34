//! The gated push channel.

use std::sync::Arc;

use futures_util::StreamExt;
use tokio::sync::{Mutex, broadcast, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use shelf_core::traits::{PushConnector, PushTransport};
use shelf_core::{AuthToken, ClientMessage, PushEvent, ServerUrl};

/// Why the channel is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// Never opened.
    Idle,
    Offline,
    Unauthenticated,
    /// Connect, handshake or read failed.
    TransportFailed,
    /// The server ended the connection.
    ServerClosed,
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Closed(CloseReason),
    Opening,
    /// Connected and the authentication handshake was sent.
    Open,
}

impl ConnectionState {
    pub fn is_open(&self) -> bool {
        matches!(self, ConnectionState::Open)
    }
}

struct Connection {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl Connection {
    /// Stop the connection task and wait until its transport is gone.
    async fn close(self) {
        let _ = self.shutdown.send(());
        if let Err(e) = self.task.await {
            warn!(error = %e, "Push connection task did not exit cleanly");
        }
    }
}

/// A persistent server connection, open only while online and authenticated.
///
/// The channel never reconnects on its own. [`update`](Self::update) is the
/// only thing that opens or closes it, and at most one transport is live at any
/// time. Events are fanned out to every [`PushSubscription`].
pub struct PushChannel<C: PushConnector + 'static> {
    connector: Arc<C>,
    server: ServerUrl,
    events: broadcast::Sender<PushEvent>,
    state: Arc<watch::Sender<ConnectionState>>,
    active: Mutex<Option<Connection>>,
}

impl<C: PushConnector + 'static> PushChannel<C> {
    pub fn new(connector: C, server: ServerUrl, buffer: usize) -> Self {
        let (events, _) = broadcast::channel(buffer.max(1));
        let (state, _) = watch::channel(ConnectionState::Closed(CloseReason::Idle));

        Self {
            connector: Arc::new(connector),
            server,
            events,
            state: Arc::new(state),
            active: Mutex::new(None),
        }
    }

    /// Apply the gating condition.
    ///
    /// Opens if `online` and `token` is an authenticated credential and no
    /// connection is live; closes if either condition is false. Calling it again
    /// with the same inputs is a no-op.
    #[instrument(skip(self, token), fields(authenticated = token.is_some()))]
    pub async fn update(&self, online: bool, token: Option<&AuthToken>) {
        let mut active = self.active.lock().await;

        if active.as_ref().is_some_and(|c| c.task.is_finished()) {
            debug!("Reaping finished push connection");
            if let Some(conn) = active.take() {
                conn.close().await;
            }
        }

        match (online, token) {
            (true, Some(token)) => {
                if active.is_none() {
                    *active = Some(self.open(token.clone()));
                }
            }
            _ => {
                let reason = if online {
                    CloseReason::Unauthenticated
                } else {
                    CloseReason::Offline
                };

                if let Some(conn) = active.take() {
                    info!(?reason, "Closing push channel");
                    conn.close().await;
                }
                self.set_state(ConnectionState::Closed(reason));
            }
        }
    }

    /// Close for good (until the next `update`).
    pub async fn shutdown(&self) {
        let mut active = self.active.lock().await;
        if let Some(conn) = active.take() {
            conn.close().await;
        }
        self.set_state(ConnectionState::Closed(CloseReason::Shutdown));
    }

    fn set_state(&self, next: ConnectionState) {
        set_state(&self.state, next);
    }

    fn open(&self, token: AuthToken) -> Connection {
        self.set_state(ConnectionState::Opening);

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(run_connection(
            self.connector.clone(),
            self.server.clone(),
            token,
            self.events.clone(),
            self.state.clone(),
            shutdown_rx,
        ));

        Connection {
            shutdown: shutdown_tx,
            task,
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Register a new, independent listener. Dropping it unregisters.
    pub fn subscribe(&self) -> PushSubscription {
        PushSubscription {
            rx: self.events.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.events.receiver_count()
    }
}

impl<C: PushConnector + 'static> std::fmt::Debug for PushChannel<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushChannel")
            .field("server", &self.server)
            .field("state", &self.state())
            .finish()
    }
}

fn set_state(state: &watch::Sender<ConnectionState>, next: ConnectionState) {
    state.send_if_modified(|current| {
        if *current == next {
            false
        } else {
            debug!(from = ?*current, to = ?next, "Push channel state");
            *current = next;
            true
        }
    });
}

async fn run_connection<C: PushConnector + 'static>(
    connector: Arc<C>,
    server: ServerUrl,
    token: AuthToken,
    events: broadcast::Sender<PushEvent>,
    state: Arc<watch::Sender<ConnectionState>>,
    mut shutdown: oneshot::Receiver<()>,
) {
    let connected = tokio::select! {
        _ = &mut shutdown => return,
        result = connector.connect(&server) => result,
    };

    let mut transport = match connected {
        Ok(transport) => transport,
        Err(e) => {
            error!(error = %e, "Push channel connect failed");
            set_state(&state, ConnectionState::Closed(CloseReason::TransportFailed));
            return;
        }
    };

    let handshake = ClientMessage::Authenticate {
        token: token.as_str().to_string(),
    };
    if let Err(e) = transport.send(&handshake).await {
        error!(error = %e, "Push channel handshake failed");
        let _ = transport.close().await;
        set_state(&state, ConnectionState::Closed(CloseReason::TransportFailed));
        return;
    }

    info!("Push channel open");
    set_state(&state, ConnectionState::Open);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                if let Err(e) = transport.close().await {
                    debug!(error = %e, "Error closing push transport");
                }
                return;
            }
            item = transport.next() => match item {
                Some(Ok(PushEvent::Unknown { kind })) => {
                    debug!(kind, "Dropping unhandled push message");
                }
                Some(Ok(event)) => {
                    // No subscribers is fine; the event is simply not observed
                    let _ = events.send(event);
                }
                Some(Err(e)) => {
                    error!(error = %e, "Push channel transport error");
                    set_state(&state, ConnectionState::Closed(CloseReason::TransportFailed));
                    return;
                }
                None => {
                    info!("Push channel closed by server");
                    set_state(&state, ConnectionState::Closed(CloseReason::ServerClosed));
                    return;
                }
            }
        }
    }
}

/// One listener's view of the pushed events.
#[derive(Debug)]
pub struct PushSubscription {
    rx: broadcast::Receiver<PushEvent>,
}

impl PushSubscription {
    /// The next event, or `None` once the channel is dropped.
    ///
    /// A listener that falls behind skips the events it missed and carries on.
    pub async fn recv(&mut self) -> Option<PushEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, "Push subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// An event if one is already waiting.
    pub fn try_recv(&mut self) -> Option<PushEvent> {
        loop {
            match self.rx.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(missed)) => {
                    warn!(missed, "Push subscriber lagged");
                }
                Err(_) => return None,
            }
        }
    }
}
