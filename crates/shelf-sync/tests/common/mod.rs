//! In-process fakes for the remote, the push connector and their observers.

#![allow(dead_code)]

use std::collections::HashSet;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::Stream;
use tokio::sync::{mpsc, watch};

use shelf_core::error::{AuthError, Error, ProtocolError, TransportError};
use shelf_core::traits::{PushConnector, PushTransport, Remote};
use shelf_core::{
    AuthToken, Book, BookQuery, ClientMessage, Credentials, PushEvent, Result, ServerUrl,
};

pub const PASSWORD: &str = "secret";

pub fn book(id: i64, title: &str) -> Book {
    Book {
        id,
        ..Book::new(title)
    }
}

// ============================================================================
// Remote
// ============================================================================

#[derive(Default)]
struct RemoteState {
    books: Vec<Book>,
    calls: Vec<String>,
    events: Vec<String>,
    rejected_titles: HashSet<String>,
    offline: bool,
    issued: HashSet<String>,
    next_id: i64,
}

/// A book server held in memory.
///
/// Every write is recorded as `add:<title>` or `edit:<id>:<title>` in the
/// order the calls started. [`events`](Self::events) also records when each
/// write answered.
#[derive(Clone, Default)]
pub struct FakeRemote {
    state: Arc<Mutex<RemoteState>>,
    delay: Arc<Mutex<Duration>>,
    add_delay: Arc<Mutex<Duration>>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl FakeRemote {
    pub fn new() -> Self {
        let remote = Self::default();
        remote.state.lock().unwrap().next_id = 1;
        remote
    }

    pub fn with_books(books: Vec<Book>) -> Self {
        let remote = Self::new();
        {
            let mut state = remote.state.lock().unwrap();
            state.next_id = books.iter().map(|b| b.id).max().unwrap_or(0) + 1;
            state.books = books;
        }
        remote
    }

    pub fn set_offline(&self, offline: bool) {
        self.state.lock().unwrap().offline = offline;
    }

    /// Writes of a book with this title fail with a 500.
    pub fn reject_title(&self, title: &str) {
        self.state
            .lock()
            .unwrap()
            .rejected_titles
            .insert(title.to_string());
    }

    pub fn accept_title(&self, title: &str) {
        self.state.lock().unwrap().rejected_titles.remove(title);
    }

    /// Every call sleeps this long before answering.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    /// Creates sleep this much longer than other calls.
    pub fn set_add_delay(&self, delay: Duration) {
        *self.add_delay.lock().unwrap() = delay;
    }

    /// `start:<call>` and `end:<call>` for every write, in the order they happened.
    pub fn events(&self) -> Vec<String> {
        self.state.lock().unwrap().events.clone()
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn books(&self) -> Vec<Book> {
        self.state.lock().unwrap().books.clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn enter(&self, call: Option<String>) -> Result<InFlight> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let mut guard = InFlight {
            count: self.in_flight.clone(),
            ended: None,
        };

        let mut delay = *self.delay.lock().unwrap();
        let offline = {
            let mut state = self.state.lock().unwrap();
            if let Some(call) = call {
                if call.starts_with("add:") {
                    delay += *self.add_delay.lock().unwrap();
                }
                state.events.push(format!("start:{call}"));
                guard.ended = Some((self.state.clone(), format!("end:{call}")));
                state.calls.push(call);
            }
            state.offline
        };

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if offline {
            return Err(TransportError::Connection {
                message: "network unreachable".to_string(),
            }
            .into());
        }
        Ok(guard)
    }

    fn authorize(&self, token: &AuthToken) -> Result<()> {
        if self.state.lock().unwrap().issued.contains(token.as_str()) {
            Ok(())
        } else {
            Err(ProtocolError::new(403, Some("Forbidden".to_string())).into())
        }
    }

    fn check_rejected(&self, record: &Book) -> Result<()> {
        if self
            .state
            .lock()
            .unwrap()
            .rejected_titles
            .contains(&record.title)
        {
            Err(ProtocolError::new(500, Some("rejected".to_string())).into())
        } else {
            Ok(())
        }
    }
}

struct InFlight {
    count: Arc<AtomicUsize>,
    ended: Option<(Arc<Mutex<RemoteState>>, String)>,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.count.fetch_sub(1, Ordering::SeqCst);
        if let Some((state, event)) = self.ended.take() {
            state.lock().unwrap().events.push(event);
        }
    }
}

#[async_trait]
impl Remote for FakeRemote {
    async fn login(&self, credentials: &Credentials) -> Result<AuthToken> {
        let _guard = self.enter(None).await?;
        if credentials.password() != PASSWORD {
            return Err(AuthError::InvalidCredentials("Wrong password".to_string()).into());
        }
        let token = format!("tok-{}", credentials.username());
        self.state.lock().unwrap().issued.insert(token.clone());
        Ok(AuthToken::new(token))
    }

    async fn check_token(&self, token: &AuthToken) -> Result<bool> {
        let _guard = self.enter(None).await?;
        Ok(self.authorize(token).is_ok())
    }

    async fn logout(&self, token: &AuthToken) -> Result<()> {
        let _guard = self.enter(None).await?;
        self.state.lock().unwrap().issued.remove(token.as_str());
        Ok(())
    }

    async fn list_books(&self, query: &BookQuery, token: &AuthToken) -> Result<Vec<Book>> {
        let _guard = self.enter(None).await?;
        self.authorize(token)?;

        let state = self.state.lock().unwrap();
        let start = (query.page.saturating_sub(1) * query.limit) as usize;
        Ok(state
            .books
            .iter()
            .filter(|b| b.title.contains(&query.title))
            .skip(start)
            .take(query.limit as usize)
            .cloned()
            .collect())
    }

    async fn get_book(&self, id: i64, token: &AuthToken) -> Result<Book> {
        let _guard = self.enter(None).await?;
        self.authorize(token)?;

        self.state
            .lock()
            .unwrap()
            .books
            .iter()
            .find(|b| b.id == id)
            .cloned()
            .ok_or_else(|| ProtocolError::new(404, Some("Book not found".to_string())).into())
    }

    async fn create_book(&self, record: &Book, token: &AuthToken) -> Result<()> {
        let _guard = self.enter(Some(format!("add:{}", record.title))).await?;
        self.authorize(token)?;
        self.check_rejected(record)?;

        let mut state = self.state.lock().unwrap();
        let id = state.next_id;
        state.next_id += 1;
        state.books.push(Book {
            id,
            ..record.clone()
        });
        Ok(())
    }

    async fn update_book(&self, record: &Book, token: &AuthToken) -> Result<()> {
        let _guard = self
            .enter(Some(format!("edit:{}:{}", record.id, record.title)))
            .await?;
        self.authorize(token)?;
        self.check_rejected(record)?;

        let mut state = self.state.lock().unwrap();
        match state.books.iter_mut().find(|b| b.id == record.id) {
            Some(existing) => {
                *existing = record.clone();
                Ok(())
            }
            None => Err(ProtocolError::new(404, Some("Book not found".to_string())).into()),
        }
    }
}

// ============================================================================
// Push connector
// ============================================================================

#[derive(Default)]
struct ConnectorState {
    connects: usize,
    handshakes: Vec<ClientMessage>,
    senders: Vec<mpsc::UnboundedSender<Result<PushEvent>>>,
    fail_connect: bool,
}

/// Hands out in-memory transports and lets the test push into them.
#[derive(Clone, Default)]
pub struct FakeConnector {
    state: Arc<Mutex<ConnectorState>>,
    live: Arc<AtomicUsize>,
    max_live: Arc<AtomicUsize>,
}

impl FakeConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_connect(&self, fail: bool) {
        self.state.lock().unwrap().fail_connect = fail;
    }

    pub fn connects(&self) -> usize {
        self.state.lock().unwrap().connects
    }

    pub fn handshakes(&self) -> Vec<ClientMessage> {
        self.state.lock().unwrap().handshakes.clone()
    }

    /// Transports that have not been dropped yet.
    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    pub fn max_live(&self) -> usize {
        self.max_live.load(Ordering::SeqCst)
    }

    /// Deliver an event on every open transport.
    pub fn push(&self, event: PushEvent) {
        let state = self.state.lock().unwrap();
        for sender in &state.senders {
            let _ = sender.send(Ok(event.clone()));
        }
    }

    /// Make every open transport fail its next read.
    pub fn break_transports(&self) {
        let state = self.state.lock().unwrap();
        for sender in &state.senders {
            let _ = sender.send(Err(TransportError::WebSocket {
                message: "connection reset".to_string(),
            }
            .into()));
        }
    }
}

#[async_trait]
impl PushConnector for FakeConnector {
    type Transport = FakeTransport;

    async fn connect(&self, _server: &ServerUrl) -> Result<FakeTransport> {
        let (tx, rx) = mpsc::unbounded_channel();
        {
            let mut state = self.state.lock().unwrap();
            state.connects += 1;
            if state.fail_connect {
                return Err(Error::Transport(TransportError::Connection {
                    message: "refused".to_string(),
                }));
            }
            state.senders.retain(|s| !s.is_closed());
            state.senders.push(tx);
        }

        let now = self.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_live.fetch_max(now, Ordering::SeqCst);

        Ok(FakeTransport {
            rx,
            state: self.state.clone(),
            live: self.live.clone(),
        })
    }
}

pub struct FakeTransport {
    rx: mpsc::UnboundedReceiver<Result<PushEvent>>,
    state: Arc<Mutex<ConnectorState>>,
    live: Arc<AtomicUsize>,
}

#[async_trait]
impl PushTransport for FakeTransport {
    async fn send(&mut self, message: &ClientMessage) -> Result<()> {
        self.state.lock().unwrap().handshakes.push(message.clone());
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.rx.close();
        Ok(())
    }
}

impl Stream for FakeTransport {
    type Item = Result<PushEvent>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

impl Drop for FakeTransport {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Wait until the watched value satisfies `pred`, failing the test after two seconds.
pub async fn wait_until<T, F>(rx: &mut watch::Receiver<T>, pred: F)
where
    F: Fn(&T) -> bool,
{
    tokio::time::timeout(Duration::from_secs(2), rx.wait_for(|v| pred(v)))
        .await
        .expect("timed out waiting for state")
        .expect("sender dropped");
}

/// Poll `check` until it holds, failing the test after two seconds.
pub async fn eventually<F: FnMut() -> bool>(mut check: F) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !check() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not reached in time"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
