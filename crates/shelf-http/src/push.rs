//! Websocket push transport.

use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, Stream, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, error, info, trace, warn};

use shelf_core::error::{Error, TransportError};
use shelf_core::traits::{PushConnector, PushTransport};
use shelf_core::{ClientMessage, PushEvent, Result, ServerUrl};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Opens websocket connections to the server's push endpoint.
#[derive(Debug, Clone, Default)]
pub struct WsConnector;

impl WsConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PushConnector for WsConnector {
    type Transport = WsTransport;

    async fn connect(&self, server: &ServerUrl) -> Result<WsTransport> {
        WsTransport::connect(server).await
    }
}

/// One open websocket connection.
///
/// Yields parsed push events. Frames that do not parse are logged and skipped.
/// The stream ends when the server closes the socket; a read error is yielded
/// once and then the stream ends.
pub struct WsTransport {
    sink: SplitSink<WsStream, Message>,
    events: Pin<Box<dyn Stream<Item = Result<PushEvent>> + Send>>,
}

impl WsTransport {
    pub async fn connect(server: &ServerUrl) -> Result<Self> {
        let url = server.websocket_url();
        info!(url = %url, "Connecting to push channel");

        let (ws_stream, _) = connect_async(&url).await.map_err(|e| {
            Error::Transport(TransportError::Connection {
                message: e.to_string(),
            })
        })?;

        debug!("WebSocket connected");

        let (sink, mut read) = ws_stream.split();

        let events = async_stream::stream! {
            while let Some(msg) = read.next().await {
                match msg {
                    Ok(Message::Text(text)) => {
                        trace!(text = %text, "Received text message");
                        match PushEvent::parse(text.as_str()) {
                            Ok(event) => yield Ok(event),
                            Err(e) => warn!(error = %e, "Skipping malformed push frame"),
                        }
                    }
                    Ok(Message::Binary(data)) => {
                        match std::str::from_utf8(&data).map(PushEvent::parse) {
                            Ok(Ok(event)) => yield Ok(event),
                            _ => warn!(len = data.len(), "Skipping undecodable binary frame"),
                        }
                    }
                    Ok(Message::Ping(_)) => {
                        // tungstenite queues the pong and flushes it with the next read or write
                        trace!("Received ping");
                    }
                    Ok(Message::Pong(_)) => {
                        trace!("Received pong");
                    }
                    Ok(Message::Close(frame)) => {
                        info!(?frame, "WebSocket closed by server");
                        break;
                    }
                    Ok(Message::Frame(_)) => {}
                    Err(e) => {
                        error!(error = %e, "WebSocket error");
                        yield Err(Error::Transport(TransportError::WebSocket {
                            message: e.to_string(),
                        }));
                        break;
                    }
                }
            }
        };

        Ok(Self {
            sink,
            events: Box::pin(events),
        })
    }
}

#[async_trait]
impl PushTransport for WsTransport {
    async fn send(&mut self, message: &ClientMessage) -> Result<()> {
        let json = message.to_json()?;
        self.sink
            .send(Message::Text(json.into()))
            .await
            .map_err(|e| {
                Error::Transport(TransportError::WebSocket {
                    message: e.to_string(),
                })
            })
    }

    async fn close(&mut self) -> Result<()> {
        self.sink.close().await.map_err(|e| {
            Error::Transport(TransportError::WebSocket {
                message: e.to_string(),
            })
        })
    }
}

impl Stream for WsTransport {
    type Item = Result<PushEvent>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.events.as_mut().poll_next(cx)
    }
}
