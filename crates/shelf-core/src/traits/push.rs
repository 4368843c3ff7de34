//! Push channel transport traits.

use async_trait::async_trait;
use futures_core::Stream;

use crate::types::ServerUrl;
use crate::{ClientMessage, PushEvent, Result};

/// One live push connection.
///
/// Yields inbound events until the server closes or the transport fails.
#[async_trait]
pub trait PushTransport: Stream<Item = Result<PushEvent>> + Send + Unpin {
    /// Send a message to the server.
    async fn send(&mut self, message: &ClientMessage) -> Result<()>;

    /// Close the connection from the client side.
    async fn close(&mut self) -> Result<()>;
}

/// Opens push connections.
#[async_trait]
pub trait PushConnector: Send + Sync {
    /// Transport type produced by this connector.
    type Transport: PushTransport + 'static;

    /// Open a connection to the server's push endpoint.
    async fn connect(&self, server: &ServerUrl) -> Result<Self::Transport>;
}
