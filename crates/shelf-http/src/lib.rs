//! shelf-http - HTTP and websocket transport for the shelf book client.

mod client;
mod endpoints;
mod push;
mod remote;

pub use push::{WsConnector, WsTransport};
pub use remote::HttpRemote;
