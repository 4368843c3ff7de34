//! Seams between the sync core and the outside world.

mod connectivity;
mod push;
mod remote;

pub use connectivity::{ConnectivitySource, ConnectivityStream};
pub use push::{PushConnector, PushTransport};
pub use remote::Remote;
