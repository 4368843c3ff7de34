//! Platform connectivity trait.

use std::pin::Pin;

use async_trait::async_trait;
use futures_core::Stream;

use crate::Result;

/// Stream of connectivity notifications (`true` = online).
pub type ConnectivityStream = Pin<Box<dyn Stream<Item = bool> + Send>>;

/// The platform's view of device connectivity.
#[async_trait]
pub trait ConnectivitySource: Send + Sync {
    /// Query the current state once.
    async fn current(&self) -> Result<bool>;

    /// Notifications for subsequent changes. Sources may repeat a state.
    fn changes(&self) -> ConnectivityStream;
}
