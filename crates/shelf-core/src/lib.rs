//! shelf-core - Core types and traits for the shelf book client.

pub mod book;
pub mod credentials;
pub mod error;
pub mod mutation;
pub mod push;
pub mod tokens;
pub mod traits;
pub mod types;

pub use book::{Book, BookQuery};
pub use credentials::Credentials;
pub use error::Error;
pub use mutation::{MutationEntry, MutationKind};
pub use push::{ClientMessage, PushEvent};
pub use tokens::AuthToken;
pub use traits::{ConnectivitySource, PushConnector, PushTransport, Remote};
pub use types::ServerUrl;

/// Result type alias using the crate's Error type.
pub type Result<T> = std::result::Result<T, Error>;
