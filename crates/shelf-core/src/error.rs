//! Error types for shelf.
//!
//! One unified error type with explicit variants for transport,
//! authentication, protocol, input validation and local storage errors.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// The unified error type for shelf operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Network transport errors (DNS, TLS, connection, timeout).
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Authentication errors (rejected login, missing token).
    #[error("authentication error: {0}")]
    Auth(#[from] AuthError),

    /// The server answered with a non-success status.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Input validation errors (bad URL, malformed record JSON).
    #[error("invalid input: {0}")]
    InvalidInput(#[from] InvalidInputError),

    /// Local persistence failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl Error {
    /// Whether retrying the same call later could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Transport(_) => true,
            Error::Protocol(e) => e.is_server_error(),
            _ => false,
        }
    }

    /// Whether the remote rejected the credential.
    pub fn is_auth_error(&self) -> bool {
        match self {
            Error::Auth(_) => true,
            Error::Protocol(e) => e.is_auth_error(),
            _ => false,
        }
    }
}

/// Transport-level errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Network connection failed.
    #[error("connection failed: {message}")]
    Connection { message: String },

    /// Request timed out.
    #[error("request timed out")]
    Timeout,

    /// Generic HTTP error.
    #[error("HTTP error: {message}")]
    Http { message: String },

    /// Websocket error on the push channel.
    #[error("websocket error: {message}")]
    WebSocket { message: String },
}

/// Authentication-related errors.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The server refused the username/password pair.
    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    /// The stored token was rejected by the token check.
    #[error("token rejected")]
    TokenRejected,

    /// No token is stored.
    #[error("not logged in")]
    NotLoggedIn,
}

/// Protocol-level errors from HTTP responses.
#[derive(Debug)]
pub struct ProtocolError {
    /// HTTP status code.
    pub status: u16,
    /// Error message from the server.
    pub message: Option<String>,
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HTTP {}", self.status)?;
        if let Some(ref message) = self.message {
            write!(f, ": {}", message)?;
        }
        Ok(())
    }
}

impl std::error::Error for ProtocolError {}

impl ProtocolError {
    /// Create a new protocol error.
    pub fn new(status: u16, message: Option<String>) -> Self {
        Self { status, message }
    }

    /// Check if this is an authentication error.
    pub fn is_auth_error(&self) -> bool {
        self.status == 401 || self.status == 403
    }

    /// 5xx, plus the 4xx statuses that mean "try again later".
    pub fn is_server_error(&self) -> bool {
        self.status >= 500 || self.status == 408 || self.status == 429
    }
}

/// Input validation errors.
#[derive(Debug, Error)]
pub enum InvalidInputError {
    /// Invalid server URL format.
    #[error("invalid server URL '{value}': {reason}")]
    ServerUrl { value: String, reason: String },

    /// A record could not be decoded.
    #[error("invalid record: {reason}")]
    Record { reason: String },

    /// Generic invalid input.
    #[error("invalid input: {message}")]
    Other { message: String },
}

/// Errors persisting local state (the mutation queue, the session token).
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to read '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to lock '{path}': {source}")]
    Lock {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The file exists but does not hold what we expect.
    #[error("'{path}' is corrupted: {details}")]
    Corrupt { path: PathBuf, details: String },

    /// A storage call moved off the async runtime did not run to completion.
    #[error("storage task aborted: {details}")]
    Aborted { details: String },
}

impl StorageError {
    /// The file this error refers to, if any.
    pub fn path(&self) -> Option<&Path> {
        match self {
            StorageError::Read { path, .. }
            | StorageError::Write { path, .. }
            | StorageError::Lock { path, .. }
            | StorageError::Corrupt { path, .. } => Some(path),
            StorageError::Aborted { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_error_display_includes_message() {
        let err = ProtocolError::new(404, Some("Book not found".to_string()));
        assert_eq!(err.to_string(), "HTTP 404: Book not found");
    }

    #[test]
    fn transient_classification() {
        assert!(Error::from(TransportError::Timeout).is_transient());
        assert!(Error::from(ProtocolError::new(503, None)).is_transient());
        assert!(!Error::from(ProtocolError::new(400, None)).is_transient());
        assert!(!Error::from(AuthError::NotLoggedIn).is_transient());
    }

    #[test]
    fn auth_classification() {
        assert!(Error::from(ProtocolError::new(401, None)).is_auth_error());
        assert!(Error::from(AuthError::TokenRejected).is_auth_error());
        assert!(!Error::from(ProtocolError::new(500, None)).is_auth_error());
    }

    #[test]
    fn storage_error_keeps_path() {
        let err = StorageError::Corrupt {
            path: PathBuf::from("/data/pending_mutations.json"),
            details: "expected array".to_string(),
        };
        assert!(err.to_string().contains("pending_mutations.json"));
        assert!(err.path().unwrap().ends_with("pending_mutations.json"));
    }
}
