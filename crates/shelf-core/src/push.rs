//! Push channel messages.

use serde::{Deserialize, Serialize};

use crate::book::Book;
use crate::error::{Error, InvalidInputError};

/// An event pushed by the server over the push channel.
#[derive(Debug, Clone, PartialEq)]
pub enum PushEvent {
    /// A book was created by someone.
    Created(Book),

    /// A book was updated by someone.
    Updated(Book),

    /// A message type this client does not handle.
    Unknown { kind: String },
}

/// Inbound frame as sent by the server.
///
/// The deployed server names the discriminator `event`; newer servers use `type`.
#[derive(Debug, Deserialize)]
struct InboundFrame {
    #[serde(rename = "type", alias = "event")]
    kind: String,
    #[serde(default)]
    payload: Option<serde_json::Value>,
}

impl PushEvent {
    /// Parse a text frame into an event.
    pub fn parse(text: &str) -> Result<Self, Error> {
        let frame: InboundFrame = serde_json::from_str(text).map_err(|e| {
            Error::InvalidInput(InvalidInputError::Other {
                message: format!("malformed push frame: {}", e),
            })
        })?;

        let book = |payload: Option<serde_json::Value>| -> Result<Book, Error> {
            let payload = payload.ok_or_else(|| InvalidInputError::Record {
                reason: format!("'{}' frame without payload", frame.kind),
            })?;
            Book::from_value(payload)
        };

        match frame.kind.as_str() {
            "created" => Ok(PushEvent::Created(book(frame.payload)?)),
            "updated" => Ok(PushEvent::Updated(book(frame.payload)?)),
            other => Ok(PushEvent::Unknown {
                kind: other.to_string(),
            }),
        }
    }

    /// The book carried by this event, if any.
    pub fn book(&self) -> Option<&Book> {
        match self {
            PushEvent::Created(book) | PushEvent::Updated(book) => Some(book),
            PushEvent::Unknown { .. } => None,
        }
    }
}

/// A message the client sends on the push channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    /// First message after the connection opens.
    Authenticate { token: String },
}

impl ClientMessage {
    pub fn to_json(&self) -> Result<String, Error> {
        serde_json::to_string(self).map_err(|e| {
            Error::InvalidInput(InvalidInputError::Other {
                message: e.to_string(),
            })
        })
    }
}
