//! Server URL type.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use url::Url;

use crate::error::{Error, InvalidInputError};

/// A validated book server base URL.
///
/// The URL must be absolute, use HTTPS (or HTTP for localhost) and have a host.
/// It is normalized so endpoint paths can be appended directly.
///
/// # Example
///
/// ```
/// use shelf_core::ServerUrl;
///
/// let server = ServerUrl::new("http://localhost:3000").unwrap();
/// assert_eq!(server.endpoint("/books"), "http://localhost:3000/books");
/// assert_eq!(server.websocket_url(), "ws://localhost:3000");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ServerUrl(Url);

impl ServerUrl {
    /// Create a new server URL from a string, validating the format.
    pub fn new(s: impl AsRef<str>) -> Result<Self, Error> {
        let s = s.as_ref();
        let url = Url::parse(s).map_err(|e| InvalidInputError::ServerUrl {
            value: s.to_string(),
            reason: e.to_string(),
        })?;

        Self::validate(&url, s)?;

        Ok(Self(url))
    }

    /// Returns the URL for an endpoint path such as `/books/7`.
    pub fn endpoint(&self, path: &str) -> String {
        // The URL crate always adds a trailing slash to root paths
        let base = self.0.as_str().trim_end_matches('/');
        format!("{}/{}", base, path.trim_start_matches('/'))
    }

    /// Returns the push channel URL (same address, websocket scheme).
    pub fn websocket_url(&self) -> String {
        let base = self.0.as_str().trim_end_matches('/');
        if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else {
            base.to_string()
        }
    }

    /// Returns the base URL as a string.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Returns the host string.
    pub fn host(&self) -> Option<&str> {
        self.0.host_str()
    }

    fn validate(url: &Url, input: &str) -> Result<(), Error> {
        if url.cannot_be_a_base() {
            return Err(InvalidInputError::ServerUrl {
                value: input.to_string(),
                reason: "must be an absolute URL".to_string(),
            }
            .into());
        }

        let scheme = url.scheme();
        let is_localhost = url
            .host_str()
            .is_some_and(|h| h == "localhost" || h == "127.0.0.1" || h == "[::1]");

        if scheme != "https" && !(scheme == "http" && is_localhost) {
            return Err(InvalidInputError::ServerUrl {
                value: input.to_string(),
                reason: "must use HTTPS (HTTP allowed only for localhost)".to_string(),
            }
            .into());
        }

        if url.host_str().is_none() {
            return Err(InvalidInputError::ServerUrl {
                value: input.to_string(),
                reason: "must have a host".to_string(),
            }
            .into());
        }

        Ok(())
    }
}

impl Default for ServerUrl {
    fn default() -> Self {
        Self(Url::parse("http://localhost:3000").expect("static URL is valid"))
    }
}

impl fmt::Display for ServerUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ServerUrl {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl Serialize for ServerUrl {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.0.as_str())
    }
}

impl<'de> Deserialize<'de> for ServerUrl {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        ServerUrl::new(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_https_url() {
        let server = ServerUrl::new("https://books.example.com").unwrap();
        assert_eq!(server.host(), Some("books.example.com"));
        assert_eq!(server.websocket_url(), "wss://books.example.com");
    }

    #[test]
    fn valid_localhost_http() {
        let server = ServerUrl::new("http://127.0.0.1:3000").unwrap();
        assert_eq!(server.websocket_url(), "ws://127.0.0.1:3000");
    }

    #[test]
    fn endpoint_with_and_without_slashes() {
        let server = ServerUrl::new("https://books.example.com/").unwrap();
        assert_eq!(server.endpoint("/books"), "https://books.example.com/books");
        assert_eq!(server.endpoint("login"), "https://books.example.com/login");
    }

    #[test]
    fn endpoint_under_path_prefix() {
        let server = ServerUrl::new("https://example.com/api").unwrap();
        assert_eq!(server.endpoint("/books/3"), "https://example.com/api/books/3");
        assert_eq!(server.websocket_url(), "wss://example.com/api");
    }

    #[test]
    fn default_is_local_dev_server() {
        assert_eq!(
            ServerUrl::default().endpoint("/books"),
            "http://localhost:3000/books"
        );
    }

    #[test]
    fn invalid_http_non_localhost() {
        assert!(ServerUrl::new("http://books.example.com").is_err());
    }

    #[test]
    fn invalid_relative_url() {
        assert!(ServerUrl::new("/books").is_err());
    }
}
