//! HTTP client for the book server.

use std::time::Duration;

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, instrument, trace};

use shelf_core::error::{Error, InvalidInputError, ProtocolError, TransportError};
use shelf_core::{AuthToken, ServerUrl};

use crate::endpoints::ErrorResponse;

/// JSON-over-HTTP client bound to one server.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    server: ServerUrl,
}

impl HttpClient {
    /// Create a client whose requests give up after `timeout`.
    pub fn new(server: ServerUrl, timeout: Duration) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("shelf/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(transport_error)?;

        Ok(Self { client, server })
    }

    pub fn server(&self) -> &ServerUrl {
        &self.server
    }

    /// Authenticated GET with query parameters.
    #[instrument(skip(self, token), fields(server = %self.server))]
    pub async fn query_authed<Q, R>(
        &self,
        path: &str,
        params: &Q,
        token: &AuthToken,
    ) -> Result<R, Error>
    where
        Q: Serialize + std::fmt::Debug,
        R: DeserializeOwned,
    {
        let url = self.server.endpoint(path);
        debug!(path, "authenticated query");
        trace!(?params, "query parameters");

        let response = self
            .client
            .get(&url)
            .query(params)
            .headers(auth_headers(token)?)
            .send()
            .await
            .map_err(transport_error)?;

        handle_response(response).await
    }

    /// Authenticated GET without parameters.
    #[instrument(skip(self, token), fields(server = %self.server))]
    pub async fn fetch_authed<R: DeserializeOwned>(
        &self,
        path: &str,
        token: &AuthToken,
    ) -> Result<R, Error> {
        let url = self.server.endpoint(path);
        debug!(path, "authenticated fetch");

        let response = self
            .client
            .get(&url)
            .headers(auth_headers(token)?)
            .send()
            .await
            .map_err(transport_error)?;

        handle_response(response).await
    }

    /// Unauthenticated POST.
    #[instrument(skip(self, body), fields(server = %self.server))]
    pub async fn procedure<B, R>(&self, path: &str, body: &B) -> Result<R, Error>
    where
        B: Serialize,
        R: DeserializeOwned,
    {
        let url = self.server.endpoint(path);
        debug!(path, "procedure");

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;

        handle_response(response).await
    }

    /// Authenticated request with a JSON body and a JSON response.
    #[instrument(skip(self, body, token), fields(server = %self.server))]
    pub async fn procedure_authed<B, R>(
        &self,
        method: Method,
        path: &str,
        body: &B,
        token: &AuthToken,
    ) -> Result<R, Error>
    where
        B: Serialize,
        R: DeserializeOwned,
    {
        let response = self.send_authed(method, path, body, token).await?;
        handle_response(response).await
    }

    /// Authenticated request whose response body is ignored.
    #[instrument(skip(self, body, token), fields(server = %self.server))]
    pub async fn procedure_authed_no_response<B>(
        &self,
        method: Method,
        path: &str,
        body: &B,
        token: &AuthToken,
    ) -> Result<(), Error>
    where
        B: Serialize,
    {
        let response = self.send_authed(method, path, body, token).await?;
        let status = response.status();
        trace!(%status, "response");

        if status.is_success() {
            Ok(())
        } else {
            Err(Error::Protocol(parse_error_response(response).await))
        }
    }

    async fn send_authed<B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: &B,
        token: &AuthToken,
    ) -> Result<reqwest::Response, Error> {
        let url = self.server.endpoint(path);
        debug!(%method, path, "authenticated procedure");

        self.client
            .request(method, &url)
            .json(body)
            .headers(auth_headers(token)?)
            .send()
            .await
            .map_err(transport_error)
    }
}

/// The server expects the bare token, not a `Bearer` scheme. An absent token is sent as "".
fn auth_headers(token: &AuthToken) -> Result<HeaderMap, Error> {
    let value = HeaderValue::from_str(token.as_str()).map_err(|_| InvalidInputError::Other {
        message: "token contains characters not allowed in a header".to_string(),
    })?;

    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, value);
    Ok(headers)
}

async fn handle_response<R: DeserializeOwned>(response: reqwest::Response) -> Result<R, Error> {
    let status = response.status();
    trace!(%status, "response");

    if status.is_success() {
        response.json::<R>().await.map_err(|e| {
            InvalidInputError::Record {
                reason: e.to_string(),
            }
            .into()
        })
    } else {
        Err(Error::Protocol(parse_error_response(response).await))
    }
}

async fn parse_error_response(response: reqwest::Response) -> ProtocolError {
    let status = response.status();

    match response.json::<ErrorResponse>().await {
        Ok(body) => ProtocolError::new(status.as_u16(), body.message),
        Err(_) => ProtocolError::new(
            status.as_u16(),
            status.canonical_reason().map(str::to_string),
        ),
    }
}

/// Classify a reqwest failure as a transport error.
pub(crate) fn transport_error(err: reqwest::Error) -> Error {
    if err.is_timeout() {
        return TransportError::Timeout.into();
    }
    if err.is_connect() {
        return TransportError::Connection {
            message: err.to_string(),
        }
        .into();
    }
    if let Some(status) = err.status().filter(|s| *s != StatusCode::OK) {
        return ProtocolError::new(status.as_u16(), Some(err.to_string())).into();
    }
    TransportError::Http {
        message: err.to_string(),
    }
    .into()
}
