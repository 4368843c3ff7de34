//! HTTP-backed remote book store.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use tracing::{debug, instrument};

use shelf_core::error::{AuthError, Error};
use shelf_core::traits::Remote;
use shelf_core::{AuthToken, Book, BookQuery, Credentials, Result, ServerUrl};

use crate::client::HttpClient;
use crate::endpoints::*;

/// A [`Remote`] that talks JSON over HTTP to the book server.
#[derive(Debug, Clone)]
pub struct HttpRemote {
    client: HttpClient,
}

impl HttpRemote {
    pub fn new(server: ServerUrl, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: HttpClient::new(server, timeout)?,
        })
    }

    /// Returns the server URL for this instance.
    pub fn server(&self) -> &ServerUrl {
        self.client.server()
    }
}

#[async_trait]
impl Remote for HttpRemote {
    #[instrument(skip(self, credentials), fields(username = credentials.username()))]
    async fn login(&self, credentials: &Credentials) -> Result<AuthToken> {
        let request = LoginRequest {
            username: credentials.username(),
            password: credentials.password(),
        };

        let response: LoginResponse = self
            .client
            .procedure(LOGIN, &request)
            .await
            .map_err(|e| match e {
                Error::Protocol(p) if p.is_auth_error() || p.status == 400 => {
                    AuthError::InvalidCredentials(
                        p.message.unwrap_or_else(|| "login rejected".to_string()),
                    )
                    .into()
                }
                other => other,
            })?;

        debug!("login accepted");
        Ok(AuthToken::new(response.token))
    }

    #[instrument(skip(self, token))]
    async fn check_token(&self, token: &AuthToken) -> Result<bool> {
        let result: Result<CheckTokenResponse> = self
            .client
            .procedure_authed(Method::POST, CHECK_TOKEN, &EmptyBody {}, token)
            .await;

        match result {
            Ok(response) => Ok(response.authenticated),
            Err(Error::Protocol(p)) if p.is_auth_error() => Ok(false),
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self, token))]
    async fn logout(&self, token: &AuthToken) -> Result<()> {
        self.client
            .procedure_authed_no_response(Method::POST, LOGOUT, &EmptyBody {}, token)
            .await
    }

    #[instrument(skip(self, token))]
    async fn list_books(&self, query: &BookQuery, token: &AuthToken) -> Result<Vec<Book>> {
        self.client.query_authed(BOOKS, query, token).await
    }

    #[instrument(skip(self, token))]
    async fn get_book(&self, id: i64, token: &AuthToken) -> Result<Book> {
        self.client.fetch_authed(&book(id), token).await
    }

    #[instrument(skip(self, record, token), fields(title = %record.title))]
    async fn create_book(&self, record: &Book, token: &AuthToken) -> Result<()> {
        self.client
            .procedure_authed_no_response(Method::POST, BOOKS, record, token)
            .await
    }

    #[instrument(skip(self, record, token), fields(id = record.id))]
    async fn update_book(&self, record: &Book, token: &AuthToken) -> Result<()> {
        self.client
            .procedure_authed_no_response(Method::PUT, BOOKS, record, token)
            .await
    }
}
