//! Remote book API trait.

use async_trait::async_trait;

use crate::book::{Book, BookQuery};
use crate::{AuthToken, Credentials, Result};

/// The book server's request/response contract.
///
/// Every call except [`Remote::login`] carries the current token.
#[async_trait]
pub trait Remote: Send + Sync {
    /// `POST /login`
    async fn login(&self, credentials: &Credentials) -> Result<AuthToken>;

    /// `POST /checkToken`
    async fn check_token(&self, token: &AuthToken) -> Result<bool>;

    /// `POST /logout`
    async fn logout(&self, token: &AuthToken) -> Result<()>;

    /// `GET /books?page&limit&title`
    async fn list_books(&self, query: &BookQuery, token: &AuthToken) -> Result<Vec<Book>>;

    /// `GET /books/:id`
    async fn get_book(&self, id: i64, token: &AuthToken) -> Result<Book>;

    /// `POST /books`. The server assigns the id.
    async fn create_book(&self, book: &Book, token: &AuthToken) -> Result<()>;

    /// `PUT /books`. The id selects the book to replace.
    async fn update_book(&self, book: &Book, token: &AuthToken) -> Result<()>;
}
