//! Endpoint paths and request/response types.

use serde::{Deserialize, Serialize};

pub const LOGIN: &str = "/login";
pub const CHECK_TOKEN: &str = "/checkToken";
pub const LOGOUT: &str = "/logout";
pub const BOOKS: &str = "/books";

/// `/books/:id`
pub fn book(id: i64) -> String {
    format!("{}/{}", BOOKS, id)
}

/// Request body for login.
#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

/// Response from login.
#[derive(Debug, Deserialize)]
pub struct LoginResponse {
    pub token: String,
}

/// Response from checkToken.
#[derive(Debug, Deserialize)]
pub struct CheckTokenResponse {
    pub authenticated: bool,
}

/// Empty JSON object, sent where the server expects a body but reads none.
#[derive(Debug, Serialize)]
pub struct EmptyBody {}

/// Error body format.
#[derive(Debug, Deserialize)]
pub struct ErrorResponse {
    pub message: Option<String>,
}
