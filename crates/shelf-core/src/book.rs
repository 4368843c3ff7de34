//! The synchronized record type.

use serde::{Deserialize, Serialize};

use crate::error::{Error, InvalidInputError};

/// A book as stored by the server.
///
/// Identity is `id`. Every other field is replaced as a unit on update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    /// Server-assigned identifier. Ignored by the server on create.
    #[serde(default)]
    pub id: i64,

    pub title: String,

    #[serde(default)]
    pub author: String,

    /// Release date as sent by the server (ISO 8601 date string).
    #[serde(default)]
    pub release_date: String,

    #[serde(default)]
    pub quantity: i64,

    #[serde(default)]
    pub is_rentable: bool,

    /// Base64 image payload. Empty when the book has no picture.
    #[serde(default)]
    pub image: String,

    #[serde(default)]
    pub lat: Option<f64>,

    #[serde(default)]
    pub long: Option<f64>,
}

impl Book {
    /// A book with only a title set.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: 0,
            title: title.into(),
            author: String::new(),
            release_date: String::new(),
            quantity: 0,
            is_rentable: false,
            image: String::new(),
            lat: None,
            long: None,
        }
    }

    /// Decode a book from a JSON value.
    pub fn from_value(value: serde_json::Value) -> Result<Self, Error> {
        serde_json::from_value(value).map_err(|e| {
            InvalidInputError::Record {
                reason: e.to_string(),
            }
            .into()
        })
    }

    /// The geolocation, when both coordinates are present.
    pub fn location(&self) -> Option<(f64, f64)> {
        self.lat.zip(self.long)
    }
}

/// Query parameters for one page of the book list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookQuery {
    /// 1-based page number.
    pub page: u32,
    pub limit: u32,
    /// Title filter. Empty means no filter.
    pub title: String,
}

impl BookQuery {
    pub fn first(limit: u32, title: impl Into<String>) -> Self {
        Self {
            page: 1,
            limit,
            title: title.into(),
        }
    }

    /// The query for the page after this one.
    pub fn next(&self) -> Self {
        Self {
            page: self.page + 1,
            ..self.clone()
        }
    }
}
