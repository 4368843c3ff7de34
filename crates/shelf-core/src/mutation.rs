//! Pending local writes.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::book::Book;

/// The kind of remote write a mutation replays as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MutationKind {
    /// `POST /books`
    #[serde(rename = "add")]
    Create,
    /// `PUT /books`
    #[serde(rename = "edit")]
    Update,
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MutationKind::Create => f.write_str("add"),
            MutationKind::Update => f.write_str("edit"),
        }
    }
}

/// One write that has not yet been confirmed by the server.
///
/// Persisted as `{"record": {...}, "operation": "add" | "edit"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutationEntry {
    #[serde(alias = "book")]
    pub record: Book,

    #[serde(rename = "operation")]
    pub kind: MutationKind,

    #[serde(
        rename = "queuedAt",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub queued_at: Option<DateTime<Utc>>,
}

impl MutationEntry {
    pub fn new(record: Book, kind: MutationKind) -> Self {
        Self {
            record,
            kind,
            queued_at: Some(Utc::now()),
        }
    }

    pub fn create(record: Book) -> Self {
        Self::new(record, MutationKind::Create)
    }

    pub fn update(record: Book) -> Self {
        Self::new(record, MutationKind::Update)
    }
}
