//! In-memory views of the book collection.
//!
//! Nothing here is persisted. A view lives as long as the screen (or command)
//! that shows it and is rebuilt from the server on the next mount.

use std::sync::Arc;

use tracing::{debug, instrument};

use shelf_core::traits::Remote;
use shelf_core::{AuthToken, Book, BookQuery, PushEvent, Result};

use crate::channel::PushSubscription;
use crate::session::AuthSession;

/// The ordered collection plus an optional single-record detail.
///
/// Local writes never touch this directly; it converges through fetches and
/// pushed events.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocalCache {
    books: Vec<Book>,
    detail: Option<Book>,
}

impl LocalCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn books(&self) -> &[Book] {
        &self.books
    }

    pub fn detail(&self) -> Option<&Book> {
        self.detail.as_ref()
    }

    pub fn set_detail(&mut self, book: Option<Book>) {
        self.detail = book;
    }

    /// Append one fetched page.
    pub fn append_page(&mut self, page: Vec<Book>) {
        self.books.extend(page);
    }

    pub fn clear(&mut self) {
        self.books.clear();
    }

    /// Merge a pushed event. Returns whether anything changed.
    ///
    /// `created` replaces an entry with the same id in place, otherwise appends.
    /// `updated` replaces matching entries in the collection and the detail;
    /// an id that is not present is ignored.
    pub fn apply(&mut self, event: &PushEvent) -> bool {
        match event {
            PushEvent::Created(book) => {
                match self.books.iter_mut().find(|b| b.id == book.id) {
                    Some(existing) => *existing = book.clone(),
                    None => self.books.push(book.clone()),
                }
                true
            }
            PushEvent::Updated(book) => {
                let mut changed = false;
                if let Some(existing) = self.books.iter_mut().find(|b| b.id == book.id) {
                    *existing = book.clone();
                    changed = true;
                }
                if let Some(detail) = self.detail.as_mut().filter(|d| d.id == book.id) {
                    *detail = book.clone();
                    changed = true;
                }
                changed
            }
            PushEvent::Unknown { .. } => false,
        }
    }

    /// Merge into the detail only; a detail view has no collection to append to.
    fn apply_detail(&mut self, event: &PushEvent) -> bool {
        match event {
            PushEvent::Updated(_) => self.apply(event),
            _ => false,
        }
    }
}

fn token_or_empty(auth: &AuthSession) -> AuthToken {
    auth.token().unwrap_or_else(|| AuthToken::new(""))
}

/// A paged, searchable list that follows pushed events.
pub struct BookListView {
    remote: Arc<dyn Remote>,
    auth: AuthSession,
    events: PushSubscription,
    cache: LocalCache,
    next_query: BookQuery,
    has_more: bool,
}

impl BookListView {
    /// An empty view; call [`load_next_page`](Self::load_next_page) to fill it.
    pub fn new(
        remote: Arc<dyn Remote>,
        auth: AuthSession,
        events: PushSubscription,
        limit: u32,
    ) -> Self {
        Self {
            remote,
            auth,
            events,
            cache: LocalCache::new(),
            next_query: BookQuery::first(limit, ""),
            has_more: true,
        }
    }

    pub fn books(&self) -> &[Book] {
        self.cache.books()
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn title_filter(&self) -> &str {
        &self.next_query.title
    }

    /// Fetch and append the next page. Returns how many books it added.
    ///
    /// On error the collection is left as it was.
    #[instrument(skip(self), fields(page = self.next_query.page, title = %self.next_query.title))]
    pub async fn load_next_page(&mut self) -> Result<usize> {
        if !self.has_more {
            return Ok(0);
        }

        let token = token_or_empty(&self.auth);
        let page = self.remote.list_books(&self.next_query, &token).await?;
        let count = page.len();

        self.has_more = count == self.next_query.limit as usize;
        self.cache.append_page(page);
        self.next_query = self.next_query.next();

        debug!(count, has_more = self.has_more, "Loaded page");
        Ok(count)
    }

    /// Start over from page 1 with a new title filter.
    pub async fn search(&mut self, title: impl Into<String>) -> Result<usize> {
        self.reset(title);
        self.load_next_page().await
    }

    /// Clear the collection and rewind to page 1 without fetching.
    pub fn reset(&mut self, title: impl Into<String>) {
        self.cache.clear();
        self.next_query = BookQuery::first(self.next_query.limit, title);
        self.has_more = true;
    }

    pub fn apply(&mut self, event: &PushEvent) -> bool {
        self.cache.apply(event)
    }

    /// Wait for the next pushed event and merge it.
    pub async fn next_event(&mut self) -> Option<PushEvent> {
        let event = self.events.recv().await?;
        self.cache.apply(&event);
        Some(event)
    }

    /// Merge every event already waiting. Returns how many were merged.
    pub fn drain_events(&mut self) -> usize {
        let mut merged = 0;
        while let Some(event) = self.events.try_recv() {
            self.cache.apply(&event);
            merged += 1;
        }
        merged
    }
}

impl std::fmt::Debug for BookListView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BookListView")
            .field("books", &self.cache.books().len())
            .field("next_query", &self.next_query)
            .field("has_more", &self.has_more)
            .finish()
    }
}

/// A single book that follows pushed updates for its id.
#[derive(Debug)]
pub struct BookDetailView {
    events: PushSubscription,
    cache: LocalCache,
}

impl BookDetailView {
    #[instrument(skip(remote, auth, events))]
    pub async fn open(
        remote: Arc<dyn Remote>,
        auth: &AuthSession,
        events: PushSubscription,
        id: i64,
    ) -> Result<Self> {
        let book = remote.get_book(id, &token_or_empty(auth)).await?;

        let mut cache = LocalCache::new();
        cache.set_detail(Some(book));
        Ok(Self { events, cache })
    }

    pub fn book(&self) -> Option<&Book> {
        self.cache.detail()
    }

    pub fn apply(&mut self, event: &PushEvent) -> bool {
        self.cache.apply_detail(event)
    }

    pub async fn next_event(&mut self) -> Option<PushEvent> {
        let event = self.events.recv().await?;
        self.cache.apply_detail(&event);
        Some(event)
    }

    pub fn drain_events(&mut self) -> usize {
        let mut merged = 0;
        while let Some(event) = self.events.try_recv() {
            self.cache.apply_detail(&event);
            merged += 1;
        }
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book(id: i64, title: &str) -> Book {
        Book {
            id,
            ..Book::new(title)
        }
    }

    #[test]
    fn updated_replaces_matching_id() {
        let mut cache = LocalCache::new();
        cache.append_page(vec![book(1, "A")]);

        assert!(cache.apply(&PushEvent::Updated(book(1, "B"))));
        assert_eq!(cache.books(), &[book(1, "B")]);
    }

    #[test]
    fn updated_for_absent_id_is_ignored() {
        let mut cache = LocalCache::new();
        cache.append_page(vec![book(1, "A")]);

        assert!(!cache.apply(&PushEvent::Updated(book(2, "B"))));
        assert_eq!(cache.books(), &[book(1, "A")]);
    }

    #[test]
    fn created_appends_new_and_replaces_known() {
        let mut cache = LocalCache::new();
        cache.append_page(vec![book(1, "A"), book(2, "B")]);

        cache.apply(&PushEvent::Created(book(3, "C")));
        cache.apply(&PushEvent::Created(book(2, "B2")));

        assert_eq!(cache.books(), &[book(1, "A"), book(2, "B2"), book(3, "C")]);
    }

    #[test]
    fn updated_reaches_detail() {
        let mut cache = LocalCache::new();
        cache.set_detail(Some(book(7, "Old")));

        assert!(cache.apply(&PushEvent::Updated(book(7, "New"))));
        assert_eq!(cache.detail(), Some(&book(7, "New")));

        assert!(!cache.apply(&PushEvent::Updated(book(8, "Other"))));
        assert_eq!(cache.detail(), Some(&book(7, "New")));
    }

    #[test]
    fn detail_ignores_created() {
        let mut cache = LocalCache::new();
        cache.set_detail(Some(book(7, "Old")));

        assert!(!cache.apply_detail(&PushEvent::Created(book(9, "New"))));
        assert!(cache.books().is_empty());
    }

    #[test]
    fn unknown_is_noop() {
        let mut cache = LocalCache::new();
        assert!(!cache.apply(&PushEvent::Unknown {
            kind: "deleted".to_string()
        }));
    }
}
