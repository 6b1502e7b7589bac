//! Storage abstraction for Context Recorder.
//!
//! The [`Store`] trait is the storage engine contract: the sole authority
//! for entry existence. The search index, timelines and analytics are all
//! derived from it and can be rebuilt from it at any time.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::ContextEntry;

/// Result cap for [`Store::search_by_content`].
pub const CONTENT_SEARCH_LIMIT: usize = 100;

/// Durable, queryable persistence for context entries.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`save`](Store::save) | Insert an entry and its child rows atomically |
/// | [`get`](Store::get) | Reconstruct one entry by id |
/// | [`get_by_file`](Store::get_by_file) | Entries associated with a file path |
/// | [`get_by_commit`](Store::get_by_commit) | Entries for a commit hash |
/// | [`get_by_date_range`](Store::get_by_date_range) | Entries within inclusive bounds |
/// | [`search_by_content`](Store::search_by_content) | Naive substring fallback search |
/// | [`delete`](Store::delete) | Hard delete, cascading to child rows |
/// | [`update_content`](Store::update_content) | Content-only correction |
/// | [`get_all`](Store::get_all) | Full corpus scan |
/// | [`close`](Store::close) | Release the underlying handle |
///
/// Every list-returning operation orders by timestamp, newest first. After
/// [`close`](Store::close), every operation fails with
/// [`StorageError::NotInitialized`](crate::error::StorageError::NotInitialized).
#[async_trait]
pub trait Store: Send + Sync {
    /// Insert an entry together with its file associations, tags, links and
    /// related items as one atomic unit.
    ///
    /// An empty `id` is replaced with a freshly generated one. Tags are
    /// stored normalized (see [`ContextEntry::normalized`]); blank content is
    /// a constraint violation. Returns the id the entry was stored under.
    async fn save(&self, entry: &ContextEntry) -> Result<String>;

    /// Reconstruct a full entry. Unknown ids yield `Ok(None)`.
    async fn get(&self, id: &str) -> Result<Option<ContextEntry>>;

    /// Entries with an association whose path equals `file_path` exactly.
    async fn get_by_file(&self, file_path: &str) -> Result<Vec<ContextEntry>>;

    async fn get_by_commit(&self, commit_hash: &str) -> Result<Vec<ContextEntry>>;

    /// Entries with `start <= timestamp <= end`.
    async fn get_by_date_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ContextEntry>>;

    /// Case-insensitive substring match on content, capped at
    /// [`CONTENT_SEARCH_LIMIT`]. Works without the search index.
    async fn search_by_content(&self, needle: &str) -> Result<Vec<ContextEntry>>;

    /// Returns whether a row existed.
    async fn delete(&self, id: &str) -> Result<bool>;

    /// Replace `content` and touch the update marker. No other field changes.
    /// Blank content is a constraint violation. Returns whether a row existed.
    async fn update_content(&self, id: &str, content: &str) -> Result<bool>;

    /// Every stored entry, complete and unpaginated.
    async fn get_all(&self) -> Result<Vec<ContextEntry>>;

    /// Release the storage handle. Idempotent.
    async fn close(&self);
}
