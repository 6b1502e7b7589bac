//! Retrieval service: fuzzy search with structured filters, plus the
//! filter-only accessors that bypass the index.
//!
//! # Search pipeline
//!
//! 1. Query the [`SearchIndex`] (building it first if cold) for up to
//!    `limit` ids, most relevant first.
//! 2. Hydrate each id through [`Store::get`]; ids the store no longer knows
//!    are dropped.
//! 3. Keep entries that pass every supplied filter in [`SearchOptions`].
//!
//! Recency, author, timeline and analytics reads scan the store directly:
//! their ordering or matching rules (newest first, exact author equality)
//! are not relevance questions.

use chrono::{DateTime, Utc};
use regex_lite::Regex;
use tracing::warn;

use crate::analytics::{self, AnalyticsData};
use crate::error::Result;
use crate::index::{IndexOptions, SearchIndex};
use crate::models::{ContextEntry, ContextType, Timeline, TimelineEntry};
use crate::store::Store;

/// Search limit applied when [`SearchOptions::limit`] is unset.
pub const DEFAULT_SEARCH_LIMIT: usize = 50;

/// Structured filters for [`Retrieval::search`]. Unset filters match
/// everything; set filters are ANDed.
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    /// Matches if any file association path matches.
    pub file_pattern: Option<Regex>,
    /// Matches if the entry type is one of these.
    pub types: Vec<ContextType>,
    /// Matches if the entry carries any of these tags.
    pub tags: Vec<String>,
    /// Exact author equality.
    pub author: Option<String>,
    /// Inclusive timestamp bounds.
    pub date_range: Option<(DateTime<Utc>, DateTime<Utc>)>,
    /// Number of index hits to consider before filtering.
    pub limit: Option<usize>,
}

impl SearchOptions {
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_tags<I, T>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Whether `entry` passes every set filter.
    pub fn matches(&self, entry: &ContextEntry) -> bool {
        if let Some(pattern) = &self.file_pattern {
            if !entry.file_paths().any(|p| pattern.is_match(p)) {
                return false;
            }
        }
        if !self.types.is_empty() && !self.types.contains(&entry.entry_type) {
            return false;
        }
        if !self.tags.is_empty() && !self.tags.iter().any(|t| entry.has_tag(t)) {
            return false;
        }
        if let Some(author) = &self.author {
            if entry.author() != Some(author.as_str()) {
                return false;
            }
        }
        if let Some((start, end)) = self.date_range {
            if entry.timestamp < start || entry.timestamp > end {
                return false;
            }
        }
        true
    }
}

/// Composes a [`Store`] with its derived [`SearchIndex`].
///
/// Index-touching operations take `&mut self`: the index has a single
/// writer, and the borrow checker enforces it.
pub struct Retrieval<S: Store> {
    store: S,
    index: SearchIndex,
    default_limit: usize,
}

impl<S: Store> Retrieval<S> {
    pub fn new(store: S, options: IndexOptions) -> Self {
        Self {
            store,
            index: SearchIndex::new(options),
            default_limit: DEFAULT_SEARCH_LIMIT,
        }
    }

    pub fn with_default_limit(mut self, limit: usize) -> Self {
        self.default_limit = limit;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn index(&self) -> &SearchIndex {
        &self.index
    }

    pub fn index_mut(&mut self) -> &mut SearchIndex {
        &mut self.index
    }

    /// Discard the index and rebuild it from the store.
    pub async fn rebuild_index(&mut self) -> Result<usize> {
        self.index.build(&self.store).await
    }

    /// Free-text search narrowed by `options`.
    pub async fn search(&mut self, query: &str, options: &SearchOptions) -> Result<Vec<ContextEntry>> {
        let limit = options.limit.unwrap_or(self.default_limit);
        let hits = self.index.search(&self.store, query, limit).await?;

        let mut results = Vec::with_capacity(hits.len());
        for hit in hits {
            match self.store.get(&hit.id).await? {
                Some(entry) => {
                    if options.matches(&entry) {
                        results.push(entry);
                    }
                }
                None => warn!(id = %hit.id, "index hit missing from store"),
            }
        }
        Ok(results)
    }

    /// Entries similar to `id`, found by searching with its own content.
    /// Unknown ids yield no results.
    pub async fn find_related(&mut self, id: &str, limit: usize) -> Result<Vec<ContextEntry>> {
        let Some(target) = self.store.get(id).await? else {
            return Ok(Vec::new());
        };
        let options = SearchOptions::default().with_limit(limit + 1);
        let mut related = self.search(&target.content, &options).await?;
        related.retain(|e| e.id != id);
        related.truncate(limit);
        Ok(related)
    }

    /// Search for the tags as text, keeping entries that carry any of them.
    pub async fn search_by_tags(&mut self, tags: &[String]) -> Result<Vec<ContextEntry>> {
        let options = SearchOptions::default().with_tags(tags.iter().cloned());
        self.search(&tags.join(" "), &options).await
    }

    pub async fn suggest(&mut self, partial: &str, limit: usize) -> Result<Vec<String>> {
        self.index.suggest(&self.store, partial, limit).await
    }

    /// Newest entries first.
    pub async fn get_recent(&self, limit: usize) -> Result<Vec<ContextEntry>> {
        let mut all = self.store.get_all().await?;
        all.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        all.truncate(limit);
        Ok(all)
    }

    /// Entries whose author equals `author` exactly.
    pub async fn get_by_author(&self, author: &str) -> Result<Vec<ContextEntry>> {
        let mut all = self.store.get_all().await?;
        all.retain(|e| e.author() == Some(author));
        Ok(all)
    }

    pub async fn get_file_timeline(&self, file_path: &str) -> Result<Timeline> {
        let entries: Vec<TimelineEntry> = self
            .store
            .get_by_file(file_path)
            .await?
            .into_iter()
            .map(TimelineEntry::from)
            .collect();
        Ok(Timeline {
            file_path: file_path.to_string(),
            total_entries: entries.len(),
            entries,
        })
    }

    pub async fn get_analytics(&self) -> Result<AnalyticsData> {
        let all = self.store.get_all().await?;
        Ok(analytics::compute(&all, Utc::now()))
    }
}
