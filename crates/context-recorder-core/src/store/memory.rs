//! In-memory [`Store`] implementation for testing and embedding.
//!
//! Entries live in a `Vec` behind `std::sync::RwLock`. Saves happen under a
//! single write lock, so readers never observe an entry without its child
//! records. The same constraints as the SQLite schema are enforced: unique
//! ids and non-empty content.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{Result, StorageError};
use crate::models::{new_entry_id, validate_content, ContextEntry};

use super::{Store, CONTENT_SEARCH_LIMIT};

struct Inner {
    entries: Vec<ContextEntry>,
    updated_at: HashMap<String, DateTime<Utc>>,
}

/// In-memory store. Opened on construction.
pub struct InMemoryStore {
    inner: RwLock<Option<Inner>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Some(Inner {
                entries: Vec::new(),
                updated_at: HashMap::new(),
            })),
        }
    }

    /// When the entry's content was last corrected, if ever.
    pub fn updated_at(&self, id: &str) -> Result<Option<DateTime<Utc>>> {
        self.read(|inner| inner.updated_at.get(id).copied())
    }

    fn read<T>(&self, f: impl FnOnce(&Inner) -> T) -> Result<T> {
        let guard = self.inner.read().map_err(poisoned)?;
        guard.as_ref().map(f).ok_or(StorageError::NotInitialized)
    }

    fn write<T>(&self, f: impl FnOnce(&mut Inner) -> Result<T>) -> Result<T> {
        let mut guard = self.inner.write().map_err(poisoned)?;
        guard.as_mut().map(f).unwrap_or(Err(StorageError::NotInitialized))
    }

    fn select(&self, pred: impl Fn(&ContextEntry) -> bool) -> Result<Vec<ContextEntry>> {
        self.read(|inner| newest_first(inner.entries.iter().filter(|e| pred(e)).cloned().collect()))
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<T>(_: PoisonError<T>) -> StorageError {
    StorageError::Unavailable("in-memory store lock poisoned".to_string())
}

fn newest_first(mut entries: Vec<ContextEntry>) -> Vec<ContextEntry> {
    entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    entries
}

#[async_trait]
impl Store for InMemoryStore {
    async fn save(&self, entry: &ContextEntry) -> Result<String> {
        let mut stored = entry.clone().normalized()?;
        if stored.id.is_empty() {
            stored.id = new_entry_id();
        }
        self.write(|inner| {
            if inner.entries.iter().any(|e| e.id == stored.id) {
                return Err(StorageError::ConstraintViolation(format!(
                    "duplicate entry id: {}",
                    stored.id
                )));
            }
            let id = stored.id.clone();
            inner.entries.push(stored);
            Ok(id)
        })
    }

    async fn get(&self, id: &str) -> Result<Option<ContextEntry>> {
        self.read(|inner| inner.entries.iter().find(|e| e.id == id).cloned())
    }

    async fn get_by_file(&self, file_path: &str) -> Result<Vec<ContextEntry>> {
        self.select(|e| e.file_paths().any(|p| p == file_path))
    }

    async fn get_by_commit(&self, commit_hash: &str) -> Result<Vec<ContextEntry>> {
        self.select(|e| e.metadata.commit_hash.as_deref() == Some(commit_hash))
    }

    async fn get_by_date_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ContextEntry>> {
        self.select(|e| e.timestamp >= start && e.timestamp <= end)
    }

    async fn search_by_content(&self, needle: &str) -> Result<Vec<ContextEntry>> {
        let needle = needle.to_lowercase();
        let mut hits = self.select(|e| e.content.to_lowercase().contains(&needle))?;
        hits.truncate(CONTENT_SEARCH_LIMIT);
        Ok(hits)
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        self.write(|inner| {
            let before = inner.entries.len();
            inner.entries.retain(|e| e.id != id);
            inner.updated_at.remove(id);
            Ok(inner.entries.len() != before)
        })
    }

    async fn update_content(&self, id: &str, content: &str) -> Result<bool> {
        validate_content(content)?;
        self.write(|inner| match inner.entries.iter_mut().find(|e| e.id == id) {
            Some(entry) => {
                entry.content = content.to_string();
                inner.updated_at.insert(id.to_string(), Utc::now());
                Ok(true)
            }
            None => Ok(false),
        })
    }

    async fn get_all(&self) -> Result<Vec<ContextEntry>> {
        self.select(|_| true)
    }

    async fn close(&self) {
        if let Ok(mut guard) = self.inner.write() {
            *guard = None;
        }
    }
}
