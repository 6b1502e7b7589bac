//! The [`Recorder`] facade: the single entry point that frontends use.
//!
//! Writes go to the store first and then update the index, as one
//! caller-owned sequence. If the process dies between the two steps
//! nothing is lost: the index is rebuilt from the store on next use.
//! Listeners registered with [`Recorder::subscribe`] are notified after
//! each completed write.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::analytics::AnalyticsData;
use crate::error::Result;
use crate::events::{EventListener, RecorderEvent};
use crate::index::{IndexOptions, IndexState};
use crate::models::{ContextEntry, Timeline};
use crate::search::{Retrieval, SearchOptions};
use crate::store::Store;

/// Outcome of [`Recorder::import`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub imported: usize,
    /// Entries whose id was already stored.
    pub skipped: usize,
}

pub struct Recorder<S: Store> {
    retrieval: Retrieval<S>,
    listeners: Vec<Box<dyn EventListener>>,
}

impl<S: Store> Recorder<S> {
    pub fn new(store: S, options: IndexOptions) -> Self {
        Self {
            retrieval: Retrieval::new(store, options),
            listeners: Vec::new(),
        }
    }

    /// Override the search limit used when a query sets none.
    pub fn with_default_limit(mut self, limit: usize) -> Self {
        self.retrieval = self.retrieval.with_default_limit(limit);
        self
    }

    pub fn subscribe(&mut self, listener: impl EventListener + 'static) {
        self.listeners.push(Box::new(listener));
    }

    pub fn store(&self) -> &S {
        self.retrieval.store()
    }

    pub fn index_state(&self) -> IndexState {
        self.retrieval.index().state()
    }

    /// Persist `entry` and index it. Returns the stored id.
    ///
    /// The entry is normalized first, so the index sees the same tags the
    /// store keeps.
    pub async fn add(&mut self, entry: ContextEntry) -> Result<String> {
        let mut entry = entry.normalized()?;
        let id = self.retrieval.store().save(&entry).await?;
        entry.id = id.clone();
        self.retrieval.index_mut().add_document(&entry);
        debug!(id = %id, kind = %entry.entry_type, "entry recorded");
        self.emit(RecorderEvent::EntryAdded { id: id.clone() });
        Ok(id)
    }

    pub async fn get(&self, id: &str) -> Result<Option<ContextEntry>> {
        self.retrieval.store().get(id).await
    }

    /// Hard delete. Returns whether the entry existed.
    pub async fn delete(&mut self, id: &str) -> Result<bool> {
        let deleted = self.retrieval.store().delete(id).await?;
        if deleted {
            self.retrieval.index_mut().remove_document(id);
            self.emit(RecorderEvent::EntryDeleted { id: id.to_string() });
        }
        Ok(deleted)
    }

    /// Correct an entry's content. Returns whether the entry existed.
    pub async fn update_content(&mut self, id: &str, content: &str) -> Result<bool> {
        let updated = self.retrieval.store().update_content(id, content).await?;
        if updated && self.index_state() == IndexState::Ready {
            if let Some(entry) = self.retrieval.store().get(id).await? {
                self.retrieval.index_mut().add_document(&entry);
            }
        }
        Ok(updated)
    }

    /// Discard the index and rebuild it from the store.
    pub async fn rebuild_index(&mut self) -> Result<usize> {
        let documents = self.retrieval.rebuild_index().await?;
        self.emit(RecorderEvent::IndexRebuilt { documents });
        Ok(documents)
    }

    pub async fn search(&mut self, query: &str, options: &SearchOptions) -> Result<Vec<ContextEntry>> {
        let cold = self.index_state() != IndexState::Ready;
        let results = self.retrieval.search(query, options).await?;
        self.after_query(cold);
        Ok(results)
    }

    pub async fn find_related(&mut self, id: &str, limit: usize) -> Result<Vec<ContextEntry>> {
        let cold = self.index_state() != IndexState::Ready;
        let results = self.retrieval.find_related(id, limit).await?;
        self.after_query(cold);
        Ok(results)
    }

    pub async fn search_by_tags(&mut self, tags: &[String]) -> Result<Vec<ContextEntry>> {
        let cold = self.index_state() != IndexState::Ready;
        let results = self.retrieval.search_by_tags(tags).await?;
        self.after_query(cold);
        Ok(results)
    }

    pub async fn suggest(&mut self, partial: &str, limit: usize) -> Result<Vec<String>> {
        let cold = self.index_state() != IndexState::Ready;
        let results = self.retrieval.suggest(partial, limit).await?;
        self.after_query(cold);
        Ok(results)
    }

    pub async fn search_by_content(&self, needle: &str) -> Result<Vec<ContextEntry>> {
        self.retrieval.store().search_by_content(needle).await
    }

    pub async fn get_recent(&self, limit: usize) -> Result<Vec<ContextEntry>> {
        self.retrieval.get_recent(limit).await
    }

    pub async fn get_by_author(&self, author: &str) -> Result<Vec<ContextEntry>> {
        self.retrieval.get_by_author(author).await
    }

    pub async fn get_by_commit(&self, commit_hash: &str) -> Result<Vec<ContextEntry>> {
        self.retrieval.store().get_by_commit(commit_hash).await
    }

    pub async fn get_by_date_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ContextEntry>> {
        self.retrieval.store().get_by_date_range(start, end).await
    }

    pub async fn get_file_timeline(&self, file_path: &str) -> Result<Timeline> {
        self.retrieval.get_file_timeline(file_path).await
    }

    pub async fn get_analytics(&self) -> Result<AnalyticsData> {
        self.retrieval.get_analytics().await
    }

    /// The full corpus, newest first: the export/interchange format.
    pub async fn export(&self) -> Result<Vec<ContextEntry>> {
        self.retrieval.store().get_all().await
    }

    /// Add exported entries, skipping ids that are already stored.
    pub async fn import(&mut self, entries: Vec<ContextEntry>) -> Result<ImportSummary> {
        let mut summary = ImportSummary::default();
        for entry in entries {
            if !entry.id.is_empty() && self.get(&entry.id).await?.is_some() {
                summary.skipped += 1;
                continue;
            }
            self.add(entry).await?;
            summary.imported += 1;
        }
        Ok(summary)
    }

    /// Release the store and discard the index. Every later store call
    /// fails with `NotInitialized`.
    pub async fn close(&mut self) {
        self.retrieval.store().close().await;
        self.retrieval.index_mut().reset();
    }

    fn after_query(&self, was_cold: bool) {
        if was_cold && self.index_state() == IndexState::Ready {
            self.emit(RecorderEvent::IndexRebuilt {
                documents: self.retrieval.index().len(),
            });
        }
    }

    fn emit(&self, event: RecorderEvent) {
        for listener in &self.listeners {
            listener.on_event(&event);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::error::StorageError;
    use crate::models::{ContextSource, ContextType};
    use crate::store::memory::InMemoryStore;

    fn note(content: &str) -> ContextEntry {
        ContextEntry::new(ContextType::Text, content, ContextSource::Cli).unwrap()
    }

    fn recorder() -> Recorder<InMemoryStore> {
        Recorder::new(InMemoryStore::new(), IndexOptions::default())
    }

    fn record_events(recorder: &mut Recorder<InMemoryStore>) -> Arc<Mutex<Vec<RecorderEvent>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        recorder.subscribe(move |event: &RecorderEvent| sink.lock().unwrap().push(event.clone()));
        seen
    }

    #[tokio::test]
    async fn test_add_then_get() {
        let mut rec = recorder();
        let id = rec.add(note("explain the retry loop")).await.unwrap();
        let stored = rec.get(&id).await.unwrap().unwrap();
        assert_eq!(stored.content, "explain the retry loop");
    }

    #[tokio::test]
    async fn test_events_follow_writes() {
        let mut rec = recorder();
        let seen = record_events(&mut rec);

        let id = rec.add(note("first")).await.unwrap();
        assert!(rec.delete(&id).await.unwrap());
        assert!(!rec.delete(&id).await.unwrap());

        let events = seen.lock().unwrap().clone();
        assert_eq!(
            events,
            vec![
                RecorderEvent::EntryAdded { id: id.clone() },
                RecorderEvent::EntryDeleted { id },
            ]
        );
    }

    #[tokio::test]
    async fn test_lazy_build_reports_rebuild_once() {
        let mut rec = recorder();
        rec.add(note("alpha beta")).await.unwrap();
        rec.add(note("beta gamma")).await.unwrap();
        let seen = record_events(&mut rec);

        assert_eq!(rec.index_state(), IndexState::Empty);
        let hits = rec.search("beta", &SearchOptions::default()).await.unwrap();
        assert_eq!(hits.len(), 2);
        rec.search("gamma", &SearchOptions::default()).await.unwrap();

        let events = seen.lock().unwrap().clone();
        assert_eq!(events, vec![RecorderEvent::IndexRebuilt { documents: 2 }]);
    }

    #[tokio::test]
    async fn test_add_and_delete_keep_index_in_sync() {
        let mut rec = recorder();
        let mut ids = Vec::new();
        for i in 0..5 {
            ids.push(rec.add(note(&format!("parser change {i}"))).await.unwrap());
        }
        assert_eq!(rec.rebuild_index().await.unwrap(), 5);

        rec.delete(&ids[2]).await.unwrap();
        let hits = rec.search("parser", &SearchOptions::default()).await.unwrap();
        assert_eq!(hits.len(), 4);
        assert!(hits.iter().all(|e| e.id != ids[2]));

        let id = rec.add(note("parser rewrite")).await.unwrap();
        let hits = rec.search("rewrite", &SearchOptions::default()).await.unwrap();
        assert_eq!(hits[0].id, id);
    }

    #[tokio::test]
    async fn test_update_content_reindexes() {
        let mut rec = recorder();
        let id = rec.add(note("connection pool leak")).await.unwrap();
        rec.rebuild_index().await.unwrap();

        assert!(rec.update_content(&id, "socket timeout tuning").await.unwrap());
        let old = rec.search("leak", &SearchOptions::default()).await.unwrap();
        assert!(old.is_empty());
        let new = rec.search("socket", &SearchOptions::default()).await.unwrap();
        assert_eq!(new.len(), 1);
        assert_eq!(new[0].content, "socket timeout tuning");

        assert!(!rec.update_content("missing", "x").await.unwrap());
    }

    #[tokio::test]
    async fn test_import_skips_existing_ids() {
        let mut source = recorder();
        source.add(note("one")).await.unwrap();
        source.add(note("two")).await.unwrap();
        let exported = source.export().await.unwrap();

        let mut target = recorder();
        target.add(exported[0].clone()).await.unwrap();
        let summary = target.import(exported).await.unwrap();
        assert_eq!(summary, ImportSummary { imported: 1, skipped: 1 });
        assert_eq!(target.export().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_import_normalizes_tags_and_rejects_blank_content() {
        let raw = r#"[
            {"id":"a1","timestamp":"2024-03-01T10:00:00Z","type":"text",
             "content":"null check in parser","source":"cli",
             "tags":["bug-fix"," bug-fix","bug-fix ","parser"]},
            {"id":"a2","timestamp":"2024-03-02T10:00:00Z","type":"text",
             "content":"   ","source":"cli","tags":["bug-fix"]}
        ]"#;
        let entries: Vec<ContextEntry> = serde_json::from_str(raw).unwrap();

        let mut rec = recorder();
        rec.rebuild_index().await.unwrap();
        let err = rec.import(entries).await.unwrap_err();
        assert!(matches!(err, StorageError::ConstraintViolation(_)), "{:?}", err);

        let stored = rec.get("a1").await.unwrap().unwrap();
        assert_eq!(stored.tags, vec!["bug-fix".to_string(), "parser".to_string()]);
        assert_eq!(rec.get("a2").await.unwrap(), None);

        let hits = rec.search_by_tags(&["bug-fix".to_string()]).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].tags, stored.tags);
    }

    #[tokio::test]
    async fn test_close_rejects_later_calls() {
        let mut rec = recorder();
        rec.add(note("kept")).await.unwrap();
        rec.search("kept", &SearchOptions::default()).await.unwrap();

        rec.close().await;
        assert_eq!(rec.index_state(), IndexState::Empty);
        assert_eq!(rec.get_recent(5).await.unwrap_err(), StorageError::NotInitialized);
        assert_eq!(rec.add(note("late")).await.unwrap_err(), StorageError::NotInitialized);
    }
}
