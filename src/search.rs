//! Relevance reads: `ccr search`, `ccr suggest` and `ccr related`.
//!
//! All three go through the in-memory index, which is built from the
//! database on first use in each process.

use anyhow::{Context, Result};
use regex_lite::Regex;

use context_recorder_core::models::ContextType;
use context_recorder_core::search::SearchOptions;

use crate::config::Config;
use crate::render;
use crate::sqlite_store::open_recorder;

/// Structured filters accepted by `ccr search`, as given on the command line.
#[derive(Debug, Clone, Default)]
pub struct SearchFilters {
    /// Regular expression matched against associated file paths.
    pub file: Option<String>,
    pub types: Vec<String>,
    pub tags: Vec<String>,
    pub author: Option<String>,
    /// Inclusive `YYYY-MM-DD` bounds.
    pub since: Option<String>,
    pub until: Option<String>,
    pub limit: Option<usize>,
}

impl SearchFilters {
    pub fn to_options(&self) -> Result<SearchOptions> {
        let file_pattern = self
            .file
            .as_deref()
            .map(|p| Regex::new(p).with_context(|| format!("invalid file pattern: {}", p)))
            .transpose()?;

        let types = self
            .types
            .iter()
            .map(|t| t.parse::<ContextType>())
            .collect::<Result<Vec<_>, _>>()?;

        let date_range = render::parse_range(self.since.as_deref(), self.until.as_deref())?;

        Ok(SearchOptions {
            file_pattern,
            types,
            tags: self.tags.clone(),
            author: self.author.clone(),
            date_range,
            limit: self.limit,
        })
    }
}

pub async fn run_search(config: &Config, query: &str, filters: &SearchFilters, json: bool) -> Result<()> {
    let options = filters.to_options()?;
    let mut recorder = open_recorder(config).await?;

    // Tags alone: search for the tag words and keep entries carrying one.
    let results = if query.trim().is_empty() && !filters.tags.is_empty() {
        recorder.search_by_tags(&filters.tags).await?
    } else {
        recorder.search(query, &options).await?
    };
    recorder.close().await;

    if json {
        render::print_json(&results)
    } else {
        render::print_entries(&results);
        Ok(())
    }
}

pub async fn run_suggest(config: &Config, partial: &str, limit: Option<usize>, json: bool) -> Result<()> {
    let limit = limit.unwrap_or(config.retrieval.suggest_limit);
    let mut recorder = open_recorder(config).await?;
    let suggestions = recorder.suggest(partial, limit).await?;
    recorder.close().await;

    if json {
        return render::print_json(&suggestions);
    }
    for s in &suggestions {
        println!("{}", s);
    }
    Ok(())
}

pub async fn run_related(config: &Config, id: &str, limit: Option<usize>, json: bool) -> Result<()> {
    let limit = limit.unwrap_or(config.retrieval.related_limit);
    let mut recorder = open_recorder(config).await?;
    let related = recorder.find_related(id, limit).await?;
    recorder.close().await;

    if json {
        render::print_json(&related)
    } else {
        render::print_entries(&related);
        Ok(())
    }
}
