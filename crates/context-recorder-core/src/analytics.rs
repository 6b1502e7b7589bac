//! Aggregate analytics over the full corpus.
//!
//! A snapshot is computed in a single pass and never persisted. "Now" is a
//! parameter so the trailing window can be tested deterministically.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;

use crate::models::{ContextEntry, ContextType};

/// How many files [`AnalyticsData::most_contexted_files`] keeps.
pub const TOP_FILES: usize = 10;
/// How many authors [`AnalyticsData::top_authors`] keeps.
pub const TOP_AUTHORS: usize = 5;
/// Length of the trend window in calendar days, today included.
pub const TREND_DAYS: i64 = 30;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsData {
    pub total_contexts: usize,
    pub contexts_by_type: BTreeMap<ContextType, usize>,
    pub most_contexted_files: Vec<FileCount>,
    /// Per-day entry counts for the trailing window, oldest day first.
    pub context_trend: Vec<DayCount>,
    /// `total_contexts / number of commit entries`, or 0 with no commits.
    pub average_contexts_per_commit: f64,
    pub top_authors: Vec<AuthorCount>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileCount {
    pub file: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayCount {
    pub date: NaiveDate,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorCount {
    pub author: String,
    pub count: usize,
}

/// Fold `entries` into an analytics snapshot as of `now`.
///
/// The trend window covers the [`TREND_DAYS`] UTC calendar days ending on
/// `now`'s date; entries dated after `now`'s date are not bucketed.
pub fn compute(entries: &[ContextEntry], now: DateTime<Utc>) -> AnalyticsData {
    let today = now.date_naive();
    let window_start = today - Duration::days(TREND_DAYS - 1);

    let mut by_type: BTreeMap<ContextType, usize> = BTreeMap::new();
    let mut by_file: HashMap<&str, usize> = HashMap::new();
    let mut by_author: HashMap<&str, usize> = HashMap::new();
    let mut by_day: BTreeMap<NaiveDate, usize> = BTreeMap::new();
    let mut commits = 0usize;

    for entry in entries {
        *by_type.entry(entry.entry_type).or_insert(0) += 1;
        if entry.entry_type == ContextType::Commit {
            commits += 1;
        }
        for path in entry.file_paths() {
            *by_file.entry(path).or_insert(0) += 1;
        }
        if let Some(author) = entry.author() {
            *by_author.entry(author).or_insert(0) += 1;
        }
        let day = entry.timestamp.date_naive();
        if day >= window_start && day <= today {
            *by_day.entry(day).or_insert(0) += 1;
        }
    }

    let average_contexts_per_commit = if commits > 0 {
        entries.len() as f64 / commits as f64
    } else {
        0.0
    };

    AnalyticsData {
        total_contexts: entries.len(),
        contexts_by_type: by_type,
        most_contexted_files: top_n(by_file, TOP_FILES)
            .into_iter()
            .map(|(file, count)| FileCount { file, count })
            .collect(),
        context_trend: by_day
            .into_iter()
            .map(|(date, count)| DayCount { date, count })
            .collect(),
        average_contexts_per_commit,
        top_authors: top_n(by_author, TOP_AUTHORS)
            .into_iter()
            .map(|(author, count)| AuthorCount { author, count })
            .collect(),
    }
}

/// Highest counts first; equal counts ordered by key for stable output.
fn top_n(counts: HashMap<&str, usize>, n: usize) -> Vec<(String, usize)> {
    let mut ranked: Vec<(&str, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
    ranked
        .into_iter()
        .take(n)
        .map(|(k, c)| (k.to_string(), c))
        .collect()
}
