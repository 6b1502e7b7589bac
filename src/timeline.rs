//! Filter-only reads that bypass the search index: per-file timelines,
//! recent entries, and lookups by commit or author.

use anyhow::Result;

use crate::config::Config;
use crate::render;
use crate::sqlite_store::open_recorder;

pub async fn run_timeline(config: &Config, file_path: &str, json: bool) -> Result<()> {
    let mut recorder = open_recorder(config).await?;
    let timeline = recorder.get_file_timeline(file_path).await?;
    recorder.close().await;

    if json {
        return render::print_json(&timeline);
    }

    println!("--- Timeline: {} ({} entries) ---", timeline.file_path, timeline.total_entries);
    println!();
    for item in &timeline.entries {
        let entry = &item.entry;
        let lines = entry
            .file_associations
            .iter()
            .find(|f| f.file_path == timeline.file_path)
            .and_then(|f| match (f.line_start, f.line_end) {
                (Some(s), Some(e)) if s == e => Some(format!(" L{}", s)),
                (Some(s), Some(e)) => Some(format!(" L{}-{}", s, e)),
                (Some(s), None) => Some(format!(" L{}", s)),
                _ => None,
            })
            .unwrap_or_default();
        println!(
            "{}  [{}]{}  {}",
            render::format_ts(&entry.timestamp),
            entry.entry_type,
            lines,
            render::excerpt(&entry.content)
        );
        println!("    id: {}", entry.id);
    }
    Ok(())
}

/// Newest entries, or every entry within `since..=until` when either bound
/// is given.
pub async fn run_recent(
    config: &Config,
    limit: Option<usize>,
    since: Option<String>,
    until: Option<String>,
    json: bool,
) -> Result<()> {
    let mut recorder = open_recorder(config).await?;
    let range = render::parse_range(since.as_deref(), until.as_deref())?;
    let entries = if let Some((start, end)) = range {
        let mut entries = recorder.get_by_date_range(start, end).await?;
        if let Some(limit) = limit {
            entries.truncate(limit);
        }
        entries
    } else {
        recorder
            .get_recent(limit.unwrap_or(config.retrieval.recent_limit))
            .await?
    };
    recorder.close().await;

    if json {
        render::print_json(&entries)
    } else {
        render::print_entries(&entries);
        Ok(())
    }
}

pub async fn run_commit(config: &Config, commit_hash: &str, json: bool) -> Result<()> {
    let mut recorder = open_recorder(config).await?;
    let entries = recorder.get_by_commit(commit_hash).await?;
    recorder.close().await;

    if json {
        render::print_json(&entries)
    } else {
        render::print_entries(&entries);
        Ok(())
    }
}

pub async fn run_author(config: &Config, author: &str, json: bool) -> Result<()> {
    let mut recorder = open_recorder(config).await?;
    let entries = recorder.get_by_author(author).await?;
    recorder.close().await;

    if json {
        render::print_json(&entries)
    } else {
        render::print_entries(&entries);
        Ok(())
    }
}
