//! Shared terminal output for the read commands.
//!
//! Every read command either prints a human listing or, with `--json`,
//! the plain data value as pretty JSON on stdout.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use context_recorder_core::models::ContextEntry;

/// Excerpt length in characters for list views.
const EXCERPT_CHARS: usize = 120;

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Numbered one-block-per-entry listing, or `No results.` when empty.
pub fn print_entries(entries: &[ContextEntry]) {
    if entries.is_empty() {
        println!("No results.");
        return;
    }
    for (i, entry) in entries.iter().enumerate() {
        println!(
            "{}. [{}] {}",
            i + 1,
            entry.entry_type,
            format_ts(&entry.timestamp)
        );
        if let Some(author) = entry.author() {
            println!("    author: {}", author);
        }
        let files: Vec<&str> = entry.file_paths().collect();
        if !files.is_empty() {
            println!("    files: {}", files.join(", "));
        }
        if !entry.tags.is_empty() {
            println!("    tags: {}", entry.tags.join(", "));
        }
        println!("    excerpt: \"{}\"", excerpt(&entry.content));
        println!("    id: {}", entry.id);
        println!();
    }
}

pub fn excerpt(content: &str) -> String {
    let flat = content.replace('\n', " ");
    let flat = flat.trim();
    if flat.chars().count() <= EXCERPT_CHARS {
        return flat.to_string();
    }
    let cut: String = flat.chars().take(EXCERPT_CHARS).collect();
    format!("{}...", cut.trim_end())
}

pub fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M").to_string()
}

/// Parse a `YYYY-MM-DD` CLI date as the first (or, with `end_of_day`, the
/// last) millisecond of that UTC day.
pub fn parse_day(value: &str, end_of_day: bool) -> Result<DateTime<Utc>> {
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .with_context(|| format!("invalid date '{}', expected YYYY-MM-DD", value))?;
    let time = if end_of_day {
        date.and_hms_milli_opt(23, 59, 59, 999)
    } else {
        date.and_hms_opt(0, 0, 0)
    };
    time.map(|t| t.and_utc())
        .with_context(|| format!("invalid date '{}'", value))
}

/// Inclusive range from optional `YYYY-MM-DD` bounds. An absent bound is
/// open-ended; `None` when neither is given.
pub fn parse_range(
    since: Option<&str>,
    until: Option<&str>,
) -> Result<Option<(DateTime<Utc>, DateTime<Utc>)>> {
    if since.is_none() && until.is_none() {
        return Ok(None);
    }
    let start = match since {
        Some(s) => parse_day(s, false)?,
        None => DateTime::<Utc>::MIN_UTC,
    };
    let end = match until {
        Some(u) => parse_day(u, true)?,
        None => DateTime::<Utc>::MAX_UTC,
    };
    Ok(Some((start, end)))
}
