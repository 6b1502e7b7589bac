//! Corpus analytics (`ccr stats`).
//!
//! Prints the analytics snapshot: totals by type, the most annotated
//! files, top authors, and the trailing daily trend.

use anyhow::Result;

use context_recorder_core::analytics::{AnalyticsData, TREND_DAYS};

use crate::config::Config;
use crate::render;
use crate::sqlite_store::open_recorder;

pub async fn run_stats(config: &Config, json: bool) -> Result<()> {
    let mut recorder = open_recorder(config).await?;
    let data = recorder.get_analytics().await?;
    recorder.close().await;

    if json {
        return render::print_json(&data);
    }

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("Context Recorder Stats");
    println!("======================");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!();
    print_summary(&data);
    Ok(())
}

fn print_summary(data: &AnalyticsData) {
    println!("  Entries:     {}", data.total_contexts);
    println!(
        "  Per commit:  {:.2}",
        data.average_contexts_per_commit
    );

    if !data.contexts_by_type.is_empty() {
        println!();
        println!("  By type:");
        for (kind, count) in &data.contexts_by_type {
            println!("  {:<16} {:>6}", kind.as_str(), count);
        }
    }

    if !data.most_contexted_files.is_empty() {
        println!();
        println!("  Most annotated files:");
        for f in &data.most_contexted_files {
            println!("  {:>6}  {}", f.count, f.file);
        }
    }

    if !data.top_authors.is_empty() {
        println!();
        println!("  Top authors:");
        for a in &data.top_authors {
            println!("  {:>6}  {}", a.count, a.author);
        }
    }

    if !data.context_trend.is_empty() {
        println!();
        println!("  Last {} days:", TREND_DAYS);
        let peak = data
            .context_trend
            .iter()
            .map(|d| d.count)
            .max()
            .unwrap_or(1);
        for day in &data.context_trend {
            let bar = (day.count * 40).div_ceil(peak);
            println!("  {}  {:>4} {}", day.date, day.count, "#".repeat(bar));
        }
    }

    println!();
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
