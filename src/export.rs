//! Export and import of the full corpus as JSON.
//!
//! The export is a JSON array of entries, newest first, with every field
//! present. `ccr import` reads the same format back; entries whose id is
//! already stored are skipped.

use anyhow::{Context, Result};
use std::path::Path;

use context_recorder_core::models::ContextEntry;

use crate::config::Config;
use crate::sqlite_store::open_recorder;

/// Export every entry as JSON.
///
/// If `output` is `Some`, writes to that file path. Otherwise writes
/// to stdout for piping.
pub async fn run_export(config: &Config, output: Option<&Path>) -> Result<()> {
    let mut recorder = open_recorder(config).await?;
    let entries = recorder.export().await?;
    recorder.close().await;

    let json = serde_json::to_string_pretty(&entries)?;

    match output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, &json)?;
            eprintln!("Exported {} entries to {}", entries.len(), path.display());
        }
        None => {
            println!("{}", json);
        }
    }

    Ok(())
}

pub async fn run_import(config: &Config, input: &Path) -> Result<()> {
    let entries = read_export(input)?;
    let mut recorder = open_recorder(config).await?;
    let summary = recorder.import(entries).await;
    recorder.close().await;
    let summary = summary?;

    println!(
        "Imported {} entries ({} already present)",
        summary.imported, summary.skipped
    );
    Ok(())
}

fn read_export(path: &Path) -> Result<Vec<ContextEntry>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read export file: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse export file: {}", path.display()))
}
