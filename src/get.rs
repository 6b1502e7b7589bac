//! Single-entry reads and removal: `ccr get` and `ccr delete`.

use anyhow::{bail, Result};

use context_recorder_core::models::ContextEntry;

use crate::config::Config;
use crate::render;
use crate::sqlite_store::open_recorder;

pub async fn run_get(config: &Config, id: &str, json: bool) -> Result<()> {
    let mut recorder = open_recorder(config).await?;
    let entry = recorder.get(id).await?;
    recorder.close().await;

    let Some(entry) = entry else {
        bail!("entry not found: {}", id);
    };

    if json {
        return render::print_json(&entry);
    }
    print_entry(&entry);
    Ok(())
}

pub async fn run_delete(config: &Config, id: &str) -> Result<()> {
    let mut recorder = open_recorder(config).await?;
    let deleted = recorder.delete(id).await?;
    recorder.close().await;

    if !deleted {
        bail!("entry not found: {}", id);
    }
    println!("Deleted {}", id);
    Ok(())
}

fn print_entry(entry: &ContextEntry) {
    let meta = &entry.metadata;

    println!("--- Entry ---");
    println!("id:        {}", entry.id);
    println!("type:      {}", entry.entry_type);
    println!("source:    {}", entry.source);
    println!("timestamp: {}", entry.timestamp.to_rfc3339());
    if let Some(ref author) = meta.author {
        match meta.email {
            Some(ref email) => println!("author:    {} <{}>", author, email),
            None => println!("author:    {}", author),
        }
    }
    if let Some(ref hash) = meta.commit_hash {
        println!("commit:    {}", hash);
    }
    if let Some(ref branch) = meta.branch {
        println!("branch:    {}", branch);
    }
    if let Some(ref path) = meta.audio_path {
        match meta.duration {
            Some(secs) => println!("audio:     {} ({}s)", path, secs),
            None => println!("audio:     {}", path),
        }
    }
    if !entry.tags.is_empty() {
        println!("tags:      {}", entry.tags.join(", "));
    }
    for link in &meta.links {
        println!("link:      {}", link);
    }
    for (label, items) in [
        ("tickets", &meta.related_tickets),
        ("prs", &meta.related_prs),
        ("threads", &meta.related_threads),
    ] {
        if !items.is_empty() {
            println!("{:<10} {}", format!("{}:", label), items.join(", "));
        }
    }
    println!();

    if !entry.file_associations.is_empty() {
        println!("--- Files ({}) ---", entry.file_associations.len());
        for f in &entry.file_associations {
            match (f.line_start, f.line_end) {
                (Some(s), Some(e)) => println!("{}:{}-{}", f.file_path, s, e),
                (Some(s), None) => println!("{}:{}", f.file_path, s),
                _ => println!("{}", f.file_path),
            }
        }
        println!();
    }

    println!("--- Content ---");
    println!("{}", entry.content);
}
