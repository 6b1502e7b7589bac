//! Recording new entries (`ccr add`) and correcting their content
//! (`ccr edit`).

use anyhow::{bail, Context, Result};
use std::io::Read;

use context_recorder_core::models::{
    ContextEntry, ContextMetadata, ContextSource, ContextType, FileAssociation,
};

use crate::config::Config;
use crate::render;
use crate::sqlite_store::open_recorder;

/// Everything `ccr add` can set on an entry.
#[derive(Debug, Clone, Default)]
pub struct NewEntry {
    /// Note text; `-` reads it from stdin.
    pub content: String,
    pub entry_type: String,
    pub source: String,
    /// `path`, `path:line` or `path:start-end`.
    pub files: Vec<String>,
    pub tags: Vec<String>,
    pub metadata: ContextMetadata,
}

pub async fn run_add(config: &Config, new: NewEntry, json: bool) -> Result<()> {
    let entry = build_entry(new)?;
    let mut recorder = open_recorder(config).await?;
    let id = recorder.add(entry).await?;

    if json {
        let stored = recorder.get(&id).await?;
        render::print_json(&stored)?;
    } else {
        println!("{}", id);
    }

    recorder.close().await;
    Ok(())
}

pub async fn run_edit(config: &Config, id: &str, content: &str) -> Result<()> {
    let content = read_content(content)?;
    let mut recorder = open_recorder(config).await?;
    let updated = recorder.update_content(id, &content).await?;
    recorder.close().await;

    if !updated {
        bail!("entry not found: {}", id);
    }
    println!("Updated {}", id);
    Ok(())
}

fn build_entry(new: NewEntry) -> Result<ContextEntry> {
    let entry_type: ContextType = new.entry_type.parse()?;
    let source: ContextSource = new.source.parse()?;
    let content = read_content(&new.content)?;

    let mut entry = ContextEntry::new(entry_type, content, source)?
        .with_tags(new.tags)
        .with_metadata(new.metadata);
    for spec in &new.files {
        entry = entry.with_file(parse_file_spec(spec)?);
    }
    Ok(entry)
}

fn read_content(arg: &str) -> Result<String> {
    if arg != "-" {
        return Ok(arg.to_string());
    }
    let mut buf = String::new();
    std::io::stdin()
        .read_to_string(&mut buf)
        .context("Failed to read content from stdin")?;
    Ok(buf.trim_end().to_string())
}

/// Parse `path`, `path:line` or `path:start-end`. A suffix that is not a
/// line spec is kept as part of the path.
pub fn parse_file_spec(spec: &str) -> Result<FileAssociation> {
    let spec = spec.trim();
    if spec.is_empty() {
        bail!("file path must not be empty");
    }

    let Some((path, lines)) = spec.rsplit_once(':') else {
        return Ok(FileAssociation::new(spec));
    };
    if path.is_empty() || !lines.chars().all(|c| c.is_ascii_digit() || c == '-') {
        return Ok(FileAssociation::new(spec));
    }

    let (start, end) = match lines.split_once('-') {
        Some((s, e)) => (s.parse::<u32>()?, e.parse::<u32>()?),
        None => {
            let line = lines.parse::<u32>()?;
            (line, line)
        }
    };
    if end < start {
        bail!("line range {}-{} ends before it starts", start, end);
    }
    Ok(FileAssociation::new(path).with_lines(start, end))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_path() {
        let fa = parse_file_spec("src/lib.rs").unwrap();
        assert_eq!(fa.file_path, "src/lib.rs");
        assert_eq!(fa.line_start, None);
    }

    #[test]
    fn test_parse_line_and_range() {
        let one = parse_file_spec("src/lib.rs:42").unwrap();
        assert_eq!((one.line_start, one.line_end), (Some(42), Some(42)));

        let range = parse_file_spec("src/a.ts:10-20").unwrap();
        assert_eq!(range.file_path, "src/a.ts");
        assert_eq!((range.line_start, range.line_end), (Some(10), Some(20)));
    }

    #[test]
    fn test_parse_rejects_backwards_range() {
        assert!(parse_file_spec("a.rs:9-3").is_err());
        assert!(parse_file_spec("  ").is_err());
    }

    #[test]
    fn test_non_numeric_suffix_stays_in_path() {
        let fa = parse_file_spec("C:notes.md").unwrap();
        assert_eq!(fa.file_path, "C:notes.md");
    }

    #[test]
    fn test_build_entry_validates() {
        let ok = build_entry(NewEntry {
            content: "why we pin sqlx".into(),
            entry_type: "decision".into(),
            source: "cli".into(),
            files: vec!["Cargo.toml:12".into()],
            tags: vec!["deps".into(), "deps".into()],
            ..Default::default()
        })
        .unwrap();
        assert_eq!(ok.entry_type, ContextType::Decision);
        assert_eq!(ok.tags, vec!["deps"]);
        assert_eq!(ok.file_associations.len(), 1);

        let bad_type = build_entry(NewEntry {
            content: "x".into(),
            entry_type: "memo".into(),
            source: "cli".into(),
            ..Default::default()
        });
        assert!(bad_type.is_err());

        let blank = build_entry(NewEntry {
            content: "   ".into(),
            entry_type: "text".into(),
            source: "cli".into(),
            ..Default::default()
        });
        assert!(blank.is_err());
    }
}
