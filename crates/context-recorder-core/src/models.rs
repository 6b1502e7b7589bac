//! Core data models used throughout Context Recorder.
//!
//! A [`ContextEntry`] is the unit of record: a short, timestamped note
//! attached to zero or more project files. These types are plain values;
//! the only behavior they carry is construction-time validation (non-empty
//! content, closed type/source sets, de-duplicated tags).
//!
//! Serialization uses camelCase field names and is the export/interchange
//! format produced by [`Recorder::export`](crate::recorder::Recorder::export).

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::EntryError;

/// Category of a context entry. Closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextType {
    Text,
    Voice,
    Link,
    CodeSnippet,
    Commit,
    MeetingNote,
    Decision,
    BugReport,
    Research,
}

impl ContextType {
    pub const ALL: [ContextType; 9] = [
        ContextType::Text,
        ContextType::Voice,
        ContextType::Link,
        ContextType::CodeSnippet,
        ContextType::Commit,
        ContextType::MeetingNote,
        ContextType::Decision,
        ContextType::BugReport,
        ContextType::Research,
    ];

    /// Stable string form, used as the stored column value.
    pub fn as_str(&self) -> &'static str {
        match self {
            ContextType::Text => "text",
            ContextType::Voice => "voice",
            ContextType::Link => "link",
            ContextType::CodeSnippet => "code_snippet",
            ContextType::Commit => "commit",
            ContextType::MeetingNote => "meeting_note",
            ContextType::Decision => "decision",
            ContextType::BugReport => "bug_report",
            ContextType::Research => "research",
        }
    }
}

impl fmt::Display for ContextType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContextType {
    type Err = EntryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ContextType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| EntryError::UnknownType(s.to_string()))
    }
}

/// Provenance of an entry. Informational only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextSource {
    Manual,
    GitHook,
    BrowserExtension,
    #[serde(alias = "vscode_extension")]
    EditorExtension,
    Cli,
    Api,
}

impl ContextSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContextSource::Manual => "manual",
            ContextSource::GitHook => "git_hook",
            ContextSource::BrowserExtension => "browser_extension",
            ContextSource::EditorExtension => "editor_extension",
            ContextSource::Cli => "cli",
            ContextSource::Api => "api",
        }
    }
}

impl fmt::Display for ContextSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContextSource {
    type Err = EntryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manual" => Ok(ContextSource::Manual),
            "git_hook" => Ok(ContextSource::GitHook),
            "browser_extension" => Ok(ContextSource::BrowserExtension),
            "editor_extension" | "vscode_extension" => Ok(ContextSource::EditorExtension),
            "cli" => Ok(ContextSource::Cli),
            "api" => Ok(ContextSource::Api),
            other => Err(EntryError::UnknownSource(other.to_string())),
        }
    }
}

/// Optional, type-dependent fields of an entry.
///
/// Which fields are populated depends on the entry type (a commit carries
/// `commit_hash` and `branch`, a voice note carries `duration` and
/// `audio_path`, and so on). All of them are persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContextMetadata {
    pub author: Option<String>,
    pub email: Option<String>,
    pub commit_hash: Option<String>,
    pub branch: Option<String>,
    pub links: Vec<String>,
    /// Voice note length in seconds.
    pub duration: Option<u32>,
    pub audio_path: Option<String>,
    pub line_number: Option<u32>,
    pub column_number: Option<u32>,
    pub related_tickets: Vec<String>,
    pub related_prs: Vec<String>,
    pub related_threads: Vec<String>,
}

/// A link from an entry to a project file, optionally scoped to lines.
///
/// `file_path` is an opaque, project-rooted relative path. It is never
/// checked against the filesystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileAssociation {
    pub file_path: String,
    #[serde(default)]
    pub line_start: Option<u32>,
    #[serde(default)]
    pub line_end: Option<u32>,
    #[serde(default)]
    pub content_hash: Option<String>,
}

impl FileAssociation {
    pub fn new(file_path: impl Into<String>) -> Self {
        Self {
            file_path: file_path.into(),
            line_start: None,
            line_end: None,
            content_hash: None,
        }
    }

    pub fn with_lines(mut self, start: u32, end: u32) -> Self {
        self.line_start = Some(start);
        self.line_end = Some(end);
        self
    }

    pub fn with_hash(mut self, hash: impl Into<String>) -> Self {
        self.content_hash = Some(hash.into());
        self
    }
}

/// The unit of record.
///
/// Build one with [`ContextEntry::new`] and the `with_*` helpers. The id is
/// assigned at construction and the timestamp is held at millisecond
/// precision, which is what the storage layer persists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub entry_type: ContextType,
    pub content: String,
    pub source: ContextSource,
    #[serde(default)]
    pub metadata: ContextMetadata,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub file_associations: Vec<FileAssociation>,
}

impl ContextEntry {
    /// Create an entry stamped with the current time and a fresh id.
    ///
    /// Fails with [`EntryError::EmptyContent`] if `content` is blank.
    pub fn new(
        entry_type: ContextType,
        content: impl Into<String>,
        source: ContextSource,
    ) -> Result<Self, EntryError> {
        let content = content.into();
        validate_content(&content)?;
        Ok(Self {
            id: new_entry_id(),
            timestamp: truncate_to_millis(Utc::now()),
            entry_type,
            content,
            source,
            metadata: ContextMetadata::default(),
            tags: Vec::new(),
            file_associations: Vec::new(),
        })
    }

    /// Re-check an entry that was built field by field (for instance
    /// deserialized from an export): content must not be blank, and tags are
    /// trimmed and de-duplicated.
    pub fn normalized(mut self) -> Result<Self, EntryError> {
        validate_content(&self.content)?;
        self.tags = normalize_tags(&self.tags);
        Ok(self)
    }

    /// Set the point in time the entry refers to (e.g. a commit's authored time).
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = truncate_to_millis(timestamp);
        self
    }

    /// Replace the tag set. Tags are trimmed and de-duplicated.
    pub fn with_tags<I, T>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        self.tags = normalize_tags(tags);
        self
    }

    pub fn with_file(mut self, association: FileAssociation) -> Self {
        self.file_associations.push(association);
        self
    }

    pub fn with_metadata(mut self, metadata: ContextMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.metadata.author = Some(author.into());
        self
    }

    pub fn author(&self) -> Option<&str> {
        self.metadata.author.as_deref()
    }

    pub fn file_paths(&self) -> impl Iterator<Item = &str> {
        self.file_associations.iter().map(|f| f.file_path.as_str())
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

/// An entry as presented in a per-file timeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEntry {
    #[serde(flatten)]
    pub entry: ContextEntry,
    /// Ids of related entries. Structure only; not yet populated.
    pub related_entries: Vec<String>,
}

impl From<ContextEntry> for TimelineEntry {
    fn from(entry: ContextEntry) -> Self {
        Self {
            entry,
            related_entries: Vec::new(),
        }
    }
}

/// Timestamp-descending list of entries associated with one file.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Timeline {
    pub file_path: String,
    pub entries: Vec<TimelineEntry>,
    pub total_entries: usize,
}

/// Generate a new globally unique entry id.
pub fn new_entry_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Fails with [`EntryError::EmptyContent`] if `content` is blank.
pub fn validate_content(content: &str) -> Result<(), EntryError> {
    if content.trim().is_empty() {
        return Err(EntryError::EmptyContent);
    }
    Ok(())
}

/// Trim each tag, drop blanks, and collapse duplicates keeping first occurrence.
pub fn normalize_tags<I, T>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = T>,
    T: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for tag in tags {
        let tag = tag.as_ref().trim();
        if tag.is_empty() || out.iter().any(|t| t == tag) {
            continue;
        }
        out.push(tag.to_string());
    }
    out
}

/// Drop sub-millisecond precision.
pub fn truncate_to_millis(ts: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ts.timestamp_millis()).unwrap_or(ts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_blank_content() {
        let err = ContextEntry::new(ContextType::Text, "   ", ContextSource::Cli).unwrap_err();
        assert_eq!(err, EntryError::EmptyContent);
    }

    #[test]
    fn test_new_assigns_unique_ids() {
        let a = ContextEntry::new(ContextType::Text, "a", ContextSource::Cli).unwrap();
        let b = ContextEntry::new(ContextType::Text, "b", ContextSource::Cli).unwrap();
        assert_ne!(a.id, b.id);
        assert!(!a.id.is_empty());
    }

    #[test]
    fn test_tags_trimmed_and_deduplicated() {
        let tags = normalize_tags([" bug-fix", "refactor", "bug-fix ", "", "refactor"]);
        assert_eq!(tags, vec!["bug-fix".to_string(), "refactor".to_string()]);
    }

    #[test]
    fn test_normalized_rechecks_deserialized_entries() {
        let raw = r#"{"id":"e1","timestamp":"2024-03-01T10:00:00Z","type":"text",
            "content":"keep me","source":"cli","tags":["a"," a","a ",""]}"#;
        let entry: ContextEntry = serde_json::from_str(raw).unwrap();
        assert_eq!(entry.normalized().unwrap().tags, vec!["a".to_string()]);

        let blank = r#"{"id":"e2","timestamp":"2024-03-01T10:00:00Z","type":"text",
            "content":"   ","source":"cli"}"#;
        let entry: ContextEntry = serde_json::from_str(blank).unwrap();
        assert_eq!(entry.normalized().unwrap_err(), EntryError::EmptyContent);
    }

    #[test]
    fn test_type_round_trips_through_str() {
        for t in ContextType::ALL {
            assert_eq!(t.as_str().parse::<ContextType>().unwrap(), t);
        }
        assert!(matches!(
            "podcast".parse::<ContextType>(),
            Err(EntryError::UnknownType(_))
        ));
    }

    #[test]
    fn test_source_accepts_legacy_editor_name() {
        assert_eq!(
            "vscode_extension".parse::<ContextSource>().unwrap(),
            ContextSource::EditorExtension
        );
        let parsed: ContextSource = serde_json::from_str("\"vscode_extension\"").unwrap();
        assert_eq!(parsed, ContextSource::EditorExtension);
    }

    #[test]
    fn test_timestamp_held_at_millisecond_precision() {
        let ts = DateTime::from_timestamp(1_700_000_000, 123_456_789).unwrap();
        let entry = ContextEntry::new(ContextType::Text, "x", ContextSource::Cli)
            .unwrap()
            .at(ts);
        assert_eq!(entry.timestamp.timestamp_subsec_nanos(), 123_000_000);
    }

    #[test]
    fn test_serialized_shape_uses_camel_case() {
        let entry = ContextEntry::new(ContextType::BugReport, "crash on save", ContextSource::Api)
            .unwrap()
            .with_file(FileAssociation::new("src/a.rs").with_lines(3, 9));
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["type"], "bug_report");
        assert_eq!(json["fileAssociations"][0]["filePath"], "src/a.rs");
        assert_eq!(json["fileAssociations"][0]["lineStart"], 3);
        assert!(json["metadata"].get("commitHash").is_some());
    }
}
