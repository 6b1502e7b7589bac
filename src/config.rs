//! Configuration parsing and validation.
//!
//! Context Recorder reads a TOML file (default `./.ccr/config.toml`).
//! Every section and key is optional; a missing file is only an error
//! when the caller asked for a specific path.
//!
//! # Example
//!
//! ```toml
//! [db]
//! path = ".ccr/contexts.db"
//!
//! [retrieval]
//! default_limit = 50
//! recent_limit = 10
//! related_limit = 5
//! suggest_limit = 10
//!
//! [index]
//! fuzzy = 0.2
//! prefix = true
//! ```

use anyhow::{bail, Context, Result};
use context_recorder_core::index::IndexOptions;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub db: DbConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub index: IndexConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DbConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from(".ccr/contexts.db")
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RetrievalConfig {
    /// Search limit when a query gives none.
    #[serde(default = "default_limit")]
    pub default_limit: usize,
    #[serde(default = "default_recent_limit")]
    pub recent_limit: usize,
    #[serde(default = "default_related_limit")]
    pub related_limit: usize,
    #[serde(default = "default_suggest_limit")]
    pub suggest_limit: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            recent_limit: default_recent_limit(),
            related_limit: default_related_limit(),
            suggest_limit: default_suggest_limit(),
        }
    }
}

fn default_limit() -> usize {
    50
}
fn default_recent_limit() -> usize {
    10
}
fn default_related_limit() -> usize {
    5
}
fn default_suggest_limit() -> usize {
    10
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct IndexConfig {
    /// Edit-distance tolerance as a fraction of query token length.
    #[serde(default = "default_fuzzy")]
    pub fuzzy: f64,
    #[serde(default = "default_prefix")]
    pub prefix: bool,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            fuzzy: default_fuzzy(),
            prefix: default_prefix(),
        }
    }
}

fn default_fuzzy() -> f64 {
    0.2
}
fn default_prefix() -> bool {
    true
}

impl IndexConfig {
    pub fn options(&self) -> IndexOptions {
        IndexOptions {
            fuzzy: self.fuzzy,
            prefix: self.prefix,
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

/// Load `path` if it exists, otherwise fall back to defaults.
///
/// Used for the implicit default path so a fresh checkout works without
/// running `ccr init` first. An explicit `--config` goes through
/// [`load_config`] instead.
pub fn load_or_default(path: &Path) -> Result<Config> {
    if path.exists() {
        load_config(path)
    } else {
        Ok(Config::default())
    }
}

fn validate(config: &Config) -> Result<()> {
    if config.db.path.as_os_str().is_empty() {
        bail!("db.path must not be empty");
    }

    let r = &config.retrieval;
    for (key, value) in [
        ("default_limit", r.default_limit),
        ("recent_limit", r.recent_limit),
        ("related_limit", r.related_limit),
        ("suggest_limit", r.suggest_limit),
    ] {
        if value < 1 {
            bail!("retrieval.{} must be >= 1", key);
        }
    }

    if !(0.0..1.0).contains(&config.index.fuzzy) {
        bail!("index.fuzzy must be in [0.0, 1.0)");
    }

    Ok(())
}

/// Write a default config file at `path` unless one already exists.
/// Returns whether a file was written.
pub fn write_default(path: &Path) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let body = toml::to_string_pretty(&Config::default())?;
    std::fs::write(path, body)
        .with_context(|| format!("Failed to write config file: {}", path.display()))?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("config.toml");
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let tmp = TempDir::new().unwrap();
        let cfg = load_config(&write(&tmp, "")).unwrap();
        assert_eq!(cfg.db.path, PathBuf::from(".ccr/contexts.db"));
        assert_eq!(cfg.retrieval.default_limit, 50);
        assert_eq!(cfg.retrieval.related_limit, 5);
        assert!((cfg.index.fuzzy - 0.2).abs() < f64::EPSILON);
        assert!(cfg.index.prefix);
    }

    #[test]
    fn test_partial_sections() {
        let tmp = TempDir::new().unwrap();
        let cfg = load_config(&write(
            &tmp,
            "[retrieval]\nrecent_limit = 3\n[index]\nprefix = false\n",
        ))
        .unwrap();
        assert_eq!(cfg.retrieval.recent_limit, 3);
        assert_eq!(cfg.retrieval.default_limit, 50);
        assert!(!cfg.index.prefix);
    }

    #[test]
    fn test_rejects_zero_limit() {
        let tmp = TempDir::new().unwrap();
        let err = load_config(&write(&tmp, "[retrieval]\ndefault_limit = 0\n")).unwrap_err();
        assert!(err.to_string().contains("default_limit"));
    }

    #[test]
    fn test_rejects_out_of_range_fuzzy() {
        let tmp = TempDir::new().unwrap();
        assert!(load_config(&write(&tmp, "[index]\nfuzzy = 1.5\n")).is_err());
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let tmp = TempDir::new().unwrap();
        assert!(load_config(&tmp.path().join("nope.toml")).is_err());
        assert!(load_or_default(&tmp.path().join("nope.toml")).is_ok());
    }

    #[test]
    fn test_write_default_round_trips() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(".ccr").join("config.toml");
        assert!(write_default(&path).unwrap());
        assert!(!write_default(&path).unwrap());
        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.retrieval.suggest_limit, 10);
    }
}
