use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn ccr_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_ccr"))
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let config_content = format!(
        r#"[db]
path = "{}/data/contexts.db"

[retrieval]
default_limit = 50
recent_limit = 2
"#,
        root.display()
    );

    let config_path = config_dir.join("ccr.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_ccr(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = ccr_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run ccr binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

/// Run `ccr add` and return the printed id.
fn add(config_path: &Path, args: &[&str]) -> String {
    let mut full = vec!["add"];
    full.extend_from_slice(args);
    let (stdout, stderr, success) = run_ccr(config_path, &full);
    assert!(success, "add failed: stdout={}, stderr={}", stdout, stderr);
    stdout.trim().to_string()
}

fn json(stdout: &str) -> serde_json::Value {
    serde_json::from_str(stdout).unwrap_or_else(|e| panic!("bad json ({}): {}", e, stdout))
}

#[test]
fn test_init_creates_database() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_ccr(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("data/contexts.db").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_ccr(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_ccr(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_init_writes_missing_config() {
    let tmp = TempDir::new().unwrap();
    let config_path = tmp.path().join(".ccr").join("config.toml");

    let output = Command::new(ccr_binary())
        .current_dir(tmp.path())
        .arg("--config")
        .arg(&config_path)
        .arg("init")
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(config_path.exists());
    let written = fs::read_to_string(&config_path).unwrap();
    assert!(written.contains("[db]"));
}

#[test]
fn test_add_then_get_round_trips() {
    let (_tmp, config_path) = setup_test_env();
    run_ccr(&config_path, &["init"]);

    let id = add(
        &config_path,
        &[
            "Switch to exponential backoff",
            "--type",
            "decision",
            "--file",
            "src/client.rs:40-62",
            "--tag",
            "networking",
            "--author",
            "ana",
            "--commit",
            "abc123",
            "--link",
            "https://example.com/rfc",
            "--ticket",
            "NET-7",
        ],
    );
    assert!(!id.is_empty());

    let (stdout, stderr, success) = run_ccr(&config_path, &["get", &id, "--json"]);
    assert!(success, "get failed: {}", stderr);
    let v = json(&stdout);
    assert_eq!(v["id"], id.as_str());
    assert_eq!(v["type"], "decision");
    assert_eq!(v["content"], "Switch to exponential backoff");
    assert_eq!(v["tags"][0], "networking");
    assert_eq!(v["fileAssociations"][0]["filePath"], "src/client.rs");
    assert_eq!(v["fileAssociations"][0]["lineStart"], 40);
    assert_eq!(v["metadata"]["author"], "ana");
    assert_eq!(v["metadata"]["commitHash"], "abc123");
    assert_eq!(v["metadata"]["links"][0], "https://example.com/rfc");
    assert_eq!(v["metadata"]["relatedTickets"][0], "NET-7");

    let (stdout, _, success) = run_ccr(&config_path, &["get", &id]);
    assert!(success);
    assert!(stdout.contains("--- Content ---"));
    assert!(stdout.contains("src/client.rs:40-62"));
}

#[test]
fn test_add_rejects_bad_input() {
    let (_tmp, config_path) = setup_test_env();
    run_ccr(&config_path, &["init"]);

    let (_, stderr, success) = run_ccr(&config_path, &["add", "x", "--type", "memo"]);
    assert!(!success);
    assert!(stderr.contains("memo"));

    let (_, _, success) = run_ccr(&config_path, &["add", "   "]);
    assert!(!success);
}

#[test]
fn test_get_nonexistent_id() {
    let (_tmp, config_path) = setup_test_env();
    run_ccr(&config_path, &["init"]);

    let (_, stderr, success) = run_ccr(&config_path, &["get", "00000000-0000-0000-0000-000000000000"]);
    assert!(!success, "get for nonexistent id should fail");
    assert!(stderr.contains("not found"));
}

#[test]
fn test_search_fuzzy_and_prefix() {
    let (_tmp, config_path) = setup_test_env();
    run_ccr(&config_path, &["init"]);

    let id = add(&config_path, &["Pool the database connection per worker"]);
    add(&config_path, &["Unrelated note about fonts"]);

    for query in ["conection", "conn"] {
        let (stdout, stderr, success) = run_ccr(&config_path, &["search", query, "--json"]);
        assert!(success, "search failed: {}", stderr);
        let hits = json(&stdout);
        let ids: Vec<&str> = hits
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec![id.as_str()], "query {}", query);
    }
}

#[test]
fn test_search_no_results() {
    let (_tmp, config_path) = setup_test_env();
    run_ccr(&config_path, &["init"]);
    add(&config_path, &["something"]);

    let (stdout, _, success) = run_ccr(&config_path, &["search", "zzzzqqqq"]);
    assert!(success);
    assert!(stdout.contains("No results."));
}

#[test]
fn test_search_by_tags_only() {
    let (_tmp, config_path) = setup_test_env();
    run_ccr(&config_path, &["init"]);

    let fix = add(&config_path, &["Null check before parse", "-t", "bug-fix", "-f", "src/a.ts"]);
    add(&config_path, &["Split module", "-t", "refactor", "-f", "src/b.ts"]);

    let (stdout, _, success) = run_ccr(&config_path, &["search", "--tag", "bug-fix", "--json"]);
    assert!(success);
    let hits = json(&stdout);
    let hits = hits.as_array().unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0]["id"], fix.as_str());
}

#[test]
fn test_search_file_filter() {
    let (_tmp, config_path) = setup_test_env();
    run_ccr(&config_path, &["init"]);

    let rs = add(&config_path, &["cache invalidation", "-f", "src/cache.rs"]);
    add(&config_path, &["cache invalidation", "-f", "web/cache.ts"]);

    let (stdout, _, success) = run_ccr(
        &config_path,
        &["search", "cache", "--file", r"\.rs$", "--json"],
    );
    assert!(success);
    let hits = json(&stdout);
    let hits = hits.as_array().unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0]["id"], rs.as_str());
}

#[test]
fn test_timeline_lists_file_entries() {
    let (_tmp, config_path) = setup_test_env();
    run_ccr(&config_path, &["init"]);

    let first = add(&config_path, &["first look", "-f", "src/a.ts"]);
    let second = add(&config_path, &["second look", "-f", "src/a.ts:5"]);
    add(&config_path, &["other file", "-f", "src/b.ts"]);

    let (stdout, _, success) = run_ccr(&config_path, &["timeline", "src/a.ts", "--json"]);
    assert!(success);
    let v = json(&stdout);
    assert_eq!(v["filePath"], "src/a.ts");
    assert_eq!(v["totalEntries"], 2);
    let ids: Vec<&str> = v["entries"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["id"].as_str().unwrap())
        .collect();
    assert!(ids.contains(&first.as_str()));
    assert!(ids.contains(&second.as_str()));

    let (stdout, _, success) = run_ccr(&config_path, &["timeline", "src/a.ts"]);
    assert!(success);
    assert!(stdout.contains("(2 entries)"));
}

#[test]
fn test_recent_uses_configured_limit() {
    let (_tmp, config_path) = setup_test_env();
    run_ccr(&config_path, &["init"]);
    for i in 0..4 {
        add(&config_path, &[&format!("note {}", i)]);
    }

    let (stdout, _, success) = run_ccr(&config_path, &["recent", "--json"]);
    assert!(success);
    assert_eq!(json(&stdout).as_array().unwrap().len(), 2);

    let (stdout, _, success) = run_ccr(&config_path, &["recent", "--limit", "3", "--json"]);
    assert!(success);
    assert_eq!(json(&stdout).as_array().unwrap().len(), 3);
}

#[test]
fn test_commit_and_author_lookups() {
    let (_tmp, config_path) = setup_test_env();
    run_ccr(&config_path, &["init"]);

    let c = add(&config_path, &["fix flaky test", "--type", "commit", "--commit", "deadbeef", "--author", "ana"]);
    add(&config_path, &["unrelated", "--author", "bo"]);

    let (stdout, _, success) = run_ccr(&config_path, &["commit", "deadbeef", "--json"]);
    assert!(success);
    let hits = json(&stdout);
    assert_eq!(hits.as_array().unwrap().len(), 1);
    assert_eq!(hits[0]["id"], c.as_str());

    let (stdout, _, success) = run_ccr(&config_path, &["author", "ana", "--json"]);
    assert!(success);
    assert_eq!(json(&stdout).as_array().unwrap().len(), 1);

    let (stdout, _, success) = run_ccr(&config_path, &["author", "an", "--json"]);
    assert!(success);
    assert!(json(&stdout).as_array().unwrap().is_empty());
}

#[test]
fn test_edit_and_delete() {
    let (_tmp, config_path) = setup_test_env();
    run_ccr(&config_path, &["init"]);
    let id = add(&config_path, &["typo'd note", "-t", "keep"]);

    let (_, _, success) = run_ccr(&config_path, &["edit", &id, "corrected note"]);
    assert!(success);
    let (stdout, _, _) = run_ccr(&config_path, &["get", &id, "--json"]);
    let v = json(&stdout);
    assert_eq!(v["content"], "corrected note");
    assert_eq!(v["tags"][0], "keep");

    let (_, _, success) = run_ccr(&config_path, &["delete", &id]);
    assert!(success);
    let (_, _, success) = run_ccr(&config_path, &["get", &id]);
    assert!(!success);
    let (_, stderr, success) = run_ccr(&config_path, &["delete", &id]);
    assert!(!success);
    assert!(stderr.contains("not found"));
}

#[test]
fn test_stats_counts() {
    let (_tmp, config_path) = setup_test_env();
    run_ccr(&config_path, &["init"]);
    add(&config_path, &["a", "--type", "commit", "-f", "x.rs", "--author", "ana"]);
    add(&config_path, &["b", "-f", "x.rs", "-f", "y.rs"]);

    let (stdout, stderr, success) = run_ccr(&config_path, &["stats", "--json"]);
    assert!(success, "stats failed: {}", stderr);
    let v = json(&stdout);
    assert_eq!(v["totalContexts"], 2);
    assert_eq!(v["averageContextsPerCommit"], 2.0);
    assert_eq!(v["contextsByType"]["commit"], 1);
    assert_eq!(v["mostContextedFiles"][0]["file"], "x.rs");
    assert_eq!(v["mostContextedFiles"][0]["count"], 2);
    assert_eq!(v["topAuthors"][0]["author"], "ana");
    assert_eq!(v["contextTrend"].as_array().unwrap().len(), 1);

    let (stdout, _, success) = run_ccr(&config_path, &["stats"]);
    assert!(success);
    assert!(stdout.contains("Entries:     2"));
}

#[test]
fn test_export_then_import() {
    let (tmp, config_path) = setup_test_env();
    run_ccr(&config_path, &["init"]);
    add(&config_path, &["one", "-t", "a"]);
    add(&config_path, &["two", "-f", "z.rs:1-2"]);

    let out = tmp.path().join("out").join("export.json");
    let (_, stderr, success) = run_ccr(&config_path, &["export", "--output", out.to_str().unwrap()]);
    assert!(success, "export failed: {}", stderr);
    let exported = json(&fs::read_to_string(&out).unwrap());
    assert_eq!(exported.as_array().unwrap().len(), 2);

    // Importing into the same database skips every entry.
    let (stdout, _, success) = run_ccr(&config_path, &["import", out.to_str().unwrap()]);
    assert!(success);
    assert!(stdout.contains("Imported 0 entries (2 already present)"));

    // A fresh database receives them all.
    let other = TempDir::new().unwrap();
    let other_config = other.path().join("ccr.toml");
    fs::write(
        &other_config,
        format!("[db]\npath = \"{}/contexts.db\"\n", other.path().display()),
    )
    .unwrap();
    let (stdout, stderr, success) = run_ccr(&other_config, &["import", out.to_str().unwrap()]);
    assert!(success, "import failed: {}", stderr);
    assert!(stdout.contains("Imported 2 entries"));

    let (stdout, _, _) = run_ccr(&other_config, &["export"]);
    assert_eq!(json(&stdout), exported);
}

#[test]
fn test_suggest_and_related() {
    let (_tmp, config_path) = setup_test_env();
    run_ccr(&config_path, &["init"]);
    let a = add(&config_path, &["migration locks the accounts table"]);
    let b = add(&config_path, &["accounts table migration needs a backfill"]);
    add(&config_path, &["css grid layout"]);

    let (stdout, _, success) = run_ccr(&config_path, &["suggest", "migr", "--json"]);
    assert!(success);
    let words = json(&stdout);
    assert_eq!(words[0], "migration");

    let (stdout, _, success) = run_ccr(&config_path, &["related", &a, "--json"]);
    assert!(success);
    let related = json(&stdout);
    let related = related.as_array().unwrap();
    assert_eq!(related[0]["id"], b.as_str());
    assert!(related.iter().all(|e| e["id"] != a.as_str()));
}

#[test]
fn test_explicit_missing_config_fails() {
    let tmp = TempDir::new().unwrap();
    let (_, stderr, success) = run_ccr(&tmp.path().join("missing.toml"), &["recent"]);
    assert!(!success);
    assert!(stderr.contains("Failed to read config file"));
}

#[test]
fn test_completions() {
    let tmp = TempDir::new().unwrap();
    let (stdout, _, success) = run_ccr(&tmp.path().join("unused.toml"), &["completions", "bash"]);
    assert!(success);
    assert!(stdout.contains("ccr"));
}
