use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::sqlite_store;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = sqlite_store::connect(config).await?;
    let result = apply_schema(&pool).await;
    pool.close().await;
    result
}

/// Create every table and index if missing. Idempotent.
pub async fn apply_schema(pool: &SqlitePool) -> Result<()> {
    // Timestamps are Unix milliseconds.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS contexts (
            id TEXT PRIMARY KEY,
            timestamp INTEGER NOT NULL,
            type TEXT NOT NULL CHECK (type IN (
                'text', 'voice', 'link', 'code_snippet', 'commit',
                'meeting_note', 'decision', 'bug_report', 'research'
            )),
            content TEXT NOT NULL CHECK (length(content) > 0),
            source TEXT NOT NULL,
            author TEXT,
            email TEXT,
            commit_hash TEXT,
            branch TEXT,
            duration INTEGER,
            audio_path TEXT,
            line_number INTEGER,
            column_number INTEGER,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS file_associations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            context_id TEXT NOT NULL,
            file_path TEXT NOT NULL,
            line_start INTEGER,
            line_end INTEGER,
            file_hash TEXT,
            FOREIGN KEY (context_id) REFERENCES contexts(id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tags (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            context_id TEXT NOT NULL,
            tag TEXT NOT NULL,
            FOREIGN KEY (context_id) REFERENCES contexts(id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS links (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            context_id TEXT NOT NULL,
            url TEXT NOT NULL,
            FOREIGN KEY (context_id) REFERENCES contexts(id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    // item_type is one of 'ticket', 'pr', 'thread'.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS related_items (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            context_id TEXT NOT NULL,
            item_type TEXT NOT NULL CHECK (item_type IN ('ticket', 'pr', 'thread')),
            item_id TEXT NOT NULL,
            FOREIGN KEY (context_id) REFERENCES contexts(id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    let indexes = [
        "CREATE INDEX IF NOT EXISTS idx_contexts_timestamp ON contexts(timestamp DESC)",
        "CREATE INDEX IF NOT EXISTS idx_contexts_type ON contexts(type)",
        "CREATE INDEX IF NOT EXISTS idx_contexts_commit_hash ON contexts(commit_hash)",
        "CREATE INDEX IF NOT EXISTS idx_contexts_author ON contexts(author)",
        "CREATE INDEX IF NOT EXISTS idx_file_associations_file_path ON file_associations(file_path)",
        "CREATE INDEX IF NOT EXISTS idx_file_associations_context_id ON file_associations(context_id)",
        "CREATE INDEX IF NOT EXISTS idx_tags_tag ON tags(tag)",
        "CREATE INDEX IF NOT EXISTS idx_tags_context_id ON tags(context_id)",
        "CREATE INDEX IF NOT EXISTS idx_links_context_id ON links(context_id)",
        "CREATE INDEX IF NOT EXISTS idx_related_items_context_id ON related_items(context_id)",
    ];
    for statement in indexes {
        sqlx::query(statement).execute(pool).await?;
    }

    Ok(())
}
