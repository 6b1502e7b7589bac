//! SQLite-backed [`Store`] implementation.
//!
//! An entry is one `contexts` row plus child rows in `file_associations`,
//! `tags`, `links` and `related_items`. `save` writes them in a single
//! transaction, so readers never see an entry without its children. Child
//! rows are read back in insertion order.
//!
//! The pool lives behind a lock so [`Store::close`] can release it; every
//! call after that returns [`StorageError::NotInitialized`].

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::error::ErrorKind;
use sqlx::query::Query;
use sqlx::sqlite::{
    SqliteArguments, SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow,
};
use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection, SqlitePool};
use tracing::debug;

use context_recorder_core::error::{Result, StorageError};
use context_recorder_core::models::{
    new_entry_id, validate_content, ContextEntry, ContextMetadata, ContextSource, ContextType, FileAssociation,
};
use context_recorder_core::recorder::Recorder;
use context_recorder_core::store::{Store, CONTENT_SEARCH_LIMIT};

use crate::config::Config;
use crate::migrate;

const ENTRY_COLUMNS: &str = "id, timestamp, type, content, source, author, email, commit_hash, \
     branch, duration, audio_path, line_number, column_number";

/// Entry ids per child-table query, well under SQLite's bound-parameter cap.
const ID_BATCH: usize = 500;

const TICKET: &str = "ticket";
const PR: &str = "pr";
const THREAD: &str = "thread";

pub struct SqliteStore {
    pool: RwLock<Option<SqlitePool>>,
}

impl SqliteStore {
    /// Connect to the configured database and make sure the schema exists.
    pub async fn open(config: &Config) -> anyhow::Result<Self> {
        let pool = connect(config).await?;
        migrate::apply_schema(&pool).await?;
        Ok(Self::from_pool(pool))
    }

    /// Wrap a pool whose schema is already in place.
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self {
            pool: RwLock::new(Some(pool)),
        }
    }

    /// When the entry's content was last changed, if it exists.
    pub async fn updated_at(&self, id: &str) -> Result<Option<DateTime<Utc>>> {
        let pool = self.pool()?;
        let ms: Option<i64> = sqlx::query_scalar("SELECT updated_at FROM contexts WHERE id = ?")
            .bind(id)
            .fetch_optional(&pool)
            .await
            .map_err(storage_error)?;
        ms.map(millis_to_datetime).transpose()
    }

    fn pool(&self) -> Result<SqlitePool> {
        let guard = self
            .pool
            .read()
            .map_err(|_| StorageError::Unavailable("sqlite store lock poisoned".to_string()))?;
        guard.clone().ok_or(StorageError::NotInitialized)
    }

    /// Run `select` and attach child rows inside one read transaction, so
    /// every entry is reconstructed from a single snapshot.
    async fn read_entries<'q>(
        &self,
        select: Query<'q, Sqlite, SqliteArguments<'q>>,
    ) -> Result<Vec<ContextEntry>> {
        let pool = self.pool()?;
        let mut tx = pool.begin().await.map_err(storage_error)?;

        let rows = select.fetch_all(&mut *tx).await.map_err(storage_error)?;
        let mut entries = rows.iter().map(entry_from_row).collect::<Result<Vec<_>>>()?;
        attach_children(&mut *tx, &mut entries).await?;

        tx.commit().await.map_err(storage_error)?;
        Ok(entries)
    }
}

/// Open (creating if needed) the configured database.
///
/// Foreign keys are switched on per connection; child-row cascades depend
/// on them. WAL lets readers proceed while a save is in flight.
pub async fn connect(config: &Config) -> anyhow::Result<SqlitePool> {
    let db_path = &config.db.path;

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    debug!(path = %db_path.display(), "opened sqlite pool");
    Ok(pool)
}

/// Map a sqlx failure onto the storage error taxonomy.
fn storage_error(err: sqlx::Error) -> StorageError {
    match &err {
        sqlx::Error::PoolClosed => StorageError::NotInitialized,
        sqlx::Error::Database(db_err) => match db_err.kind() {
            ErrorKind::UniqueViolation
            | ErrorKind::ForeignKeyViolation
            | ErrorKind::NotNullViolation
            | ErrorKind::CheckViolation => {
                StorageError::ConstraintViolation(db_err.message().to_string())
            }
            _ if is_constraint_code(db_err.code().as_deref()) => {
                StorageError::ConstraintViolation(db_err.message().to_string())
            }
            _ => StorageError::Unavailable(err.to_string()),
        },
        _ => StorageError::Unavailable(err.to_string()),
    }
}

/// SQLITE_CONSTRAINT (19) and its extended codes.
fn is_constraint_code(code: Option<&str>) -> bool {
    code.and_then(|c| c.parse::<i32>().ok())
        .is_some_and(|c| c & 0xff == 19)
}

fn corrupt(err: impl std::fmt::Display) -> StorageError {
    StorageError::ConstraintViolation(format!("corrupt row: {}", err))
}

fn millis_to_datetime(ms: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms).ok_or_else(|| corrupt(format!("timestamp {} out of range", ms)))
}

fn to_u32(value: Option<i64>) -> Result<Option<u32>> {
    value.map(|v| u32::try_from(v).map_err(corrupt)).transpose()
}

fn entry_from_row(row: &SqliteRow) -> Result<ContextEntry> {
    let entry_type: ContextType = row.try_get::<String, _>("type").map_err(corrupt)?.parse()?;
    let source: ContextSource = row.try_get::<String, _>("source").map_err(corrupt)?.parse()?;
    let timestamp = millis_to_datetime(row.try_get("timestamp").map_err(corrupt)?)?;

    let metadata = ContextMetadata {
        author: row.try_get("author").map_err(corrupt)?,
        email: row.try_get("email").map_err(corrupt)?,
        commit_hash: row.try_get("commit_hash").map_err(corrupt)?,
        branch: row.try_get("branch").map_err(corrupt)?,
        duration: to_u32(row.try_get("duration").map_err(corrupt)?)?,
        audio_path: row.try_get("audio_path").map_err(corrupt)?,
        line_number: to_u32(row.try_get("line_number").map_err(corrupt)?)?,
        column_number: to_u32(row.try_get("column_number").map_err(corrupt)?)?,
        ..ContextMetadata::default()
    };

    Ok(ContextEntry {
        id: row.try_get("id").map_err(corrupt)?,
        timestamp,
        entry_type,
        content: row.try_get("content").map_err(corrupt)?,
        source,
        metadata,
        tags: Vec::new(),
        file_associations: Vec::new(),
    })
}

/// Fill in file associations, tags, links and related items for `entries`
/// with one query per child table and batch of ids.
async fn attach_children(conn: &mut SqliteConnection, entries: &mut [ContextEntry]) -> Result<()> {
    let position: HashMap<String, usize> = entries
        .iter()
        .enumerate()
        .map(|(i, e)| (e.id.clone(), i))
        .collect();
    let ids: Vec<String> = entries.iter().map(|e| e.id.clone()).collect();

    for batch in ids.chunks(ID_BATCH) {
        let rows = child_rows(
            conn,
            "SELECT context_id, file_path, line_start, line_end, file_hash FROM file_associations",
            batch,
        )
        .await?;
        for row in &rows {
            let Some(entry) = owner(entries, &position, row)? else {
                continue;
            };
            entry.file_associations.push(FileAssociation {
                file_path: row.try_get("file_path").map_err(corrupt)?,
                line_start: to_u32(row.try_get("line_start").map_err(corrupt)?)?,
                line_end: to_u32(row.try_get("line_end").map_err(corrupt)?)?,
                content_hash: row.try_get("file_hash").map_err(corrupt)?,
            });
        }

        for row in &child_rows(conn, "SELECT context_id, tag FROM tags", batch).await? {
            if let Some(entry) = owner(entries, &position, row)? {
                entry.tags.push(row.try_get("tag").map_err(corrupt)?);
            }
        }

        for row in &child_rows(conn, "SELECT context_id, url FROM links", batch).await? {
            if let Some(entry) = owner(entries, &position, row)? {
                entry.metadata.links.push(row.try_get("url").map_err(corrupt)?);
            }
        }

        let related = child_rows(
            conn,
            "SELECT context_id, item_type, item_id FROM related_items",
            batch,
        )
        .await?;
        for row in &related {
            let Some(entry) = owner(entries, &position, row)? else {
                continue;
            };
            let kind: String = row.try_get("item_type").map_err(corrupt)?;
            let item: String = row.try_get("item_id").map_err(corrupt)?;
            let target = match kind.as_str() {
                TICKET => &mut entry.metadata.related_tickets,
                PR => &mut entry.metadata.related_prs,
                THREAD => &mut entry.metadata.related_threads,
                other => return Err(corrupt(format!("unknown related item type '{}'", other))),
            };
            target.push(item);
        }
    }

    Ok(())
}

/// Child rows of the given entries, grouped by entry in insertion order.
async fn child_rows(conn: &mut SqliteConnection, select: &str, ids: &[String]) -> Result<Vec<SqliteRow>> {
    let mut query = QueryBuilder::<Sqlite>::new(select);
    query.push(" WHERE context_id IN (");
    let mut list = query.separated(", ");
    for id in ids {
        list.push_bind(id.as_str());
    }
    list.push_unseparated(") ORDER BY context_id, id");
    query.build().fetch_all(&mut *conn).await.map_err(storage_error)
}

fn owner<'e>(
    entries: &'e mut [ContextEntry],
    position: &HashMap<String, usize>,
    row: &SqliteRow,
) -> Result<Option<&'e mut ContextEntry>> {
    let context_id: String = row.try_get("context_id").map_err(corrupt)?;
    Ok(position.get(&context_id).and_then(|&i| entries.get_mut(i)))
}

#[async_trait]
impl Store for SqliteStore {
    async fn save(&self, entry: &ContextEntry) -> Result<String> {
        let pool = self.pool()?;
        let entry = &entry.clone().normalized()?;
        let id = if entry.id.is_empty() {
            new_entry_id()
        } else {
            entry.id.clone()
        };
        let now = Utc::now().timestamp_millis();
        let meta = &entry.metadata;

        let mut tx = pool.begin().await.map_err(storage_error)?;

        sqlx::query(
            "INSERT INTO contexts (id, timestamp, type, content, source, author, email, \
             commit_hash, branch, duration, audio_path, line_number, column_number, \
             created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(entry.timestamp.timestamp_millis())
        .bind(entry.entry_type.as_str())
        .bind(&entry.content)
        .bind(entry.source.as_str())
        .bind(&meta.author)
        .bind(&meta.email)
        .bind(&meta.commit_hash)
        .bind(&meta.branch)
        .bind(meta.duration.map(i64::from))
        .bind(&meta.audio_path)
        .bind(meta.line_number.map(i64::from))
        .bind(meta.column_number.map(i64::from))
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(storage_error)?;

        for file in &entry.file_associations {
            sqlx::query(
                "INSERT INTO file_associations (context_id, file_path, line_start, line_end, file_hash) \
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(&id)
            .bind(&file.file_path)
            .bind(file.line_start.map(i64::from))
            .bind(file.line_end.map(i64::from))
            .bind(&file.content_hash)
            .execute(&mut *tx)
            .await
            .map_err(storage_error)?;
        }

        for tag in &entry.tags {
            sqlx::query("INSERT INTO tags (context_id, tag) VALUES (?, ?)")
                .bind(&id)
                .bind(tag)
                .execute(&mut *tx)
                .await
                .map_err(storage_error)?;
        }

        for url in &meta.links {
            sqlx::query("INSERT INTO links (context_id, url) VALUES (?, ?)")
                .bind(&id)
                .bind(url)
                .execute(&mut *tx)
                .await
                .map_err(storage_error)?;
        }

        let related = [
            (TICKET, &meta.related_tickets),
            (PR, &meta.related_prs),
            (THREAD, &meta.related_threads),
        ];
        for (kind, items) in related {
            for item in items {
                sqlx::query(
                    "INSERT INTO related_items (context_id, item_type, item_id) VALUES (?, ?, ?)",
                )
                .bind(&id)
                .bind(kind)
                .bind(item)
                .execute(&mut *tx)
                .await
                .map_err(storage_error)?;
            }
        }

        tx.commit().await.map_err(storage_error)?;
        debug!(id = %id, files = entry.file_associations.len(), tags = entry.tags.len(), "saved entry");
        Ok(id)
    }

    async fn get(&self, id: &str) -> Result<Option<ContextEntry>> {
        let sql = format!("SELECT {} FROM contexts WHERE id = ?", ENTRY_COLUMNS);
        Ok(self.read_entries(sqlx::query(&sql).bind(id)).await?.pop())
    }

    async fn get_by_file(&self, file_path: &str) -> Result<Vec<ContextEntry>> {
        let sql = format!(
            "SELECT {} FROM contexts WHERE id IN \
             (SELECT context_id FROM file_associations WHERE file_path = ?) \
             ORDER BY timestamp DESC, rowid ASC",
            ENTRY_COLUMNS
        );
        self.read_entries(sqlx::query(&sql).bind(file_path)).await
    }

    async fn get_by_commit(&self, commit_hash: &str) -> Result<Vec<ContextEntry>> {
        let sql = format!(
            "SELECT {} FROM contexts WHERE commit_hash = ? ORDER BY timestamp DESC, rowid ASC",
            ENTRY_COLUMNS
        );
        self.read_entries(sqlx::query(&sql).bind(commit_hash)).await
    }

    async fn get_by_date_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ContextEntry>> {
        let sql = format!(
            "SELECT {} FROM contexts WHERE timestamp >= ? AND timestamp <= ? \
             ORDER BY timestamp DESC, rowid ASC",
            ENTRY_COLUMNS
        );
        let select = sqlx::query(&sql)
            .bind(start.timestamp_millis())
            .bind(end.timestamp_millis());
        self.read_entries(select).await
    }

    async fn search_by_content(&self, needle: &str) -> Result<Vec<ContextEntry>> {
        let sql = format!(
            "SELECT {} FROM contexts WHERE instr(lower(content), lower(?)) > 0 \
             ORDER BY timestamp DESC, rowid ASC LIMIT ?",
            ENTRY_COLUMNS
        );
        let select = sqlx::query(&sql)
            .bind(needle)
            .bind(CONTENT_SEARCH_LIMIT as i64);
        self.read_entries(select).await
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let pool = self.pool()?;
        let result = sqlx::query("DELETE FROM contexts WHERE id = ?")
            .bind(id)
            .execute(&pool)
            .await
            .map_err(storage_error)?;
        let deleted = result.rows_affected() > 0;
        debug!(id = %id, deleted, "delete entry");
        Ok(deleted)
    }

    async fn update_content(&self, id: &str, content: &str) -> Result<bool> {
        validate_content(content)?;
        let pool = self.pool()?;
        let result = sqlx::query("UPDATE contexts SET content = ?, updated_at = ? WHERE id = ?")
            .bind(content)
            .bind(Utc::now().timestamp_millis())
            .bind(id)
            .execute(&pool)
            .await
            .map_err(storage_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_all(&self) -> Result<Vec<ContextEntry>> {
        let sql = format!(
            "SELECT {} FROM contexts ORDER BY timestamp DESC, rowid ASC",
            ENTRY_COLUMNS
        );
        self.read_entries(sqlx::query(&sql)).await
    }

    async fn close(&self) {
        let pool = match self.pool.write() {
            Ok(mut guard) => guard.take(),
            Err(_) => None,
        };
        if let Some(pool) = pool {
            pool.close().await;
        }
    }
}

/// Open the configured database behind a [`Recorder`], applying the
/// configured index and retrieval settings.
pub async fn open_recorder(config: &Config) -> anyhow::Result<Recorder<SqliteStore>> {
    let store = SqliteStore::open(config).await?;
    Ok(Recorder::new(store, config.index.options())
        .with_default_limit(config.retrieval.default_limit))
}
