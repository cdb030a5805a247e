//! SQLite persistence for news, media and the vocabulary cache.
//!
//! Every trait method is one transaction. The transaction rolls back when it
//! is dropped without `commit`, so every early return releases it.

mod rows;
mod schema;

use std::{collections::HashMap, path::Path, str::FromStr, time::Duration};

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    QueryBuilder, Sqlite, SqliteConnection, SqlitePool,
};
use tracing::{debug, info};

use a1news_core::{
    domain::{
        GroupKey, MediaDraft, News, NewsDraft, NewsId, NewsMedia, NewsStatus, NewsUpdate,
        WordEntry,
    },
    errors::Error,
    ports::{NewsStore, VocabularyStore},
    Result,
};

pub use schema::ensure_schema;

use rows::{MediaRow, NewsRow, WordRow, NEWS_COLUMNS};

/// SQLite's default host-parameter limit is 999 on older builds.
const LOOKUP_CHUNK: usize = 500;

pub(crate) fn db_err(e: sqlx::Error) -> Error {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            return Error::Conflict(db.message().to_string());
        }
    }
    Error::Store(e.to_string())
}

#[derive(Clone, Debug)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if needed) the database file and ensure the schema.
    pub async fn connect(path: &Path, max_connections: u32) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await
            .map_err(|e| Error::Store(format!("failed to open {}: {e}", path.display())))?;

        ensure_schema(&pool).await?;
        info!(path = %path.display(), max_connections, "database ready");
        Ok(Self { pool })
    }

    /// Private in-memory database; lives as long as the store.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:").map_err(db_err)?;
        // One connection that never expires: each new connection would be a
        // fresh empty database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(db_err)?;
        ensure_schema(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn media_for(conn: &mut SqliteConnection, key: &str) -> Result<Vec<NewsMedia>> {
        let rows: Vec<MediaRow> = sqlx::query_as(
            r#"
            SELECT id, media_group_id, kind, file_id, message_id
            FROM news_media
            WHERE media_group_id = ?
            ORDER BY COALESCE(message_id, 2147483647), id
            "#,
        )
        .bind(key)
        .fetch_all(&mut *conn)
        .await
        .map_err(db_err)?;
        rows.into_iter().map(NewsMedia::try_from).collect()
    }

    async fn load(conn: &mut SqliteConnection, row: NewsRow) -> Result<News> {
        let key = row.group_key();
        let media = Self::media_for(conn, key.as_str()).await?;
        row.into_news(media)
    }
}

#[async_trait]
impl NewsStore for SqliteStore {
    async fn upsert_news(&self, draft: &NewsDraft) -> Result<NewsId> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        if let Some(key) = &draft.media_group_id {
            let existing: Option<(i64, String, String)> = sqlx::query_as(
                "SELECT id, status, original_text FROM news WHERE media_group_id = ?",
            )
            .bind(key.as_str())
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_err)?;

            if let Some((id, status, old_text)) = existing {
                let status: NewsStatus = status.parse()?;
                let text = draft.original_text.trim();
                let reopen = !text.is_empty()
                    && status != NewsStatus::Published
                    && (status == NewsStatus::Placeholder || old_text != text);

                if reopen {
                    sqlx::query(
                        r#"
                        UPDATE news
                        SET original_text = ?, status = ?, translation = NULL, glossary = NULL,
                            source = ?, sender_id = ?, category = ?,
                            message_id = COALESCE(?, message_id),
                            message_chat_id = COALESCE(?, message_chat_id),
                            updated_at = ?
                        WHERE id = ?
                        "#,
                    )
                    .bind(text)
                    .bind(NewsStatus::Raw.as_str())
                    .bind(&draft.source)
                    .bind(&draft.sender_id)
                    .bind(draft.category.as_str())
                    .bind(draft.message_id.map(|m| m.0))
                    .bind(draft.chat_id.map(|c| c.0))
                    .bind(now)
                    .bind(id)
                    .execute(&mut *tx)
                    .await
                    .map_err(db_err)?;
                } else if !text.is_empty() {
                    sqlx::query(
                        r#"
                        UPDATE news
                        SET source = ?, sender_id = ?, category = ?,
                            message_id = COALESCE(?, message_id),
                            message_chat_id = COALESCE(?, message_chat_id),
                            updated_at = ?
                        WHERE id = ?
                        "#,
                    )
                    .bind(&draft.source)
                    .bind(&draft.sender_id)
                    .bind(draft.category.as_str())
                    .bind(draft.message_id.map(|m| m.0))
                    .bind(draft.chat_id.map(|c| c.0))
                    .bind(now)
                    .bind(id)
                    .execute(&mut *tx)
                    .await
                    .map_err(db_err)?;
                }

                tx.commit().await.map_err(db_err)?;
                debug!(news_id = id, group = %key, reopen, "merged into existing news");
                return Ok(NewsId(id));
            }
        }

        let text = draft.original_text.trim();
        let id = sqlx::query(
            r#"
            INSERT INTO news (original_text, source, media_group_id, status, message_id,
                              message_chat_id, sender_id, category, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(text)
        .bind(&draft.source)
        .bind(draft.media_group_id.as_ref().map(GroupKey::as_str))
        .bind(NewsStatus::for_text(text).as_str())
        .bind(draft.message_id.map(|m| m.0))
        .bind(draft.chat_id.map(|c| c.0))
        .bind(&draft.sender_id)
        .bind(draft.category.as_str())
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?
        .last_insert_rowid();

        if draft.media_group_id.is_none() {
            let key = GroupKey::synthetic(NewsId(id));
            sqlx::query("UPDATE news SET media_group_id = ? WHERE id = ?")
                .bind(key.as_str())
                .bind(id)
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;
        }

        tx.commit().await.map_err(db_err)?;
        debug!(news_id = id, "inserted news");
        Ok(NewsId(id))
    }

    async fn add_media(&self, media: &MediaDraft) -> Result<()> {
        let now = Utc::now();
        let key = media.media_group_id.as_str();
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM news WHERE media_group_id = ?")
            .bind(key)
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_err)?;

        if exists.is_none() {
            sqlx::query(
                r#"
                INSERT INTO news (original_text, source, media_group_id, status, sender_id,
                                  created_at, updated_at)
                VALUES ('', '', ?, ?, '', ?, ?)
                "#,
            )
            .bind(key)
            .bind(NewsStatus::Placeholder.as_str())
            .bind(now)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
            debug!(group = %key, "created placeholder news");
        }

        sqlx::query(
            r#"
            INSERT OR IGNORE INTO news_media (media_group_id, kind, file_id, message_id, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(key)
        .bind(media.kind.as_str())
        .bind(&media.file_id)
        .bind(media.message_id.map(|m| m.0))
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        tx.commit().await.map_err(db_err)
    }

    async fn news_by_id(&self, id: NewsId) -> Result<Option<News>> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let row: Option<NewsRow> =
            sqlx::query_as(&format!("SELECT {NEWS_COLUMNS} FROM news WHERE id = ?"))
                .bind(id.0)
                .fetch_optional(&mut *tx)
                .await
                .map_err(db_err)?;
        let news = match row {
            Some(row) => Some(Self::load(&mut *tx, row).await?),
            None => None,
        };
        tx.commit().await.map_err(db_err)?;
        Ok(news)
    }

    async fn news_id_by_group(&self, key: &GroupKey) -> Result<Option<NewsId>> {
        let id: Option<i64> = sqlx::query_scalar("SELECT id FROM news WHERE media_group_id = ?")
            .bind(key.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(id.map(NewsId))
    }

    async fn next_unpublished(&self, after: Option<NewsId>) -> Result<Option<News>> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let row: Option<NewsRow> = sqlx::query_as(&format!(
            "SELECT {NEWS_COLUMNS} FROM news \
             WHERE status IN (?, ?) AND id > ? \
             ORDER BY id LIMIT 1"
        ))
        .bind(NewsStatus::Raw.as_str())
        .bind(NewsStatus::Translated.as_str())
        .bind(after.map(|a| a.0).unwrap_or(0))
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_err)?;
        let news = match row {
            Some(row) => Some(Self::load(&mut *tx, row).await?),
            None => None,
        };
        tx.commit().await.map_err(db_err)?;
        Ok(news)
    }

    async fn update_news(&self, id: NewsId, update: &NewsUpdate) -> Result<bool> {
        let glossary = update
            .glossary
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE news SET updated_at = ");
        qb.push_bind(Utc::now());
        if let Some(status) = update.status {
            qb.push(", status = ").push_bind(status.as_str());
        }
        if let Some(translation) = &update.translation {
            qb.push(", translation = ").push_bind(translation.as_str());
        }
        if let Some(glossary) = glossary {
            qb.push(", glossary = ").push_bind(glossary);
        }
        qb.push(" WHERE id = ").push_bind(id.0);
        if let Some(status) = update.expect_status {
            qb.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(text) = &update.expect_text {
            qb.push(" AND original_text = ").push_bind(text.as_str());
        }

        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let affected = qb
            .build()
            .execute(&mut *tx)
            .await
            .map_err(db_err)?
            .rows_affected();
        tx.commit().await.map_err(db_err)?;
        Ok(affected > 0)
    }
}

#[async_trait]
impl VocabularyStore for SqliteStore {
    async fn lookup_words(&self, words: &[String]) -> Result<HashMap<String, WordEntry>> {
        let mut found = HashMap::new();
        for chunk in words.chunks(LOOKUP_CHUNK) {
            let mut qb: QueryBuilder<Sqlite> =
                QueryBuilder::new("SELECT word, translation, speech_part FROM words WHERE word IN (");
            let mut separated = qb.separated(", ");
            for w in chunk {
                separated.push_bind(w.as_str());
            }
            separated.push_unseparated(")");

            let rows: Vec<WordRow> = qb
                .build_query_as()
                .fetch_all(&self.pool)
                .await
                .map_err(db_err)?;
            found.extend(rows.into_iter().map(|r| (r.word.clone(), WordEntry::from(r))));
        }
        Ok(found)
    }

    async fn insert_words(&self, entries: &[WordEntry]) -> Result<usize> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let mut inserted = 0usize;
        for e in entries.iter().filter(|e| !e.word.is_empty()) {
            let res = sqlx::query(
                "INSERT OR IGNORE INTO words (word, translation, speech_part) VALUES (?, ?, ?)",
            )
            .bind(&e.word)
            .bind(&e.translation)
            .bind(&e.part_of_speech)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
            inserted += res.rows_affected() as usize;
        }
        tx.commit().await.map_err(db_err)?;
        Ok(inserted)
    }
}
