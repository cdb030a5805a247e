use sqlx::SqlitePool;
use tracing::debug;

use a1news_core::Result;

use crate::db_err;

// `media_group_id` links media to news by grouping key, not by news id, so
// media may arrive before the row it belongs to.
const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS news (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        original_text TEXT NOT NULL DEFAULT '',
        translation TEXT,
        glossary TEXT,
        source TEXT NOT NULL DEFAULT '',
        media_group_id TEXT UNIQUE,
        status TEXT NOT NULL,
        message_id INTEGER,
        message_chat_id INTEGER,
        sender_id TEXT NOT NULL DEFAULT '',
        category TEXT NOT NULL DEFAULT 'general',
        created_at TIMESTAMP NOT NULL,
        updated_at TIMESTAMP NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_news_status_id ON news (status, id)",
    r#"
    CREATE TABLE IF NOT EXISTS news_media (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        media_group_id TEXT NOT NULL,
        kind TEXT NOT NULL,
        file_id TEXT NOT NULL,
        message_id INTEGER,
        created_at TIMESTAMP NOT NULL,
        UNIQUE (media_group_id, message_id)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_news_media_group ON news_media (media_group_id)",
    r#"
    CREATE TABLE IF NOT EXISTS words (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        word TEXT NOT NULL UNIQUE,
        translation TEXT NOT NULL,
        speech_part TEXT NOT NULL DEFAULT ''
    )
    "#,
];

/// Create tables and indexes if they do not exist yet.
pub async fn ensure_schema(pool: &SqlitePool) -> Result<()> {
    for stmt in SCHEMA {
        sqlx::query(stmt).execute(pool).await.map_err(db_err)?;
    }
    debug!("database schema ensured");
    Ok(())
}
