use sqlx::FromRow;

use a1news_core::{
    domain::{ChatId, GroupKey, Glossary, MessageId, News, NewsId, NewsMedia, WordEntry},
    errors::Error,
    Result,
};

pub(crate) const NEWS_COLUMNS: &str = "id, original_text, translation, glossary, source, \
    media_group_id, status, message_id, message_chat_id, sender_id, category";

#[derive(Debug, FromRow)]
pub(crate) struct NewsRow {
    pub id: i64,
    pub original_text: String,
    pub translation: Option<String>,
    pub glossary: Option<String>,
    pub source: String,
    pub media_group_id: Option<String>,
    pub status: String,
    pub message_id: Option<i32>,
    pub message_chat_id: Option<i64>,
    pub sender_id: String,
    pub category: String,
}

impl NewsRow {
    pub fn group_key(&self) -> GroupKey {
        match &self.media_group_id {
            Some(key) => GroupKey::new(key.clone()),
            None => GroupKey::synthetic(NewsId(self.id)),
        }
    }

    pub fn into_news(self, media: Vec<NewsMedia>) -> Result<News> {
        let media_group_id = self.group_key();
        let glossary = self
            .glossary
            .as_deref()
            .map(|g| serde_json::from_str::<Glossary>(g))
            .transpose()?;
        Ok(News {
            id: NewsId(self.id),
            original_text: self.original_text,
            translation: self.translation,
            glossary,
            source: self.source,
            media_group_id,
            status: self.status.parse()?,
            message_id: self.message_id.map(MessageId),
            chat_id: self.message_chat_id.map(ChatId),
            sender_id: self.sender_id,
            category: self
                .category
                .parse()
                .map_err(|e: Error| Error::Store(e.to_string()))?,
            media,
        })
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct MediaRow {
    pub id: i64,
    pub media_group_id: String,
    pub kind: String,
    pub file_id: String,
    pub message_id: Option<i32>,
}

impl TryFrom<MediaRow> for NewsMedia {
    type Error = Error;

    fn try_from(row: MediaRow) -> Result<Self> {
        Ok(NewsMedia {
            id: row.id,
            media_group_id: GroupKey::new(row.media_group_id),
            kind: row.kind.parse()?,
            file_id: row.file_id,
            message_id: row.message_id.map(MessageId),
        })
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct WordRow {
    pub word: String,
    pub translation: String,
    pub speech_part: String,
}

impl From<WordRow> for WordEntry {
    fn from(row: WordRow) -> Self {
        WordEntry {
            word: row.word,
            translation: row.translation,
            part_of_speech: row.speech_part,
        }
    }
}
