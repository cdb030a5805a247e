use std::collections::HashMap;

use async_trait::async_trait;

use crate::{
    domain::{GroupKey, MediaDraft, News, NewsDraft, NewsId, NewsUpdate, WordEntry},
    Result,
};

/// Hexagonal port for News / NewsMedia persistence.
///
/// Every method is one logical operation and runs under its own transaction
/// in the implementation. None of them holds a transaction across a call to
/// the language model.
#[async_trait]
pub trait NewsStore: Send + Sync {
    /// Insert a News row, or merge into the row that already owns
    /// `draft.media_group_id`. Rows inserted without a grouping key receive a
    /// synthetic one derived from their id.
    ///
    /// A concurrent insert of the same key surfaces as `Error::Conflict`.
    async fn upsert_news(&self, draft: &NewsDraft) -> Result<NewsId>;

    /// Append a media row, creating an empty placeholder News for the key if
    /// none exists yet. Re-adding the same physical message is a no-op.
    async fn add_media(&self, media: &MediaDraft) -> Result<()>;

    async fn news_by_id(&self, id: NewsId) -> Result<Option<News>>;

    async fn news_id_by_group(&self, key: &GroupKey) -> Result<Option<NewsId>>;

    /// Oldest drainable record with an id greater than `after`.
    async fn next_unpublished(&self, after: Option<NewsId>) -> Result<Option<News>>;

    /// Returns `false` when no row has this id or a guard in `update` no
    /// longer holds.
    async fn update_news(&self, id: NewsId, update: &NewsUpdate) -> Result<bool>;
}

/// Port for the global word -> (translation, part of speech) cache.
#[async_trait]
pub trait VocabularyStore: Send + Sync {
    /// Batch lookup by normalized key; missing words are absent from the map.
    async fn lookup_words(&self, words: &[String]) -> Result<HashMap<String, WordEntry>>;

    /// Insert entries whose key is not present yet (first writer wins).
    /// Returns the number of rows actually inserted.
    async fn insert_words(&self, entries: &[WordEntry]) -> Result<usize>;
}

/// Port for a single-turn language-model completion.
#[async_trait]
pub trait ChatModel: Send + Sync {
    fn model_name(&self) -> &str;

    /// Send one user prompt and return the raw assistant text.
    async fn complete(&self, prompt: &str) -> Result<String>;
}
