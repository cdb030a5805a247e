//! Turning inbound channel posts / forwards into News and NewsMedia rows.

use std::sync::Arc;

use tracing::{debug, info};

use crate::{
    domain::{Category, ChatId, GroupKey, MediaDraft, MediaKind, MessageId, NewsDraft, NewsId},
    errors::Error,
    ports::NewsStore,
    Result,
};

/// Attempts for one lookup-then-merge sequence that keeps losing a key race.
const MAX_CONFLICT_RETRIES: usize = 3;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboundMedia {
    pub kind: MediaKind,
    pub file_id: String,
    pub message_id: Option<MessageId>,
}

/// One logical inbound unit: a single message, or a complete media group.
#[derive(Clone, Debug, PartialEq)]
pub struct InboundUnit {
    pub chat_id: Option<ChatId>,
    pub message_id: Option<MessageId>,
    pub media_group_id: Option<GroupKey>,
    /// Text or caption.
    pub text: Option<String>,
    pub media: Vec<InboundMedia>,
    pub source: String,
    pub sender_id: String,
    pub category: Category,
}

impl InboundUnit {
    pub fn has_text(&self) -> bool {
        self.text.as_deref().is_some_and(|t| !t.trim().is_empty())
    }

    pub fn is_empty(&self) -> bool {
        !self.has_text() && self.media.is_empty()
    }

    /// Merge the parts of one media group into a single unit.
    ///
    /// Identity, text and source come from the part that carries text (or
    /// the first part); media is ordered by message id.
    pub fn combine(mut parts: Vec<InboundUnit>) -> Option<InboundUnit> {
        if parts.is_empty() {
            return None;
        }
        parts.sort_by_key(|p| p.message_id);

        let lead = parts.iter().position(InboundUnit::has_text).unwrap_or(0);
        let mut media: Vec<InboundMedia> = parts
            .iter_mut()
            .flat_map(|p| std::mem::take(&mut p.media))
            .collect();
        media.sort_by_key(|m| m.message_id);
        media.dedup_by(|a, b| a.message_id.is_some() && a.message_id == b.message_id);

        let mut unit = parts.swap_remove(lead);
        if unit.media_group_id.is_none() {
            unit.media_group_id = parts.iter().find_map(|p| p.media_group_id.clone());
        }
        unit.media = media;
        Some(unit)
    }

    fn draft(&self) -> NewsDraft {
        NewsDraft {
            original_text: self.text.clone().unwrap_or_default(),
            source: self.source.clone(),
            media_group_id: self.media_group_id.clone(),
            message_id: self.message_id,
            chat_id: self.chat_id,
            sender_id: self.sender_id.clone(),
            category: self.category,
        }
    }
}

/// Result of ingesting one unit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ingested {
    pub news_id: NewsId,
    pub media_group_id: GroupKey,
    pub media_added: usize,
}

pub struct IngestionHandler {
    store: Arc<dyn NewsStore>,
}

impl IngestionHandler {
    pub fn new(store: Arc<dyn NewsStore>) -> Self {
        Self { store }
    }

    /// Persist `unit`. Returns `None` for a unit with neither text nor media.
    pub async fn ingest(&self, unit: &InboundUnit) -> Result<Option<Ingested>> {
        if unit.is_empty() {
            debug!(message_id = ?unit.message_id, "ignoring unit without text or media");
            return Ok(None);
        }

        // Media-only part of a group: the store anchors it on a placeholder.
        let (news_id, key) = match (&unit.media_group_id, unit.has_text()) {
            (Some(key), false) => {
                self.add_media(key, &unit.media).await?;
                let id = self.store.news_id_by_group(key).await?.ok_or_else(|| {
                    Error::Invariant(format!("no news row for group {key} after adding media"))
                })?;
                return Ok(Some(Ingested {
                    news_id: id,
                    media_group_id: key.clone(),
                    media_added: unit.media.len(),
                }));
            }
            (Some(key), true) => (self.upsert(unit).await?, key.clone()),
            // Rows without a platform key get a synthetic one from their id.
            (None, _) => {
                let id = self.upsert(unit).await?;
                (id, GroupKey::synthetic(id))
            }
        };

        self.add_media(&key, &unit.media).await?;
        info!(
            news_id = %news_id,
            group = %key,
            media = unit.media.len(),
            category = unit.category.as_str(),
            "ingested news"
        );
        Ok(Some(Ingested {
            news_id,
            media_group_id: key,
            media_added: unit.media.len(),
        }))
    }

    async fn upsert(&self, unit: &InboundUnit) -> Result<NewsId> {
        let draft = unit.draft();
        let mut attempt = 1;
        loop {
            match self.store.upsert_news(&draft).await {
                Err(e) if e.is_conflict() && attempt < MAX_CONFLICT_RETRIES => {
                    debug!(error = %e, attempt, "grouping key race, retrying merge");
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    async fn add_media(&self, key: &GroupKey, media: &[InboundMedia]) -> Result<()> {
        for m in media {
            let draft = MediaDraft {
                media_group_id: key.clone(),
                kind: m.kind,
                file_id: m.file_id.clone(),
                message_id: m.message_id,
            };
            let mut attempt = 1;
            loop {
                match self.store.add_media(&draft).await {
                    Err(e) if e.is_conflict() && attempt < MAX_CONFLICT_RETRIES => {
                        debug!(error = %e, attempt, "placeholder race, retrying media insert");
                        attempt += 1;
                    }
                    other => {
                        other?;
                        break;
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::domain::{News, NewsUpdate};

    /// Records calls; fails `upsert_news` with a conflict `conflicts` times.
    #[derive(Default)]
    struct RecordingStore {
        conflicts: Mutex<usize>,
        upserts: Mutex<Vec<NewsDraft>>,
        media: Mutex<Vec<MediaDraft>>,
    }

    #[async_trait]
    impl NewsStore for RecordingStore {
        async fn upsert_news(&self, draft: &NewsDraft) -> Result<NewsId> {
            self.upserts.lock().unwrap().push(draft.clone());
            let mut left = self.conflicts.lock().unwrap();
            if *left > 0 {
                *left -= 1;
                return Err(Error::Conflict("media_group_id".to_string()));
            }
            Ok(NewsId(5))
        }

        async fn add_media(&self, media: &MediaDraft) -> Result<()> {
            self.media.lock().unwrap().push(media.clone());
            Ok(())
        }

        async fn news_by_id(&self, _id: NewsId) -> Result<Option<News>> {
            Ok(None)
        }

        async fn news_id_by_group(&self, _key: &GroupKey) -> Result<Option<NewsId>> {
            Ok(Some(NewsId(9)))
        }

        async fn next_unpublished(&self, _after: Option<NewsId>) -> Result<Option<News>> {
            Ok(None)
        }

        async fn update_news(&self, _id: NewsId, _update: &NewsUpdate) -> Result<bool> {
            Ok(false)
        }
    }

    fn unit(msg: i32, key: Option<&str>, text: Option<&str>, media: &[(i32, &str)]) -> InboundUnit {
        InboundUnit {
            chat_id: Some(ChatId(-100)),
            message_id: Some(MessageId(msg)),
            media_group_id: key.map(GroupKey::new),
            text: text.map(str::to_string),
            media: media
                .iter()
                .map(|(id, file)| InboundMedia {
                    kind: MediaKind::Photo,
                    file_id: file.to_string(),
                    message_id: Some(MessageId(*id)),
                })
                .collect(),
            source: "https://t.me/chan/1".to_string(),
            sender_id: "-100".to_string(),
            category: Category::Gaming,
        }
    }

    #[test]
    fn combine_takes_text_part_and_orders_media() {
        let parts = vec![
            unit(12, Some("g"), None, &[(12, "c")]),
            unit(10, Some("g"), None, &[(10, "a")]),
            unit(11, Some("g"), Some("caption"), &[(11, "b")]),
        ];
        let combined = InboundUnit::combine(parts).unwrap();
        assert_eq!(combined.text.as_deref(), Some("caption"));
        assert_eq!(combined.message_id, Some(MessageId(11)));
        let files: Vec<&str> = combined.media.iter().map(|m| m.file_id.as_str()).collect();
        assert_eq!(files, vec!["a", "b", "c"]);
        assert_eq!(combined.media_group_id, Some(GroupKey::new("g")));
    }

    #[test]
    fn combine_of_nothing_is_none() {
        assert!(InboundUnit::combine(Vec::new()).is_none());
    }

    #[tokio::test]
    async fn text_without_key_gets_synthetic_key_for_media() {
        let store = Arc::new(RecordingStore::default());
        let handler = IngestionHandler::new(store.clone());

        let out = handler
            .ingest(&unit(1, None, Some("Νέα"), &[(1, "photo-1")]))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(out.news_id, NewsId(5));
        assert_eq!(out.media_group_id, GroupKey::new("-5"));

        let media = store.media.lock().unwrap();
        assert_eq!(media.len(), 1);
        assert_eq!(media[0].media_group_id, GroupKey::new("-5"));
    }

    #[tokio::test]
    async fn media_only_part_goes_through_placeholder_path() {
        let store = Arc::new(RecordingStore::default());
        let handler = IngestionHandler::new(store.clone());

        let out = handler
            .ingest(&unit(2, Some("777"), None, &[(2, "photo-2")]))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(out.news_id, NewsId(9));
        assert!(store.upserts.lock().unwrap().is_empty());
        assert_eq!(store.media.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn conflicts_are_retried() {
        let store = Arc::new(RecordingStore {
            conflicts: Mutex::new(2),
            ..Default::default()
        });
        let handler = IngestionHandler::new(store.clone());

        let out = handler
            .ingest(&unit(3, Some("888"), Some("text"), &[]))
            .await
            .unwrap();
        assert!(out.is_some());
        assert_eq!(store.upserts.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn persistent_conflict_surfaces() {
        let store = Arc::new(RecordingStore {
            conflicts: Mutex::new(10),
            ..Default::default()
        });
        let handler = IngestionHandler::new(store);

        let err = handler
            .ingest(&unit(4, Some("999"), Some("text"), &[]))
            .await
            .unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn empty_unit_is_ignored() {
        let store = Arc::new(RecordingStore::default());
        let handler = IngestionHandler::new(store.clone());
        assert!(handler.ingest(&unit(5, None, Some("  "), &[])).await.unwrap().is_none());
        assert!(store.upserts.lock().unwrap().is_empty());
    }
}
