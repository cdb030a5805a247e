//! Publish pipeline: `raw -> translated -> published` for each drainable record.

use std::{collections::HashMap, sync::Arc};

use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::{
    domain::{Category, ChatId, Glossary, MessageRef, News, NewsId, NewsStatus, NewsUpdate},
    errors::Error,
    formatting::{render_post, split_post},
    messaging::{
        port::MessagingPort,
        types::{FormattedText, Markup, OutgoingMedia},
    },
    ports::NewsStore,
    translation::TranslationService,
    Result,
};

#[derive(Clone, Debug)]
pub struct PipelineSettings {
    pub channels: HashMap<Category, ChatId>,
    pub markup: Markup,
    /// Treat a failed glossary step as a failure of the whole record.
    pub glossary_required: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PublishOutcome {
    Published(Vec<MessageRef>),
    AlreadyPublished,
    /// Placeholder without text yet.
    NotReady,
    /// Translation is stored; the record stays unpublished for the next drain.
    DeliveryFailed(String),
    /// The record changed under the pipeline (new text merged in); it is
    /// picked up again by the next drain.
    Superseded,
}

/// Summary of one drain pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub published: Vec<NewsId>,
    pub delivery_failed: Vec<NewsId>,
    pub failed: Vec<NewsId>,
    pub superseded: Vec<NewsId>,
}

impl DrainReport {
    pub fn visited(&self) -> usize {
        self.published.len()
            + self.delivery_failed.len()
            + self.failed.len()
            + self.superseded.len()
    }
}

pub struct PublishPipeline {
    store: Arc<dyn NewsStore>,
    translator: Arc<TranslationService>,
    messenger: Arc<dyn MessagingPort>,
    settings: PipelineSettings,
    // Serializes drains and single publishes.
    worker: Mutex<()>,
}

impl PublishPipeline {
    pub fn new(
        store: Arc<dyn NewsStore>,
        translator: Arc<TranslationService>,
        messenger: Arc<dyn MessagingPort>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            store,
            translator,
            messenger,
            settings,
            worker: Mutex::new(()),
        }
    }

    /// Publish every currently drainable record, oldest first.
    ///
    /// A record that fails is reported and skipped; each record is visited at
    /// most once per pass. Only store errors while picking the next candidate
    /// abort the pass.
    pub async fn drain(&self) -> Result<DrainReport> {
        let _guard = self.worker.lock().await;
        let mut report = DrainReport::default();
        let mut cursor = None;

        while let Some(news) = self.store.next_unpublished(cursor).await? {
            let id = news.id;
            cursor = Some(id);
            match self.process(news).await {
                Ok(PublishOutcome::Published(_)) => report.published.push(id),
                Ok(PublishOutcome::DeliveryFailed(_)) => report.delivery_failed.push(id),
                Ok(PublishOutcome::Superseded) => report.superseded.push(id),
                Ok(PublishOutcome::AlreadyPublished | PublishOutcome::NotReady) => {}
                Err(e) => {
                    error!(news_id = %id, error = %e, "failed to process news");
                    report.failed.push(id);
                }
            }
        }

        if report.visited() > 0 {
            info!(
                published = report.published.len(),
                delivery_failed = report.delivery_failed.len(),
                failed = report.failed.len(),
                superseded = report.superseded.len(),
                "drain finished"
            );
        }
        Ok(report)
    }

    /// Publish one record by id (no-op if already published).
    pub async fn publish_by_id(&self, id: NewsId) -> Result<PublishOutcome> {
        let _guard = self.worker.lock().await;
        let news = self
            .store
            .news_by_id(id)
            .await?
            .ok_or_else(|| Error::Store(format!("no news with id {id}")))?;
        self.process(news).await
    }

    async fn process(&self, mut news: News) -> Result<PublishOutcome> {
        match news.status {
            NewsStatus::Published => return Ok(PublishOutcome::AlreadyPublished),
            NewsStatus::Placeholder => return Ok(PublishOutcome::NotReady),
            NewsStatus::Raw | NewsStatus::Translated => {}
        }

        if news.status == NewsStatus::Raw && !self.translate(&mut news).await? {
            info!(news_id = %news.id, "text changed during translation, left for the next drain");
            return Ok(PublishOutcome::Superseded);
        }
        let Some(translation) = news.translation.as_deref().filter(|t| !t.trim().is_empty())
        else {
            return Err(Error::Invariant(format!(
                "news {} has no translation after translate step",
                news.id
            )));
        };

        let channel = *self.settings.channels.get(&news.category).ok_or_else(|| {
            Error::Config(format!(
                "no output channel for category {}",
                news.category.as_str()
            ))
        })?;

        let empty = Glossary::new();
        let glossary = news.glossary.as_ref().unwrap_or(&empty);
        let caps = self.messenger.capabilities();
        let post = render_post(translation, glossary, &news.source, self.settings.markup);
        let texts = split_post(
            translation,
            glossary,
            &news.source,
            self.settings.markup,
            caps.max_message_len,
        );
        let media: Vec<OutgoingMedia> = news.media.iter().map(OutgoingMedia::from).collect();

        let sent = match self.deliver(channel, &media, &post, &texts).await {
            Ok(sent) => sent,
            Err(e) => {
                warn!(news_id = %news.id, chat_id = channel.0, error = %e, "delivery failed");
                return Ok(PublishOutcome::DeliveryFailed(e.to_string()));
            }
        };

        if !self
            .store
            .update_news(news.id, &NewsUpdate::published())
            .await?
        {
            warn!(
                news_id = %news.id,
                "news changed while it was delivered, left for the next drain"
            );
            return Ok(PublishOutcome::Superseded);
        }
        info!(news_id = %news.id, chat_id = channel.0, messages = sent.len(), "published news");
        Ok(PublishOutcome::Published(sent))
    }

    /// `raw -> translated`. The model calls finish before the row is touched.
    ///
    /// Returns `false` when the row changed since it was read.
    async fn translate(&self, news: &mut News) -> Result<bool> {
        let simplified = self.translator.simplify(&news.original_text).await?;
        let glossary = match simplified.glossary {
            Some(g) => g,
            None if self.settings.glossary_required => {
                return Err(Error::Model(format!(
                    "glossary generation failed for news {}",
                    news.id
                )));
            }
            None => Glossary::new(),
        };

        let update = NewsUpdate::translated(simplified.translation, glossary)
            .if_text_is(&news.original_text);
        if !self.store.update_news(news.id, &update).await? {
            return Ok(false);
        }
        news.status = NewsStatus::Translated;
        news.translation = update.translation;
        news.glossary = update.glossary;
        Ok(true)
    }

    async fn deliver(
        &self,
        chat_id: ChatId,
        media: &[OutgoingMedia],
        post: &FormattedText,
        texts: &[FormattedText],
    ) -> Result<Vec<MessageRef>> {
        let caps = self.messenger.capabilities();
        let caption_fits = !media.is_empty() && post.char_len() <= caps.max_caption_len;

        let mut sent = Vec::new();
        for (i, chunk) in media.chunks(caps.max_album_len.max(1)).enumerate() {
            let caption = (i == 0 && caption_fits).then_some(post);
            sent.extend(self.messenger.send_media(chat_id, chunk, caption).await?);
        }
        if !caption_fits {
            for text in texts {
                sent.push(self.messenger.send_text(chat_id, text).await?);
            }
        }
        Ok(sent)
    }
}
