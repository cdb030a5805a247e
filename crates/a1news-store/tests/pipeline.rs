//! Ingestion + publish pipeline against an in-memory database.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;

use a1news_core::{
    config::LanguageSettings,
    domain::{Category, ChatId, GroupKey, MediaKind, MessageId, MessageRef, NewsStatus},
    drain::DelayedDrain,
    errors::Error,
    ingestion::{InboundMedia, InboundUnit, IngestionHandler},
    messaging::{
        port::MessagingPort,
        types::{FormattedText, Markup, MessagingCapabilities, OutgoingMedia},
    },
    pipeline::{PipelineSettings, PublishOutcome, PublishPipeline},
    ports::{ChatModel, NewsStore},
    translation::TranslationService,
    Result,
};
use a1news_store::SqliteStore;

/// Replies with a fixed answer and counts calls.
struct ScriptedModel {
    reply: String,
    calls: Mutex<usize>,
}

impl ScriptedModel {
    fn new(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: reply.to_string(),
            calls: Mutex::new(0),
        })
    }

    fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    fn model_name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, _prompt: &str) -> Result<String> {
        *self.calls.lock().unwrap() += 1;
        Ok(self.reply.clone())
    }
}

#[derive(Debug, Clone)]
enum Sent {
    Text(ChatId, String),
    Media(ChatId, Vec<String>, Option<String>),
}

#[derive(Default)]
struct RecordingMessenger {
    sent: Mutex<Vec<Sent>>,
}

impl RecordingMessenger {
    fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessagingPort for RecordingMessenger {
    fn capabilities(&self) -> MessagingCapabilities {
        MessagingCapabilities::default()
    }

    async fn send_text(&self, chat_id: ChatId, text: &FormattedText) -> Result<MessageRef> {
        self.sent
            .lock()
            .unwrap()
            .push(Sent::Text(chat_id, text.body.clone()));
        Ok(MessageRef {
            chat_id,
            message_id: MessageId(1),
        })
    }

    async fn send_media(
        &self,
        chat_id: ChatId,
        media: &[OutgoingMedia],
        caption: Option<&FormattedText>,
    ) -> Result<Vec<MessageRef>> {
        if media.is_empty() {
            return Err(Error::External("empty album".to_string()));
        }
        self.sent.lock().unwrap().push(Sent::Media(
            chat_id,
            media.iter().map(|m| m.file_id.clone()).collect(),
            caption.map(|c| c.body.clone()),
        ));
        Ok(vec![MessageRef {
            chat_id,
            message_id: MessageId(2),
        }])
    }
}

struct Harness {
    store: Arc<SqliteStore>,
    ingestion: IngestionHandler,
    pipeline: Arc<PublishPipeline>,
    messenger: Arc<RecordingMessenger>,
    translate_model: Arc<ScriptedModel>,
    words_model: Arc<ScriptedModel>,
}

async fn harness(translation: &str, words: &str, glossary_required: bool) -> Harness {
    let store = Arc::new(SqliteStore::in_memory().await.unwrap());
    let translate_model = ScriptedModel::new(translation);
    let words_model = ScriptedModel::new(words);
    let messenger = Arc::new(RecordingMessenger::default());

    let translator = Arc::new(TranslationService::new(
        translate_model.clone(),
        words_model.clone(),
        store.clone(),
        LanguageSettings::default(),
    ));
    let pipeline = Arc::new(PublishPipeline::new(
        store.clone(),
        translator,
        messenger.clone(),
        PipelineSettings {
            channels: HashMap::from([
                (Category::General, ChatId(-1001)),
                (Category::Gaming, ChatId(-1002)),
            ]),
            markup: Markup::Html,
            glossary_required,
        },
    ));

    Harness {
        ingestion: IngestionHandler::new(store.clone()),
        store,
        pipeline,
        messenger,
        translate_model,
        words_model,
    }
}

fn unit(msg: i32, key: Option<&str>, text: Option<&str>, media: &[i32]) -> InboundUnit {
    InboundUnit {
        chat_id: Some(ChatId(-500)),
        message_id: Some(MessageId(msg)),
        media_group_id: key.map(GroupKey::new),
        text: text.map(str::to_string),
        media: media
            .iter()
            .map(|m| InboundMedia {
                kind: MediaKind::Photo,
                file_id: format!("file-{m}"),
                message_id: Some(MessageId(*m)),
            })
            .collect(),
        source: "https://t.me/gamenews/31".to_string(),
        sender_id: "-500".to_string(),
        category: Category::Gaming,
    }
}

const WORDS_REPLY: &str = r#"Here you go:
{"νέο": ["new", "adjective"], "παιχνίδι": ["game", "noun"], "ένα": ["a", "article"]}"#;

#[tokio::test]
async fn album_with_late_caption_is_published_once_with_glossary() {
    let h = harness("Ένα νέο παιχνίδι.", WORDS_REPLY, false).await;

    h.ingestion
        .ingest(&unit(40, Some("9001"), None, &[40]))
        .await
        .unwrap();
    h.ingestion
        .ingest(&unit(41, Some("9001"), Some("A new game is out"), &[41]))
        .await
        .unwrap();

    let report = h.pipeline.drain().await.unwrap();
    assert_eq!(report.published.len(), 1);
    assert!(report.failed.is_empty());

    let sent = h.messenger.sent();
    assert_eq!(sent.len(), 1);
    let Sent::Media(chat, files, Some(caption)) = &sent[0] else {
        panic!("expected captioned album, got {sent:?}");
    };
    assert_eq!(*chat, ChatId(-1002));
    assert_eq!(files, &vec!["file-40".to_string(), "file-41".to_string()]);
    assert_eq!(
        caption,
        "Ένα νέο (<tg-spoiler>new</tg-spoiler>) παιχνίδι (<tg-spoiler>game</tg-spoiler>).\n---\nSource: https://t.me/gamenews/31"
    );

    // Vocabulary cache was filled, closed-class words included.
    let cached: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM words")
        .fetch_one(h.store.pool())
        .await
        .unwrap();
    assert_eq!(cached, 3);
}

#[tokio::test]
async fn republishing_is_a_no_op() {
    let h = harness("Καλημέρα κόσμε", "{}", false).await;
    let ingested = h
        .ingestion
        .ingest(&unit(1, None, Some("Good morning world"), &[]))
        .await
        .unwrap()
        .unwrap();

    h.pipeline.drain().await.unwrap();
    let before = h.store.news_by_id(ingested.news_id).await.unwrap().unwrap();
    assert_eq!(before.status, NewsStatus::Published);
    assert_eq!(h.messenger.sent().len(), 1);

    let report = h.pipeline.drain().await.unwrap();
    assert_eq!(report.visited(), 0);
    assert_eq!(
        h.pipeline.publish_by_id(ingested.news_id).await.unwrap(),
        PublishOutcome::AlreadyPublished
    );

    let after = h.store.news_by_id(ingested.news_id).await.unwrap().unwrap();
    assert_eq!(after, before);
    assert_eq!(h.messenger.sent().len(), 1);
    assert_eq!(h.translate_model.calls(), 1);
}

#[tokio::test]
async fn required_glossary_failure_leaves_record_raw() {
    let h = harness("Καλημέρα κόσμε", "no json at all", true).await;
    let ingested = h
        .ingestion
        .ingest(&unit(1, None, Some("Good morning world"), &[]))
        .await
        .unwrap()
        .unwrap();

    let report = h.pipeline.drain().await.unwrap();
    assert_eq!(report.failed, vec![ingested.news_id]);
    assert!(h.messenger.sent().is_empty());

    let news = h.store.news_by_id(ingested.news_id).await.unwrap().unwrap();
    assert_eq!(news.status, NewsStatus::Raw);
    assert!(news.translation.is_none());
}

#[tokio::test]
async fn tolerated_glossary_failure_publishes_plain_translation() {
    let h = harness("Καλημέρα κόσμε", "no json at all", false).await;
    h.ingestion
        .ingest(&unit(1, None, Some("Good morning world"), &[]))
        .await
        .unwrap();

    let report = h.pipeline.drain().await.unwrap();
    assert_eq!(report.published.len(), 1);
    let sent = h.messenger.sent();
    let Sent::Text(chat, body) = &sent[0] else {
        panic!("expected text post, got {sent:?}");
    };
    assert_eq!(*chat, ChatId(-1002));
    assert_eq!(body, "Καλημέρα κόσμε\n---\nSource: https://t.me/gamenews/31");
    assert_eq!(h.words_model.calls(), 1);
}

#[tokio::test]
async fn delayed_drain_debounces_bursts() {
    let h = harness("Καλημέρα", "{}", false).await;
    let drain = DelayedDrain::new(h.pipeline.clone(), Duration::from_millis(100));

    h.ingestion
        .ingest(&unit(1, Some("77"), Some("caption"), &[1]))
        .await
        .unwrap();
    drain.schedule().await;
    tokio::time::sleep(Duration::from_millis(30)).await;

    // Late album part re-arms the timer and still makes it into the post.
    h.ingestion
        .ingest(&unit(2, Some("77"), None, &[2]))
        .await
        .unwrap();
    drain.schedule().await;

    tokio::time::sleep(Duration::from_millis(500)).await;
    let sent = h.messenger.sent();
    assert_eq!(sent.len(), 1);
    let Sent::Media(_, files, _) = &sent[0] else {
        panic!("expected album, got {sent:?}");
    };
    assert_eq!(files.len(), 2);
}

#[tokio::test]
async fn cancelled_drain_does_not_run() {
    let h = harness("Καλημέρα", "{}", false).await;
    let drain = DelayedDrain::new(h.pipeline.clone(), Duration::from_millis(50));

    h.ingestion
        .ingest(&unit(1, None, Some("text"), &[]))
        .await
        .unwrap();
    drain.schedule().await;
    drain.cancel().await;

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(h.messenger.sent().is_empty());
}

/// Merges an edited caption into the record while the translation of the
/// old text is being produced.
struct EditingModel {
    ingestion: IngestionHandler,
    replies: Mutex<Vec<&'static str>>,
    edited: Mutex<bool>,
}

#[async_trait]
impl ChatModel for EditingModel {
    fn model_name(&self) -> &str {
        "editing"
    }

    async fn complete(&self, _prompt: &str) -> Result<String> {
        let first = !std::mem::replace(&mut *self.edited.lock().unwrap(), true);
        if first {
            self.ingestion
                .ingest(&unit(2, Some("g1"), Some("Edited caption"), &[]))
                .await?;
        }
        Ok(self.replies.lock().unwrap().remove(0).to_string())
    }
}

#[tokio::test]
async fn text_edited_during_translation_is_retranslated_before_publishing() {
    let store = Arc::new(SqliteStore::in_memory().await.unwrap());
    let messenger = Arc::new(RecordingMessenger::default());
    let model = Arc::new(EditingModel {
        ingestion: IngestionHandler::new(store.clone()),
        replies: Mutex::new(vec!["Παλιό κείμενο", "Νέο κείμενο"]),
        edited: Mutex::new(false),
    });
    let translator = Arc::new(TranslationService::new(
        model,
        ScriptedModel::new("{}"),
        store.clone(),
        LanguageSettings::default(),
    ));
    let pipeline = PublishPipeline::new(
        store.clone(),
        translator,
        messenger.clone(),
        PipelineSettings {
            channels: HashMap::from([
                (Category::General, ChatId(-1001)),
                (Category::Gaming, ChatId(-1002)),
            ]),
            markup: Markup::Html,
            glossary_required: false,
        },
    );
    let ingestion = IngestionHandler::new(store.clone());
    let id = ingestion
        .ingest(&unit(1, Some("g1"), Some("Old caption"), &[1]))
        .await
        .unwrap()
        .unwrap()
        .news_id;

    let report = pipeline.drain().await.unwrap();
    assert_eq!(report.superseded, vec![id]);
    assert!(messenger.sent().is_empty());
    let news = store.news_by_id(id).await.unwrap().unwrap();
    assert_eq!(news.status, NewsStatus::Raw);
    assert_eq!(news.original_text, "Edited caption");
    assert!(news.translation.is_none());

    let report = pipeline.drain().await.unwrap();
    assert_eq!(report.published, vec![id]);
    let sent = messenger.sent();
    assert_eq!(sent.len(), 1);
    let Sent::Media(_, _, Some(caption)) = &sent[0] else {
        panic!("expected captioned media, got {sent:?}");
    };
    assert!(caption.starts_with("Νέο κείμενο"));
    let news = store.news_by_id(id).await.unwrap().unwrap();
    assert_eq!(news.translation.as_deref(), Some("Νέο κείμενο"));
    assert_eq!(news.status, NewsStatus::Published);
}
