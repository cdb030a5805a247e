use std::sync::Arc;

use anyhow::Context;
use teloxide::Bot;
use tracing::info;

use a1news_core::{
    config::Config,
    ingestion::IngestionHandler,
    messaging::{
        port::MessagingPort,
        throttled::{ThrottleConfig, ThrottledMessenger},
    },
    pipeline::{PipelineSettings, PublishPipeline},
    translation::TranslationService,
};
use a1news_openai::ChatCompletionsClient;
use a1news_store::SqliteStore;
use a1news_telegram::{
    router::{run_polling, AppState},
    TelegramMessenger,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    a1news_core::logging::init("a1news")?;

    let cfg = Arc::new(Config::load().context("invalid configuration")?);

    let store = Arc::new(
        SqliteStore::connect(&cfg.database_path, cfg.database_max_connections)
            .await
            .context("failed to open database")?,
    );

    let translate_model = Arc::new(ChatCompletionsClient::new(
        cfg.translate_model.clone(),
        cfg.llm_timeout,
    )?);
    let words_model = Arc::new(ChatCompletionsClient::new(
        cfg.words_model.clone(),
        cfg.llm_timeout,
    )?);
    info!(
        translate_model = %cfg.translate_model.model,
        words_model = %cfg.words_model.model,
        "language models configured"
    );

    let translator = Arc::new(TranslationService::new(
        translate_model,
        words_model,
        store.clone(),
        cfg.language.clone(),
    ));

    // Throttle outbound posts; the adapter still retries once on RetryAfter.
    let bot = Bot::new(cfg.telegram_bot_token.clone());
    let raw_messenger: Arc<dyn MessagingPort> = Arc::new(TelegramMessenger::new(bot.clone()));
    let messenger: Arc<dyn MessagingPort> = Arc::new(ThrottledMessenger::new(
        raw_messenger,
        ThrottleConfig::default(),
    ));

    let pipeline = Arc::new(PublishPipeline::new(
        store.clone(),
        translator,
        messenger,
        PipelineSettings {
            channels: cfg.post_channels.clone(),
            markup: cfg.publish_markup,
            glossary_required: cfg.glossary_required,
        },
    ));
    let ingestion = Arc::new(IngestionHandler::new(store.clone()));

    let state = AppState::new(cfg, ingestion, pipeline);
    let result = run_polling(bot, state).await;

    store.close().await;
    result.context("telegram bot failed")
}
