use std::sync::Arc;

use teloxide::{dispatching::Dispatcher, dptree, prelude::*};
use tracing::{error, info};

use a1news_core::{
    config::Config,
    drain::DelayedDrain,
    ingestion::{InboundUnit, IngestionHandler},
    pipeline::PublishPipeline,
};

use crate::handlers::{
    self,
    media_group::{BoxFuture, MediaGroupBuffer, ProcessFn},
};

#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub ingestion: Arc<IngestionHandler>,
    pub pipeline: Arc<PublishPipeline>,
    pub delayed_drain: Arc<DelayedDrain>,
    pub media_groups: Arc<MediaGroupBuffer>,
}

impl AppState {
    pub fn new(
        cfg: Arc<Config>,
        ingestion: Arc<IngestionHandler>,
        pipeline: Arc<PublishPipeline>,
    ) -> Arc<Self> {
        let process: ProcessFn = {
            let ingestion = ingestion.clone();
            let pipeline = pipeline.clone();
            Arc::new(move |unit: InboundUnit| {
                let ingestion = ingestion.clone();
                let pipeline = pipeline.clone();
                let fut: BoxFuture = Box::pin(async move {
                    handlers::ingest_and_drain(&ingestion, &pipeline, unit).await;
                });
                fut
            })
        };

        Arc::new(Self {
            media_groups: MediaGroupBuffer::new(cfg.media_group_timeout, process),
            delayed_drain: DelayedDrain::new(pipeline.clone(), cfg.publish_delay),
            cfg,
            ingestion,
            pipeline,
        })
    }
}

pub async fn run_polling(bot: Bot, state: Arc<AppState>) -> anyhow::Result<()> {
    if let Ok(me) = bot.get_me().await {
        info!(username = %me.username(), "bot started");
    }
    info!(
        watched = state.cfg.watch_channels.len(),
        admins = state.cfg.admin_users.len(),
        "listening for updates"
    );

    // Publish the backlog before taking new updates.
    match state.pipeline.drain().await {
        Ok(report) => info!(
            published = report.published.len(),
            failed = report.failed.len() + report.delivery_failed.len(),
            "startup drain finished"
        ),
        Err(e) => error!(error = %e, "startup drain failed"),
    }

    let handler = dptree::entry()
        .branch(Update::filter_channel_post().endpoint(handlers::handle_channel_post))
        .branch(Update::filter_message().endpoint(handlers::handle_admin_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state.clone()])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    state.delayed_drain.cancel().await;
    Ok(())
}
